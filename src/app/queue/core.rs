//! Core download queue implementation
//!
//! The queue owns the worker pool. Workers poll the shared FIFO, run the
//! resolver under the queue's cancellation token, and register successful
//! downloads with the cache store. All queue state changes go through one
//! mutex, which is what enforces single-flight per identifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::cache::CacheStore;
use crate::app::models::{DownloadFormat, DownloadRequest, DownloadState, VideoId};
use crate::app::resolver::VideoResolver;
use crate::config::Config;
use crate::constants::queue::{DEFAULT_WORKER_COUNT, IDLE_POLL_INTERVAL};
use crate::errors::{QueueError, QueueResult, ResolverError};

use super::state::QueueState;

/// Configuration for queue behavior
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent workers
    pub worker_count: usize,
    /// How long an idle worker sleeps between queue polls
    pub poll_interval: Duration,
    /// Maximum video height stamped onto new requests
    pub max_height: u32,
    /// Maximum video length stamped onto new requests
    pub max_length_seconds: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            poll_interval: IDLE_POLL_INTERVAL,
            max_height: 1080,
            max_length_seconds: 120,
        }
    }
}

impl QueueConfig {
    /// Derive queue configuration from the application snapshot
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.effective_worker_count(),
            poll_interval: IDLE_POLL_INTERVAL,
            max_height: config.max_height,
            max_length_seconds: config.max_length_seconds,
        }
    }
}

/// Running workers and their shared cancellation handle
struct WorkerSet {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Deduplicated FIFO download queue with a worker pool
pub struct DownloadQueue {
    config: QueueConfig,
    state: Arc<Mutex<QueueState>>,
    cache: Arc<CacheStore>,
    resolver: Arc<dyn VideoResolver>,
    workers: Mutex<Option<WorkerSet>>,
}

impl DownloadQueue {
    /// Create a stopped queue
    pub fn new(
        config: QueueConfig,
        cache: Arc<CacheStore>,
        resolver: Arc<dyn VideoResolver>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(QueueState::new())),
            cache,
            resolver,
            workers: Mutex::new(None),
        }
    }

    /// Start the worker pool
    ///
    /// Idempotent: starting a running queue is a no-op. A queue stopped with
    /// [`stop`](Self::stop) can be started again.
    pub async fn start(&self) -> QueueResult<()> {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            return Ok(());
        }

        self.state.lock().await.set_running(true);

        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(self.config.worker_count);
        for worker_id in 0..self.config.worker_count {
            let state = Arc::clone(&self.state);
            let cache = Arc::clone(&self.cache);
            let resolver = Arc::clone(&self.resolver);
            let token = cancel.clone();
            let poll_interval = self.config.poll_interval;

            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, state, cache, resolver, token, poll_interval).await;
            }));
        }

        *workers = Some(WorkerSet { cancel, handles });
        info!("Download queue started with {} workers", self.config.worker_count);
        Ok(())
    }

    /// Stop the worker pool
    ///
    /// Idempotent. Cancels in-flight resolver processes, waits for every
    /// worker to return, and discards pending requests, leaving the queue in
    /// its fresh-start state.
    pub async fn stop(&self) -> QueueResult<()> {
        let Some(set) = self.workers.lock().await.take() else {
            return Ok(());
        };

        {
            let mut state = self.state.lock().await;
            state.set_running(false);
            state.clear_pending();
        }

        set.cancel.cancel();
        for handle in set.handles {
            if let Err(e) = handle.await {
                warn!("Worker task failed during shutdown: {}", e);
            }
        }

        info!("Download queue stopped");
        Ok(())
    }

    /// Add a video to the download queue
    ///
    /// Duplicate identifiers (pending or in-flight) are rejected with
    /// [`QueueError::AlreadyQueued`]; an identifier the cache already holds
    /// is accepted as a no-op.
    pub async fn enqueue(
        &self,
        id: VideoId,
        url: impl Into<String>,
        format: DownloadFormat,
    ) -> QueueResult<()> {
        let mut state = self.state.lock().await;

        if !state.is_running() {
            return Err(QueueError::Stopped);
        }

        if state.contains(&id) {
            return Err(QueueError::AlreadyQueued { id: id.to_string() });
        }

        if self.cache.lookup(&id).await.is_some() {
            debug!("Skipping enqueue, {} already cached", id);
            return Ok(());
        }

        let request = DownloadRequest::new(
            id.clone(),
            url,
            format,
            self.config.max_height,
            self.config.max_length_seconds,
        );
        state.push(request);
        debug!("Queued download for {}", id);
        Ok(())
    }

    /// Copy of the request for an identifier, if pending or in-flight
    ///
    /// Terminal requests are not retained; once a worker finishes, the
    /// identifier is no longer found here.
    pub async fn status(&self, id: &VideoId) -> Option<DownloadRequest> {
        self.state.lock().await.status(id)
    }

    /// Number of pending requests
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.pending_len()
    }

    /// Number of in-flight requests
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active_len()
    }

    /// Whether the queue is accepting work
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }
}

/// Worker loop: claim work, resolve it, register the result
async fn worker_loop(
    worker_id: usize,
    state: Arc<Mutex<QueueState>>,
    cache: Arc<CacheStore>,
    resolver: Arc<dyn VideoResolver>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = { state.lock().await.pop_to_active() };
        let Some(mut request) = next else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => continue,
            }
        };

        info!("Worker {} downloading {} ({})", worker_id, request.id, request.format);

        let result = resolver.fetch(&request, cancel.child_token()).await;
        request.finished_at = Some(Utc::now());

        match result {
            Ok(file_name) => match cache.register(request.id.clone(), &file_name).await {
                Ok(()) => {
                    request.state = DownloadState::Succeeded;
                    info!("Worker {} completed {} -> {}", worker_id, request.id, file_name);
                }
                Err(e) => {
                    request.state = DownloadState::Failed;
                    request.error = Some(e.to_string());
                    warn!("Worker {} failed to register {}: {}", worker_id, request.id, e);
                }
            },
            Err(ResolverError::Cancelled) => {
                request.state = DownloadState::Failed;
                request.error = Some(ResolverError::Cancelled.to_string());
                debug!("Worker {} download of {} cancelled", worker_id, request.id);
            }
            Err(e) => {
                request.state = DownloadState::Failed;
                request.error = Some(e.to_string());
                warn!("Worker {} download of {} failed: {}", worker_id, request.id, e);
            }
        }

        state.lock().await.remove_active(&request.id);
    }

    debug!("Worker {} stopped", worker_id);
}

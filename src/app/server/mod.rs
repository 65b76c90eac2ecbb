//! Loopback HTTP dispatcher
//!
//! Binds `127.0.0.1:<listen_port>` and routes the resolve, cookies, and
//! status endpoints; everything else is served as static content from the
//! cache directory. The server owns the download queue's lifecycle: starting
//! the server starts the queue, stopping the server stops the queue first
//! and then shuts the listener down gracefully.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::cache::CacheStore;
use crate::app::queue::DownloadQueue;
use crate::config::Config;
use crate::constants::server::{REQUEST_TIMEOUT, SHUTDOWN_TIMEOUT};
use crate::errors::{ServerError, ServerResult};

use handlers::AppState;

/// A started server's handles
struct RunningServer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Loopback HTTP server composing the cache store and download queue
pub struct ApiServer {
    listen_port: u16,
    queue: Arc<DownloadQueue>,
    state: Arc<AppState>,
    running: Mutex<Option<RunningServer>>,
}

impl ApiServer {
    /// Create a stopped server
    pub fn new(config: &Config, cache: Arc<CacheStore>, queue: Arc<DownloadQueue>) -> Self {
        let state = Arc::new(AppState {
            cache,
            queue: Arc::clone(&queue),
            public_url_base: config.trimmed_url_base().to_string(),
            cookies_path: config.effective_cookies_path(),
        });

        Self {
            listen_port: config.listen_port,
            queue,
            state,
            running: Mutex::new(None),
        }
    }

    /// Bind the listener, start the download queue, and serve requests
    ///
    /// Port 0 binds an ephemeral port; [`local_addr`](Self::local_addr)
    /// reports the actual address.
    pub async fn start(&self) -> ServerResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = format!("127.0.0.1:{}", self.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        self.queue.start().await?;

        let router = build_router(Arc::clone(&self.state));
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone().cancelled_owned();

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(shutdown);
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        });

        *running = Some(RunningServer {
            cancel,
            handle,
            local_addr,
        });

        info!("Server listening on {}", local_addr);
        Ok(())
    }

    /// Stop the download queue, then shut the listener down gracefully
    ///
    /// In-flight handlers get [`SHUTDOWN_TIMEOUT`] to finish before being
    /// abandoned.
    pub async fn stop(&self) -> ServerResult<()> {
        let Some(server) = self.running.lock().await.take() else {
            return Err(ServerError::NotRunning);
        };

        self.queue.stop().await?;

        server.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, server.handle)
            .await
            .is_err()
        {
            error!("Graceful shutdown timed out, abandoning in-flight handlers");
        }

        info!("Server stopped");
        Ok(())
    }

    /// Whether the server is currently running
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Actual bound address while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.local_addr)
    }
}

/// Assemble the router: API routes, then static cache fallback
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/getvideo", get(handlers::get_video))
        .route("/api/youtube-cookies", post(handlers::youtube_cookies))
        .route("/api/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .fallback(handlers::serve_cache_file)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

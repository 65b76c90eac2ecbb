//! Internal state for the download queue
//!
//! One mutex in the queue core guards this whole struct: the pending FIFO,
//! the active map, and the running flag change together, which is what makes
//! the dedup check and the move-to-active race free.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;

use crate::app::models::{DownloadRequest, DownloadState, VideoId};

/// Queue state guarded by the core's mutex
#[derive(Debug, Default)]
pub(super) struct QueueState {
    /// Pending requests in arrival order
    pending: VecDeque<DownloadRequest>,
    /// Requests currently held by a worker
    active: HashMap<VideoId, DownloadRequest>,
    /// Whether workers are accepting work
    running: bool,
}

impl QueueState {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn is_running(&self) -> bool {
        self.running
    }

    pub(super) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Whether an identifier is pending or active
    pub(super) fn contains(&self, id: &VideoId) -> bool {
        self.active.contains_key(id) || self.pending.iter().any(|r| &r.id == id)
    }

    pub(super) fn push(&mut self, request: DownloadRequest) {
        self.pending.push_back(request);
    }

    /// Pop the head of the FIFO and move it into the active set
    ///
    /// The returned copy is already marked running; the active map holds an
    /// identical copy for status queries.
    pub(super) fn pop_to_active(&mut self) -> Option<DownloadRequest> {
        let mut request = self.pending.pop_front()?;
        request.state = DownloadState::Running;
        request.started_at = Some(Utc::now());
        self.active.insert(request.id.clone(), request.clone());
        Some(request)
    }

    /// Drop an identifier from the active set once its worker is done
    pub(super) fn remove_active(&mut self, id: &VideoId) {
        self.active.remove(id);
    }

    /// Copy of the request for an identifier, active entries first
    pub(super) fn status(&self, id: &VideoId) -> Option<DownloadRequest> {
        self.active
            .get(id)
            .cloned()
            .or_else(|| self.pending.iter().find(|r| &r.id == id).cloned())
    }

    pub(super) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(super) fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Drop all pending requests (used when stopping)
    pub(super) fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

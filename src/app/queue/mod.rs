//! Background download queue
//!
//! A deduplicated FIFO of pending downloads drained by a pool of worker
//! tasks. A given identifier is processed by at most one worker at a time:
//! `enqueue` rejects duplicates and dequeueing atomically moves the request
//! into the active set. Stopping the queue cancels in-flight resolver
//! processes and waits for every worker to return; a stopped queue can be
//! started again.

pub mod core;
mod state;

pub use core::{DownloadQueue, QueueConfig};

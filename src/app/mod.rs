//! Core application logic for VRC Video Cacher
//!
//! This module contains the caching and dispatch core: URL classification,
//! the on-disk cache store, the background download queue, the external
//! resolver adapter, the loopback HTTP dispatcher, and the stub protocol.

pub mod cache;
pub mod extractor;
pub mod models;
pub mod queue;
pub mod resolver;
pub mod server;
pub mod stub;

// Re-export main public API
pub use cache::CacheStore;
pub use extractor::{classify, UrlClass};
pub use models::{
    CacheEntry, DownloadFormat, DownloadRequest, DownloadState, SourceKind, VideoId,
};
pub use queue::{DownloadQueue, QueueConfig};
pub use resolver::{VideoResolver, YtdlpResolver};
pub use server::ApiServer;

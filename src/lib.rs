//! VRC Video Cacher Library
//!
//! A local content cache and dispatch daemon that sits between a VR host
//! application's video-URL resolver and the public internet. Previously
//! fetched videos are served from disk over loopback HTTP; unknown videos
//! are fetched in the background through an external resolver binary
//! (yt-dlp) while the host falls back to its own resolution.
//!
//! A small stub executable, installed in place of the host's resolver,
//! forwards every invocation to the daemon and prints the reply. From the
//! host's point of view nothing changed, except that repeat videos start
//! instantly.
//!
//! # Architecture Overview
//!
//! - [`app::extractor`] classifies request URLs and extracts video
//!   identifiers
//! - [`app::cache`] is the on-disk store plus in-memory index with LRU
//!   eviction under a byte budget
//! - [`app::queue`] is the deduplicated FIFO download queue with a
//!   cancellable worker pool (single-flight per identifier)
//! - [`app::resolver`] holds the external resolver capability and its
//!   yt-dlp process adapter
//! - [`app::server`] is the loopback axum dispatcher composing all of the
//!   above
//! - [`app::stub`] provides argv parsing and request building for the stub
//!   executable
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vrc_video_cacher::app::{ApiServer, CacheStore, DownloadQueue, QueueConfig, YtdlpResolver};
//! use vrc_video_cacher::config::Config;
//!
//! # async fn example() -> vrc_video_cacher::errors::Result<()> {
//! let config = Config::default();
//!
//! let cache = Arc::new(CacheStore::new(&config.cache_dir, config.cache_max_bytes).await?);
//! cache.scan().await?;
//!
//! let resolver = Arc::new(YtdlpResolver::from_config(&config));
//! let queue = Arc::new(DownloadQueue::new(
//!     QueueConfig::from_config(&config),
//!     Arc::clone(&cache),
//!     resolver,
//! ));
//!
//! let server = ApiServer::new(&config, cache, queue);
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod constants;
pub mod errors;

// CLI module - public for main.rs access but contents not re-exported,
// keeping CLI dependencies out of library consumers.
pub mod cli;

// Re-export the most commonly used types at the top level
pub use app::{
    ApiServer, CacheEntry, CacheStore, DownloadFormat, DownloadQueue, DownloadRequest,
    DownloadState, QueueConfig, SourceKind, VideoId, VideoResolver, YtdlpResolver,
};
pub use config::Config;
pub use errors::{AppError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_api_accessibility() {
        // Key types stay reachable at the top level
        let _config = Config::default();
        let _format = DownloadFormat::Mp4;
        let _id = VideoId::new("abc123");
    }
}

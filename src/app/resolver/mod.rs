//! External resolver capability
//!
//! Download workers consume resolvers through the [`VideoResolver`] trait:
//! given a request and a cancellation token, a resolver fetches the video
//! into the cache directory and reports the produced file's basename. The
//! production implementation runs the yt-dlp binary; tests substitute
//! in-memory doubles.

pub mod ytdlp;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::ResolverResult;

use super::models::DownloadRequest;

/// Capability to fetch a video into the cache directory
#[async_trait]
pub trait VideoResolver: Send + Sync {
    /// Fetch the video named by `request`, writing it into the cache
    /// directory, and return the basename of the produced file.
    ///
    /// Implementations must honor `cancel`: on cancellation they abandon
    /// the fetch, leave no registered state behind, and return
    /// [`ResolverError::Cancelled`](crate::errors::ResolverError::Cancelled).
    async fn fetch(
        &self,
        request: &DownloadRequest,
        cancel: CancellationToken,
    ) -> ResolverResult<String>;
}

pub use ytdlp::YtdlpResolver;

//! Application constants for VRC Video Cacher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Cache store limits and file naming
pub mod cache {
    /// File extensions treated as cache entries
    pub const ALLOWED_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

    /// Maximum length of a video identifier
    pub const MAX_ID_LENGTH: usize = 64;

    /// Name of the cookies file inside the cache directory
    pub const COOKIES_FILE_NAME: &str = "youtube_cookies.txt";
}

/// Download queue configuration
pub mod queue {
    use super::Duration;

    /// Default number of concurrent download workers
    pub const DEFAULT_WORKER_COUNT: usize = 2;

    /// How long an idle worker sleeps before polling the queue again
    pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
}

/// HTTP server configuration
pub mod server {
    use super::Duration;

    /// Default loopback port
    pub const DEFAULT_PORT: u16 = 9696;

    /// Per-request handler deadline
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Deadline for graceful shutdown before in-flight handlers are abandoned
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
}

/// External resolver process configuration
pub mod resolver {
    /// Upper bound on captured resolver output included in error messages
    pub const OUTPUT_CAPTURE_LIMIT: usize = 4096;
}

/// Default configuration values
pub mod defaults {
    /// Default maximum video height passed to the resolver
    pub const MAX_HEIGHT: u32 = 1080;

    /// Default maximum video length in seconds
    pub const MAX_LENGTH_SECONDS: u32 = 120;

    /// Default public URL base used to form returned local URLs
    pub const PUBLIC_URL_BASE: &str = "http://127.0.0.1:9696";
}

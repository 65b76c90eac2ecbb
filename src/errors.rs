//! Error types for VRC Video Cacher
//!
//! This module defines error types for all components of the application.
//! Errors are designed to be actionable and provide clear context for
//! debugging and user feedback.

use std::path::PathBuf;
use thiserror::Error;

/// Cache store errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Identifier absent from the cache index
    #[error("cache entry not found: {id}")]
    EntryNotFound { id: String },

    /// Cache directory could not be created or read
    #[error("cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Filesystem failure during a cache mutation
    #[error("cache I/O error")]
    Io(#[from] std::io::Error),
}

/// Download queue errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Enqueue was attempted while the queue is not running
    #[error("download queue is stopped")]
    Stopped,

    /// The identifier is already pending or being downloaded
    #[error("video already queued or downloading: {id}")]
    AlreadyQueued { id: String },

    /// Registering a finished download with the cache failed
    #[error("failed to register downloaded file")]
    Cache(#[from] CacheError),
}

/// External resolver process errors
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The resolver binary could not be spawned
    #[error("failed to spawn resolver at {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The resolver exited with a non-zero status
    #[error("resolver failed (exit {status}): {output}")]
    ProcessFailed { status: i32, output: String },

    /// The resolver exited successfully but produced no matching file
    #[error("resolver produced no output file for {id}")]
    NoOutputFile { id: String },

    /// The download was cancelled during shutdown
    #[error("download cancelled")]
    Cancelled,

    /// I/O error while waiting on the resolver or scanning its output
    #[error("resolver I/O error")]
    Io(#[from] std::io::Error),
}

/// HTTP server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// `start()` was called while the server is running
    #[error("server is already running")]
    AlreadyRunning,

    /// `stop()` was called while the server is not running
    #[error("server is not running")]
    NotRunning,

    /// The loopback listener could not be bound
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Posted cookies failed validation
    #[error("invalid cookies")]
    InvalidCookies,

    /// The download queue failed during server lifecycle changes
    #[error("queue error")]
    Queue(#[from] QueueError),

    /// I/O failure inside a handler
    #[error("server I/O error")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read or written
    #[error("failed to access configuration file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON
    #[error("invalid configuration format")]
    Parse(#[from] serde_json::Error),

    /// A configuration value is out of range
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Stub executable errors
#[derive(Error, Debug)]
pub enum StubError {
    /// No argument looked like a URL
    #[error("no URL found in arguments")]
    NoUrl,

    /// The daemon could not be reached
    #[error("connection failed - is vrc-video-cacher running?")]
    Http(#[from] reqwest::Error),

    /// The daemon answered with a non-200 status
    #[error("server returned error ({status}): {body}")]
    ServerError { status: u16, body: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Queue error
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Resolver error
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Server error
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Cache(_) => "cache",
            AppError::Queue(_) => "queue",
            AppError::Resolver(_) => "resolver",
            AppError::Server(_) => "server",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Queue result type alias
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Resolver result type alias
pub type ResolverResult<T> = std::result::Result<T, ResolverError>;

/// Server result type alias
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

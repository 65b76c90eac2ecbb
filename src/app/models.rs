//! Core data types for the caching daemon
//!
//! This module defines the domain model shared by the cache store, the
//! download queue, the resolver adapter, and the HTTP dispatcher: validated
//! video identifiers, source classification, download formats, cache entries,
//! and download requests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::cache::MAX_ID_LENGTH;

/// Validated video identifier
///
/// An identifier is an opaque, non-empty string of at most 64 characters
/// drawn from `[A-Za-z0-9_-]`. It uniquely names a logical piece of content
/// and is stable across requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Create a validated identifier, rejecting anything outside the
    /// identifier alphabet or length bounds.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if Self::is_valid(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Check whether a string is a well-formed identifier
    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw.len() <= MAX_ID_LENGTH
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Recognized origin of a resolve request URL
///
/// A closed set: URLs from the primary source family carry an extractable
/// identifier; everything else is bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// YouTube canonical, embed, or short-link URL
    YouTube,
    /// Any other URL; the daemon declines to act
    Other,
}

/// Video download format requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    Mp4,
    Webm,
}

impl DownloadFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadFormat::Mp4 => "mp4",
            DownloadFormat::Webm => "webm",
        }
    }

    /// Map the `avpro` request flag to a format: AVPro players prefer
    /// webm VP8/VP9, everything else gets mp4 H264.
    pub fn from_avpro(avpro: bool) -> Self {
        if avpro {
            DownloadFormat::Webm
        } else {
            DownloadFormat::Mp4
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A cached video file and its index record
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// Video identifier (the file stem)
    pub id: VideoId,
    /// Basename of the file inside the cache directory
    pub file_name: String,
    /// File size in bytes at the moment the entry was created or refreshed
    pub size: u64,
    /// Last time the entry was served or registered
    pub last_access: DateTime<Utc>,
    /// Time of first observation
    pub created: DateTime<Utc>,
}

/// Lifecycle state of a download request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadState::Queued => "queued",
            DownloadState::Running => "running",
            DownloadState::Succeeded => "succeeded",
            DownloadState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A pending or in-flight download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Video identifier
    pub id: VideoId,
    /// Original share URL passed to the resolver
    pub url: String,
    /// Requested container format
    pub format: DownloadFormat,
    /// Maximum video height passed to the resolver
    pub max_height: u32,
    /// Maximum video length in seconds
    pub max_length_seconds: u32,
    /// When the request entered the queue
    pub queued_at: DateTime<Utc>,
    /// When a worker picked the request up
    pub started_at: Option<DateTime<Utc>>,
    /// When the worker finished
    pub finished_at: Option<DateTime<Utc>>,
    /// Current lifecycle state
    pub state: DownloadState,
    /// Failure description, present iff `state == Failed`
    pub error: Option<String>,
}

impl DownloadRequest {
    /// Create a freshly queued request
    pub fn new(
        id: VideoId,
        url: impl Into<String>,
        format: DownloadFormat,
        max_height: u32,
        max_length_seconds: u32,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            format,
            max_height,
            max_length_seconds,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            state: DownloadState::Queued,
            error: None,
        }
    }

    /// Expected output basename for this request
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }
}

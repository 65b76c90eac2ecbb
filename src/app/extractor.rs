//! Request URL classification and identifier extraction
//!
//! Pure functions that decide whether a resolve request targets a known
//! source and, if so, extract the video identifier. Unrecognized or
//! malformed URLs classify as bypass: the dispatcher answers them with an
//! empty body and the host falls back to its own resolution.

use url::Url;

use super::models::{SourceKind, VideoId};

/// Result of classifying a request URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    /// A YouTube URL with an extractable identifier
    YouTube(VideoId),
    /// Anything else; the daemon declines to act
    Bypass,
}

impl UrlClass {
    /// The source kind of this classification
    pub fn kind(&self) -> SourceKind {
        match self {
            UrlClass::YouTube(_) => SourceKind::YouTube,
            UrlClass::Bypass => SourceKind::Other,
        }
    }
}

/// Classify a request URL and extract the video identifier
///
/// Recognized shapes:
/// - `youtu.be/<id>` short links (first non-empty path segment)
/// - `youtube.com/watch?v=<id>` (including any subdomain such as `m.` or `www.`)
/// - `youtube.com/embed/<id>` and `youtube.com/v/<id>` (identifier stops at
///   the next `/`)
///
/// The identifier is taken as the URL parser leaves it; no additional
/// percent-decoding is applied. A segment that does not form a valid
/// identifier classifies as bypass.
pub fn classify(raw: &str) -> UrlClass {
    let Ok(parsed) = Url::parse(raw) else {
        return UrlClass::Bypass;
    };

    let Some(host) = parsed.host_str() else {
        return UrlClass::Bypass;
    };

    if host == "youtu.be" {
        return match first_path_segment(&parsed).and_then(VideoId::new) {
            Some(id) => UrlClass::YouTube(id),
            None => UrlClass::Bypass,
        };
    }

    if !is_youtube_host(host) {
        return UrlClass::Bypass;
    }

    let path = parsed.path();

    let candidate = if path == "/watch" {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    } else if let Some(rest) = path.strip_prefix("/embed/") {
        segment_before_slash(rest)
    } else if let Some(rest) = path.strip_prefix("/v/") {
        segment_before_slash(rest)
    } else {
        None
    };

    match candidate.and_then(VideoId::new) {
        Some(id) => UrlClass::YouTube(id),
        None => UrlClass::Bypass,
    }
}

/// Check whether a host belongs to the canonical YouTube domain
fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com" || host.ends_with(".youtube.com")
}

/// First non-empty path segment of a URL
fn first_path_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Path remainder up to the next `/`, if non-empty
fn segment_before_slash(rest: &str) -> Option<String> {
    let segment = rest.split('/').next().unwrap_or("");
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_owned())
    }
}

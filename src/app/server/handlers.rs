//! HTTP request handlers
//!
//! The dispatch endpoint replies fast and never blocks on a download: a hit
//! returns the local URL, everything else returns an empty body and the host
//! retries on a later request once the background fetch has landed.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::app::cache::CacheStore;
use crate::app::extractor::{classify, UrlClass};
use crate::app::models::DownloadFormat;
use crate::app::queue::DownloadQueue;
use crate::errors::QueueError;

/// Shared handler state
pub(super) struct AppState {
    pub cache: Arc<CacheStore>,
    pub queue: Arc<DownloadQueue>,
    /// Base used to form returned local URLs, no trailing slash
    pub public_url_base: String,
    /// Where posted cookies are persisted
    pub cookies_path: PathBuf,
}

/// Query parameters of `GET /api/getvideo`
#[derive(Debug, Deserialize)]
pub(super) struct GetVideoParams {
    url: Option<String>,
    avpro: Option<String>,
    source: Option<String>,
}

/// `GET /api/getvideo`: main dispatch
///
/// Returns the local URL on a cache hit, an empty body for bypassed URLs
/// and cache misses (the miss also enqueues a background download), and 400
/// when no URL was supplied.
pub(super) async fn get_video(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetVideoParams>,
) -> Response {
    let Some(url) = params.url.filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "No URL provided").into_response();
    };

    // avpro defaults to true; only the literal "false" disables it
    let avpro = params.avpro.as_deref() != Some("false");
    let source = params.source.as_deref().unwrap_or("vrchat");
    let format = DownloadFormat::from_avpro(avpro);

    let UrlClass::YouTube(id) = classify(&url) else {
        debug!("Bypassing non-YouTube URL from {}: {}", source, url);
        return String::new().into_response();
    };

    if let Some(entry) = state.cache.lookup(&id).await {
        if let Err(e) = state.cache.touch(&id).await {
            debug!("Failed to touch {}: {}", id, e);
        }
        info!("Cache hit for {} (source: {})", id, source);
        return format!("{}/{}", state.public_url_base, entry.file_name).into_response();
    }

    match state.queue.enqueue(id.clone(), url, format).await {
        Ok(()) => info!("Cache miss for {}, download queued", id),
        Err(QueueError::AlreadyQueued { .. }) => {
            debug!("Download for {} already in flight", id);
        }
        Err(e) => warn!("Failed to queue download for {}: {}", id, e),
    }

    String::new().into_response()
}

/// `POST /api/youtube-cookies`: validate and persist a cookies file
pub(super) async fn youtube_cookies(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Response {
    if !validate_cookies(&body) {
        return (StatusCode::BAD_REQUEST, "Invalid cookies").into_response();
    }

    if let Err(e) = write_cookies(&state.cookies_path, &body).await {
        warn!("Failed to save cookies: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save cookies").into_response();
    }

    info!("Saved cookies to {}", state.cookies_path.display());
    Json(json!({
        "status": "success",
        "message": "Cookies received",
    }))
    .into_response()
}

/// `GET /api/health`: liveness probe
pub(super) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/status`: daemon status summary
pub(super) async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "running": true,
        "cacheSize": state.cache.total_bytes().await,
        "cacheCount": state.cache.len().await,
        "version": crate::VERSION,
    }))
}

/// Fallback handler serving cached files as static content
///
/// Only plain basenames are accepted; anything with a path separator, a
/// parent reference, or a symlink escaping the cache directory is refused.
/// Directory listing does not exist.
pub(super) async fn serve_cache_file(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Response {
    let name = uri.path().trim_start_matches('/');
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let cache_dir = state.cache.cache_dir();
    let Ok(cache_root) = tokio::fs::canonicalize(cache_dir).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Ok(resolved) = tokio::fs::canonicalize(cache_dir.join(name)).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !resolved.starts_with(&cache_root) {
        warn!("Refusing to serve {} outside cache directory", name);
        return StatusCode::NOT_FOUND.into_response();
    }

    let Ok(metadata) = tokio::fs::metadata(&resolved).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !metadata.is_file() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Ok(file) = tokio::fs::File::open(&resolved).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let stream = ReaderStream::new(file);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(name))
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Cookies must look like a logged-in YouTube export
fn validate_cookies(cookies: &str) -> bool {
    !cookies.is_empty() && cookies.contains("youtube.com") && cookies.contains("LOGIN_INFO")
}

/// Persist cookies verbatim, world-readable for the resolver process
async fn write_cookies(path: &std::path::Path, cookies: &str) -> std::io::Result<()> {
    tokio::fs::write(path, cookies).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
    }

    Ok(())
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

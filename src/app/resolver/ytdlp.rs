//! yt-dlp process adapter
//!
//! Builds the yt-dlp argument vector for a download request, runs the binary
//! under the queue's cancellation token, and locates the file it produced.
//! yt-dlp does not always honor the output template literally (merged
//! downloads may land as `<id>.f137.mp4` and the like), so after a
//! successful exit the cache directory is searched for the best candidate.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::cache::ALLOWED_EXTENSIONS;
use crate::constants::resolver::OUTPUT_CAPTURE_LIMIT;
use crate::errors::{ResolverError, ResolverResult};

use super::super::models::{DownloadFormat, DownloadRequest, VideoId};
use super::VideoResolver;

/// Resolver backed by an external yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtdlpResolver {
    /// Path to the yt-dlp executable
    ytdlp_path: PathBuf,
    /// Cache directory files are downloaded into
    cache_dir: PathBuf,
    /// Pass a cookies file when it exists
    use_cookies: bool,
    /// Cookies file location
    cookies_path: PathBuf,
    /// Extra arguments appended verbatim as a single token
    extra_args: String,
}

impl YtdlpResolver {
    /// Create a resolver from the configuration snapshot
    pub fn from_config(config: &Config) -> Self {
        Self {
            ytdlp_path: config.resolver_path.clone(),
            cache_dir: config.cache_dir.clone(),
            use_cookies: config.use_cookies,
            cookies_path: config.effective_cookies_path(),
            extra_args: config.resolver_extra_args.clone(),
        }
    }

    /// Build the yt-dlp argument vector for a request
    ///
    /// The format selectors are fixed strings: webm (AVPro) prefers
    /// VP8/VP9 + webm audio, mp4 prefers H264 + m4a, both capped at the
    /// request's maximum height with progressively looser fallbacks.
    pub fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        let output_template = self
            .cache_dir
            .join(request.output_file_name())
            .to_string_lossy()
            .into_owned();

        let h = request.max_height;
        let selector = match request.format {
            DownloadFormat::Webm => format!(
                "bestvideo[height<={h}][ext=webm]+bestaudio[ext=webm]/best[height<={h}][ext=webm]/best[height<={h}]"
            ),
            DownloadFormat::Mp4 => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best[height<={h}]"
            ),
        };

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            // The resolver's own TLS stack is outside the daemon's trust
            // boundary.
            "--no-check-certificate".to_string(),
            "-o".to_string(),
            output_template,
            "-f".to_string(),
            selector,
        ];

        if self.use_cookies && self.cookies_path.exists() {
            args.push("--cookies".to_string());
            args.push(self.cookies_path.to_string_lossy().into_owned());
        }

        if !self.extra_args.is_empty() {
            args.push(self.extra_args.clone());
        }

        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl VideoResolver for YtdlpResolver {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        cancel: CancellationToken,
    ) -> ResolverResult<String> {
        let args = self.build_args(request);
        debug!("Running {} {:?}", self.ytdlp_path.display(), args);

        let mut child = Command::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ResolverError::Spawn {
                path: self.ytdlp_path.clone(),
                source,
            })?;

        // Dropping the wait future on cancellation drops the child handle,
        // which kills the process (kill_on_drop).
        let output = tokio::select! {
            result = child.wait_with_output() => result?,
            _ = cancel.cancelled() => {
                warn!("Download of {} cancelled, terminating resolver", request.id);
                return Err(ResolverError::Cancelled);
            }
        };

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let truncated: String = combined.chars().take(OUTPUT_CAPTURE_LIMIT).collect();
            return Err(ResolverError::ProcessFailed {
                status: output.status.code().unwrap_or(-1),
                output: truncated,
            });
        }

        locate_output(&self.cache_dir, &request.id, request.format).await
    }
}

/// Find the file a resolver run produced for an identifier
///
/// Candidates are ranked: the exact `<id>.<ext>` template first, then
/// `<id>.*.<ext>` variants preferring the largest file, then any `<id>.*`
/// with an allowed extension. Returns the basename of the best match.
pub async fn locate_output(
    cache_dir: &Path,
    id: &VideoId,
    format: DownloadFormat,
) -> ResolverResult<String> {
    let exact = format!("{}.{}", id, format.extension());
    if tokio::fs::try_exists(cache_dir.join(&exact)).await? {
        return Ok(exact);
    }

    let prefix = format!("{}.", id);
    let suffix = format!(".{}", format.extension());

    let mut same_format: Vec<(String, u64)> = Vec::new();
    let mut other_format: Vec<String> = Vec::new();

    let mut dir = tokio::fs::read_dir(cache_dir).await?;
    while let Some(dirent) = dir.next_entry().await? {
        let file_name = dirent.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !name.starts_with(&prefix) {
            continue;
        }

        if name.ends_with(&suffix) {
            let size = dirent.metadata().await.map(|m| m.len()).unwrap_or(0);
            same_format.push((name.to_string(), size));
        } else if let Some((_, ext)) = name.rsplit_once('.') {
            if ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                other_format.push(name.to_string());
            }
        }
    }

    if let Some((name, _)) = same_format.into_iter().max_by_key(|(_, size)| *size) {
        return Ok(name);
    }

    other_format.sort();
    other_format
        .into_iter()
        .next()
        .ok_or_else(|| ResolverError::NoOutputFile { id: id.to_string() })
}

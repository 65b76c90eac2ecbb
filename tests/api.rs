//! End-to-end tests over a live loopback server
//!
//! Each test boots the full stack (cache store, download queue, dispatcher)
//! on an ephemeral port with a scripted resolver double and drives it
//! through real HTTP requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use vrc_video_cacher::app::resolver::VideoResolver;
use vrc_video_cacher::app::{ApiServer, CacheStore, DownloadQueue, QueueConfig, VideoId};
use vrc_video_cacher::config::Config;
use vrc_video_cacher::errors::{ResolverError, ResolverResult};
use vrc_video_cacher::DownloadRequest;

/// Resolver double that writes a fixed-size file named by the request
struct ScriptedResolver {
    cache_dir: PathBuf,
    file_size: usize,
}

#[async_trait]
impl VideoResolver for ScriptedResolver {
    async fn fetch(
        &self,
        request: &DownloadRequest,
        cancel: CancellationToken,
    ) -> ResolverResult<String> {
        if cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        let file_name = request.output_file_name();
        tokio::fs::write(self.cache_dir.join(&file_name), vec![0u8; self.file_size])
            .await
            .map_err(ResolverError::Io)?;
        Ok(file_name)
    }
}

/// A running daemon plus handles for assertions
struct TestDaemon {
    server: ApiServer,
    cache: Arc<CacheStore>,
    queue: Arc<DownloadQueue>,
    base: String,
    _temp: TempDir,
}

impl TestDaemon {
    /// Boot the full stack on an ephemeral port
    async fn start(cache_max_bytes: u64, resolver_file_size: usize) -> Self {
        let temp = TempDir::new().unwrap();

        let mut config = Config::default();
        config.cache_dir = temp.path().to_path_buf();
        config.cache_max_bytes = cache_max_bytes;
        config.listen_port = 0;
        config.public_url_base = "http://127.0.0.1:9696".to_string();

        let cache = Arc::new(
            CacheStore::new(temp.path(), cache_max_bytes)
                .await
                .unwrap(),
        );
        cache.scan().await.unwrap();

        let resolver = Arc::new(ScriptedResolver {
            cache_dir: temp.path().to_path_buf(),
            file_size: resolver_file_size,
        });

        let mut queue_config = QueueConfig::from_config(&config);
        queue_config.poll_interval = Duration::from_millis(10);
        let queue = Arc::new(DownloadQueue::new(
            queue_config,
            Arc::clone(&cache),
            resolver,
        ));

        let server = ApiServer::new(&config, Arc::clone(&cache), Arc::clone(&queue));
        server.start().await.unwrap();
        let addr = server.local_addr().await.unwrap();

        Self {
            server,
            cache,
            queue,
            base: format!("http://{addr}"),
            _temp: temp,
        }
    }

    fn cache_dir(&self) -> &std::path::Path {
        self.cache.cache_dir()
    }

    fn getvideo_url(&self, video_url: &str, avpro: &str) -> String {
        format!(
            "{}/api/getvideo?url={}&avpro={}&source=vrchat",
            self.base,
            urlencode(video_url),
            avpro
        )
    }

    /// Repeat a getvideo request until it answers with a non-empty body
    async fn await_cached_reply(&self, video_url: &str, avpro: &str) -> String {
        timeout(Duration::from_secs(5), async {
            loop {
                let body = reqwest::get(self.getvideo_url(video_url, avpro))
                    .await
                    .unwrap()
                    .text()
                    .await
                    .unwrap();
                if !body.is_empty() {
                    return body;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("request never produced a cached reply")
    }

    async fn stop(self) {
        self.server.stop().await.unwrap();
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

fn id(s: &str) -> VideoId {
    VideoId::new(s).unwrap()
}

#[tokio::test]
async fn test_cache_hit_returns_local_url() {
    let daemon = TestDaemon::start(0, 100).await;

    // Seed the cache with a 12-byte file and index it
    tokio::fs::write(daemon.cache_dir().join("dQw4w9WgXcQ.mp4"), b"0123456789ab")
        .await
        .unwrap();
    daemon
        .cache
        .register(id("dQw4w9WgXcQ"), "dQw4w9WgXcQ.mp4")
        .await
        .unwrap();
    let before = daemon.cache.lookup(&id("dQw4w9WgXcQ")).await.unwrap();

    let response = reqwest::get(daemon.getvideo_url(
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "false",
    ))
    .await
    .unwrap();

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "{content_type}");
    assert_eq!(
        response.text().await.unwrap(),
        "http://127.0.0.1:9696/dQw4w9WgXcQ.mp4"
    );

    // Side effect: last_access advanced
    let after = daemon.cache.lookup(&id("dQw4w9WgXcQ")).await.unwrap();
    assert!(after.last_access > before.last_access);

    daemon.stop().await;
}

#[tokio::test]
async fn test_non_youtube_url_is_bypassed() {
    let daemon = TestDaemon::start(0, 100).await;

    let response = reqwest::get(daemon.getvideo_url("https://example.com/video.mp4", "true"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");

    // No download was queued
    assert_eq!(daemon.queue.queue_len().await, 0);
    assert_eq!(daemon.queue.active_count().await, 0);

    daemon.stop().await;
}

#[tokio::test]
async fn test_miss_enqueues_and_later_request_hits() {
    let daemon = TestDaemon::start(0, 100).await;
    let video_url = "https://youtu.be/abcdEFGH123";

    // First request: synchronous empty reply, download queued
    let response = reqwest::get(daemon.getvideo_url(video_url, "false"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "");

    // Within bounded time the cache fills and a repeat request hits
    let body = daemon.await_cached_reply(video_url, "false").await;
    assert_eq!(body, "http://127.0.0.1:9696/abcdEFGH123.mp4");
    assert!(daemon.cache.lookup(&id("abcdEFGH123")).await.is_some());

    daemon.stop().await;
}

#[tokio::test]
async fn test_avpro_selects_webm() {
    let daemon = TestDaemon::start(0, 100).await;
    let video_url = "https://youtu.be/webmVideo01";

    reqwest::get(daemon.getvideo_url(video_url, "true"))
        .await
        .unwrap();

    let body = daemon.await_cached_reply(video_url, "true").await;
    assert_eq!(body, "http://127.0.0.1:9696/webmVideo01.webm");

    daemon.stop().await;
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let daemon = TestDaemon::start(0, 100).await;

    let response = reqwest::get(format!("{}/api/getvideo", daemon.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert!(response.text().await.unwrap().contains("URL"));

    // An empty url parameter is the same thing
    let response = reqwest::get(format!("{}/api/getvideo?url=&avpro=true", daemon.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    daemon.stop().await;
}

#[tokio::test]
async fn test_cookies_happy_path() {
    let daemon = TestDaemon::start(0, 100).await;
    let cookies =
        "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\tAAbbCC==\n";

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/youtube-cookies", daemon.base))
        .header("content-type", "text/plain")
        .body(cookies)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("received"), "{body}");
    assert!(body.contains("success"), "{body}");

    // Exactly the posted bytes landed on disk
    let saved = tokio::fs::read(daemon.cache_dir().join("youtube_cookies.txt"))
        .await
        .unwrap();
    assert_eq!(saved, cookies.as_bytes());

    daemon.stop().await;
}

#[tokio::test]
async fn test_cookies_rejects_invalid_body() {
    let daemon = TestDaemon::start(0, 100).await;
    let client = reqwest::Client::new();

    for bad in [
        "",
        "not cookies at all",
        ".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc",       // no LOGIN_INFO
        ".example.com\tTRUE\t/\tTRUE\t0\tLOGIN_INFO\tabc", // no youtube.com
    ] {
        let response = client
            .post(format!("{}/api/youtube-cookies", daemon.base))
            .body(bad)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body: {bad:?}");
        let text = response.text().await.unwrap().to_lowercase();
        assert!(text.contains("invalid"), "{text}");
    }

    assert!(!daemon.cache_dir().join("youtube_cookies.txt").exists());
    daemon.stop().await;
}

#[tokio::test]
async fn test_lru_eviction_over_http() {
    // Budget fits two of the three 1000-byte downloads
    let daemon = TestDaemon::start(2000, 1000).await;

    for video in ["AAAAAAAAAAA", "BBBBBBBBBBB", "CCCCCCCCCCC"] {
        let url = format!("https://youtu.be/{video}");
        reqwest::get(daemon.getvideo_url(&url, "false"))
            .await
            .unwrap();
        // Wait for this download to land before requesting the next so the
        // last-access order is strict
        daemon.await_cached_reply(&url, "false").await;
    }

    assert_eq!(daemon.cache.total_bytes().await, 2000);
    assert!(daemon.cache.lookup(&id("AAAAAAAAAAA")).await.is_none());
    assert!(daemon.cache.lookup(&id("BBBBBBBBBBB")).await.is_some());
    assert!(daemon.cache.lookup(&id("CCCCCCCCCCC")).await.is_some());

    daemon.stop().await;
}

#[tokio::test]
async fn test_health_and_status_endpoints() {
    let daemon = TestDaemon::start(0, 100).await;

    let health: serde_json::Value = reqwest::get(format!("{}/api/health", daemon.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    tokio::fs::write(daemon.cache_dir().join("abc123.mp4"), vec![0u8; 42])
        .await
        .unwrap();
    daemon.cache.register(id("abc123"), "abc123.mp4").await.unwrap();

    let status: serde_json::Value = reqwest::get(format!("{}/api/status", daemon.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);
    assert_eq!(status["cacheSize"], 42);
    assert_eq!(status["cacheCount"], 1);
    assert_eq!(status["version"], vrc_video_cacher::VERSION);

    daemon.stop().await;
}

#[tokio::test]
async fn test_static_file_serving() {
    let daemon = TestDaemon::start(0, 100).await;

    tokio::fs::write(daemon.cache_dir().join("abc123.mp4"), b"video-bytes")
        .await
        .unwrap();

    let response = reqwest::get(format!("{}/abc123.mp4", daemon.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "video/mp4"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"video-bytes");

    // Unknown file
    let response = reqwest::get(format!("{}/missing.mp4", daemon.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Directory listing is disabled
    let response = reqwest::get(format!("{}/", daemon.base)).await.unwrap();
    assert_eq!(response.status(), 404);

    daemon.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_static_rejects_symlink_out_of_cache() {
    let daemon = TestDaemon::start(0, 100).await;

    // A secret outside the cache directory, reachable via symlink
    let outside = TempDir::new().unwrap();
    let secret = outside.path().join("secret.txt");
    tokio::fs::write(&secret, b"do not serve").await.unwrap();
    std::os::unix::fs::symlink(&secret, daemon.cache_dir().join("escape.txt")).unwrap();

    let response = reqwest::get(format!("{}/escape.txt", daemon.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    daemon.stop().await;
}

#[tokio::test]
async fn test_repeated_requests_collapse_to_single_flight() {
    let daemon = TestDaemon::start(0, 100).await;
    let video_url = "https://youtu.be/contested001";

    // Fire several dispatch requests for the same video back to back; the
    // duplicates hit the AlreadyQueued path and still answer 200.
    for _ in 0..5 {
        let response = reqwest::get(daemon.getvideo_url(video_url, "false"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    daemon.await_cached_reply(video_url, "false").await;

    // One download, one registration
    assert_eq!(daemon.cache.len().await, 1);
    daemon.stop().await;
}

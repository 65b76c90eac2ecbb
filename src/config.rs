//! Configuration management for VRC Video Cacher
//!
//! The configuration is a single JSON document. Missing keys take defaults
//! and unknown keys are ignored, so config files written by newer or older
//! builds keep loading. The core components receive this snapshot at
//! construction and never re-read it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{cache, defaults, queue, server};
use crate::errors::{ConfigError, ConfigResult};

/// Application configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding cached video files (absolute path)
    pub cache_dir: PathBuf,
    /// Cache size budget in bytes; 0 disables eviction
    pub cache_max_bytes: u64,
    /// Absolute path to the external resolver binary (yt-dlp)
    pub resolver_path: PathBuf,
    /// Extra arguments appended to the resolver invocation verbatim, as a
    /// single token; values containing whitespace are not split
    pub resolver_extra_args: String,
    /// Pass a cookies file to the resolver when present
    pub use_cookies: bool,
    /// Cookies file location; defaults to `youtube_cookies.txt` inside the
    /// cache directory
    pub cookies_path: Option<PathBuf>,
    /// Maximum video height requested from the resolver
    pub max_height: u32,
    /// Maximum video length in seconds
    pub max_length_seconds: u32,
    /// Number of download workers; values <= 0 fall back to the default
    pub worker_count: i64,
    /// Loopback port the dispatcher binds; 0 picks an ephemeral port
    pub listen_port: u16,
    /// Scheme+host+port used to form returned local URLs
    pub public_url_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_data_dir().join("cache"),
            cache_max_bytes: 0,
            resolver_path: default_data_dir().join("utils").join("yt-dlp"),
            resolver_extra_args: String::new(),
            use_cookies: true,
            cookies_path: None,
            max_height: defaults::MAX_HEIGHT,
            max_length_seconds: defaults::MAX_LENGTH_SECONDS,
            worker_count: queue::DEFAULT_WORKER_COUNT as i64,
            listen_port: server::DEFAULT_PORT,
            public_url_base: defaults::PUBLIC_URL_BASE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file, or create the file with defaults if
    /// it does not exist yet
    pub fn load_or_init(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let config = Self::load_from(path)?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            let config = Self::default();
            config.save(path)?;
            info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    /// Load configuration from an existing file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to a file as pretty-printed JSON
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check that all values are usable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_height < 144 || self.max_height > 4320 {
            return Err(ConfigError::InvalidValue {
                field: "max_height".to_string(),
                reason: "must be between 144 and 4320".to_string(),
            });
        }

        if self.public_url_base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "public_url_base".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Worker count with the <= 0 fallback applied
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count <= 0 {
            queue::DEFAULT_WORKER_COUNT
        } else {
            self.worker_count as usize
        }
    }

    /// Resolved cookies file path
    pub fn effective_cookies_path(&self) -> PathBuf {
        self.cookies_path
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(cache::COOKIES_FILE_NAME))
    }

    /// Public URL base with any trailing slash removed
    pub fn trimmed_url_base(&self) -> &str {
        self.public_url_base.trim_end_matches('/')
    }
}

/// Application data directory (`config.json`, `cache/`, `utils/` live here)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vrc-video-cacher"))
        .unwrap_or_else(|| PathBuf::from(".vrc-video-cacher"))
}

/// Default configuration file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.json")
}

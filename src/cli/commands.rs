//! Command handlers
//!
//! `serve` is the composition root: it wires the configuration snapshot into
//! the cache store, resolver, queue, and server, then waits for ctrl-c. The
//! cache subcommands operate on the store directly without a server.

use std::sync::Arc;

use tracing::info;

use crate::app::cache::CacheStore;
use crate::app::models::VideoId;
use crate::app::queue::{DownloadQueue, QueueConfig};
use crate::app::resolver::YtdlpResolver;
use crate::app::server::ApiServer;
use crate::config::{default_config_path, Config};
use crate::errors::{AppError, Result};

use super::{CacheAction, CacheArgs, ServeArgs};

/// Run the caching daemon until interrupted
pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    let mut config = Config::load_or_init(&config_path)?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }

    let cache = Arc::new(CacheStore::new(&config.cache_dir, config.cache_max_bytes).await?);
    let indexed = cache.scan().await?;
    info!("Indexed {} cached videos ({} bytes)", indexed, cache.total_bytes().await);

    let resolver = Arc::new(YtdlpResolver::from_config(&config));
    let queue = Arc::new(DownloadQueue::new(
        QueueConfig::from_config(&config),
        Arc::clone(&cache),
        resolver,
    ));

    let server = ApiServer::new(&config, Arc::clone(&cache), queue);
    server.start().await?;

    if let Some(addr) = server.local_addr().await {
        println!("vrc-video-cacher listening on http://{addr}");
        println!("Press Ctrl+C to stop");
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    server.stop().await?;

    Ok(())
}

/// Inspect or modify the cache directory
pub async fn handle_cache(args: CacheArgs) -> Result<()> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = Config::load_or_init(&config_path)?;

    let cache = Arc::new(CacheStore::new(&config.cache_dir, config.cache_max_bytes).await?);
    cache.scan().await?;

    match args.action {
        CacheAction::List => {
            let entries = cache.list().await;
            if entries.is_empty() {
                println!("Cache is empty");
                return Ok(());
            }

            println!("{:<66} {:>12}  last access", "id", "bytes");
            for entry in &entries {
                println!(
                    "{:<66} {:>12}  {}",
                    entry.id,
                    entry.size,
                    entry.last_access.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!(
                "{} entries, {} bytes total",
                entries.len(),
                cache.total_bytes().await
            );
        }
        CacheAction::Clear => {
            let count = cache.len().await;
            cache.clear().await?;
            println!("Removed {count} cached videos");
        }
        CacheAction::Delete { id } => {
            let id = VideoId::new(id.as_str()).ok_or_else(|| {
                AppError::Cache(crate::errors::CacheError::EntryNotFound { id: id.clone() })
            })?;
            cache.delete(&id).await?;
            println!("Deleted {id}");
        }
    }

    Ok(())
}

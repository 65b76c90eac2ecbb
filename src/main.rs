//! VRC Video Cacher daemon CLI
//!
//! Command-line entry point for the caching daemon: starts the loopback
//! dispatcher and download workers, or operates on the cache directory.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use vrc_video_cacher::cli::{handle_cache, handle_serve, Cli, Commands};
use vrc_video_cacher::errors::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli);

    info!("vrc-video-cacher v{} starting", vrc_video_cacher::VERSION);

    match cli.command {
        Commands::Serve(args) => handle_serve(args).await,
        Commands::Cache(args) => handle_cache(args).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::from_default_env().add_directive(
        format!("vrc_video_cacher={}", cli.log_level())
            .parse()
            .expect("static directive is valid"),
    );

    fmt().with_env_filter(filter).with_target(false).init();
}

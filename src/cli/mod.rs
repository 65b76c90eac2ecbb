//! Command-line interface for the daemon binary
//!
//! Parses arguments with clap and dispatches to the command handlers. Kept
//! out of the library's re-exports so CLI concerns never leak into library
//! consumers.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use commands::{handle_cache, handle_serve};

/// Local video cache daemon and dispatch server
#[derive(Debug, Parser)]
#[command(name = "vrc-video-cacher", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable very verbose (trace) logging
    #[arg(long, global = true)]
    pub very_verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the caching daemon
    Serve(ServeArgs),
    /// Inspect or modify the cache directory
    Cache(CacheArgs),
}

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path (defaults to the platform data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(long)]
    pub port: Option<u16>,
}

/// Arguments for the cache command
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Configuration file path (defaults to the platform data directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached videos, most recently used first
    List,
    /// Delete every cached video
    Clear,
    /// Delete one cached video by identifier
    Delete {
        /// Video identifier (the file stem)
        id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level implied by the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "trace"
        } else if self.global.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

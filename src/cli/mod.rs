//! CLI interface using clap
//!
//! Provides the command-line interfaces of the `codehash`,
//! `codehash-files` and `codehash-list` binaries.

mod commands;

pub use commands::*;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compute whitespace- and comment-insensitive hashes of files in Git repositories
#[derive(Parser, Debug)]
#[command(name = "codehash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Control file: one `repository,worklist,output[,mode]` job per line
    pub control_file: PathBuf,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Compute code hashes of source files on disk
#[derive(Parser, Debug)]
#[command(name = "codehash-files")]
#[command(author, version, about, long_about = None)]
pub struct FilesCli {
    /// Files or directories to hash
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl FilesCli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// List the blobs reachable from HEAD as a work list
#[derive(Parser, Debug)]
#[command(name = "codehash-list")]
#[command(author, version, about, long_about = None)]
pub struct ListCli {
    /// Repository location
    #[arg(default_value = ".")]
    pub repository: PathBuf,
}

impl ListCli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

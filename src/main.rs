//! codehash - normalized code hashes for files in Git repositories
//!
//! Reads a control file of batch jobs and writes one tab-separated record
//! per hashed file to each job's output file.

use anyhow::Result;
use codehash::cli::{self, Cli};
use codehash::config::Settings;
use std::path::Path;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    cli::init_logging();

    // Settings live next to the control file
    let settings_dir = cli
        .control_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let settings = Settings::load_or_default(settings_dir)?;

    cli::run(&cli.control_file, &settings)?;

    Ok(())
}

//! codehash-files - normalized code hashes for source files on disk

use anyhow::Result;
use codehash::cli::{self, FilesCli};
use std::io::{self, BufWriter};

fn main() -> Result<()> {
    let cli = FilesCli::parse_args();

    cli::init_logging();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    cli::hash_files(&cli.paths, &mut out)?;

    Ok(())
}

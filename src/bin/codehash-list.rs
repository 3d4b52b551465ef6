//! codehash-list - print a work list of the blobs in a Git repository

use anyhow::Result;
use codehash::cli::{self, ListCli};
use std::io::{self, BufWriter};

fn main() -> Result<()> {
    let cli = ListCli::parse_args();

    cli::init_logging();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    cli::list_blobs(&cli.repository, &mut out)?;

    Ok(())
}

//! Structural errors
//!
//! These abort a batch job. Problems with the content of a single file never
//! surface here; they degrade to "no record" inside the batch processor.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading control files, work lists and repositories
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed work-list line {line}: expected 3 tab-separated fields, found {found}")]
    MalformedWorkList { line: usize, found: usize },

    #[error("malformed control-file line {line}: expected 3 or 4 comma-separated fields, found {found}")]
    MalformedControl { line: usize, found: usize },

    #[error("no Git directory found at {0:?}")]
    NoGitDir(PathBuf),

    #[error("unsupported language tag: {0}")]
    UnsupportedLanguage(String),
}

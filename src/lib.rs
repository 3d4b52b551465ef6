//! codehash - whitespace- and comment-insensitive source hashing
//!
//! Source files are tokenized per language, tokens that do not affect the
//! program (whitespace, comments, insignificant newlines) are dropped, and
//! the rest is hashed with SHA-1. Files that differ only in formatting or
//! comments share a fingerprint.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod normalize;
pub mod repo;
pub mod tokenize;

/// Re-export commonly used types
pub use batch::BatchProcessor;
pub use error::Error;
pub use normalize::{CodeHash, Normalizer};
pub use repo::GitStore;
pub use tokenize::Language;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "codehash";

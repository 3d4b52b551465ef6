//! Content-addressed object stores
//!
//! This module handles locating and reading Git object databases:
//! - Resolving a repository location to its `.git` directory
//! - Loading blob content by object id
//! - Listing the blobs reachable from HEAD

pub mod list;

pub use list::ListedBlob;

use crate::error::Error;
use anyhow::{Context, Result};
use git2::{ErrorCode, Oid, Repository};
use std::path::{Path, PathBuf};

/// Raw content of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content: Vec<u8>,
    /// Size in bytes as reported by the store
    pub size: u64,
}

/// Lookup of file content by content-address
pub trait ObjectStore {
    /// Load the object named by `address`, or `None` when the store does
    /// not hold a readable blob under that name.
    fn blob(&self, address: &str) -> Result<Option<Blob>>;
}

/// Object store backed by a Git object database
pub struct GitStore {
    repo: Repository,
    git_dir: PathBuf,
}

impl GitStore {
    /// Open the object database of the repository at `location`
    pub fn open<P: AsRef<Path>>(location: P) -> Result<Self> {
        let location = location.as_ref();
        let git_dir = find_git_dir(location)
            .with_context(|| format!("Failed to locate Git directory under {:?}", location))?;

        let repo = Repository::open(&git_dir)
            .with_context(|| format!("Failed to open Git repository at {:?}", git_dir))?;

        Ok(Self { repo, git_dir })
    }

    /// Path of the `.git` directory in use
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }
}

impl ObjectStore for GitStore {
    fn blob(&self, address: &str) -> Result<Option<Blob>> {
        let Ok(oid) = Oid::from_str(address) else {
            tracing::debug!("Not an object id: {:?}", address);
            return Ok(None);
        };

        match self.repo.find_blob(oid) {
            Ok(blob) => Ok(Some(Blob {
                content: blob.content().to_vec(),
                size: blob.size() as u64,
            })),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => {
                tracing::warn!("Failed to read object {}: {}", address, e);
                Ok(None)
            }
        }
    }
}

/// Resolve a repository location to a Git directory.
///
/// A directory named `*.git` is used as is (bare repositories and `.git`
/// itself). Otherwise its `.git` child is used, and failing that the first
/// child directory, by name, that ends in `.git`.
pub fn find_git_dir(dir: &Path) -> Result<PathBuf, Error> {
    if !dir.is_dir() {
        return Err(Error::NoGitDir(dir.to_path_buf()));
    }

    let is_git_name = |p: &Path| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".git"))
    };

    if is_git_name(dir) {
        return Ok(dir.to_path_buf());
    }

    let dot_git = dir.join(".git");
    if dot_git.is_dir() {
        return Ok(dot_git);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|_| Error::NoGitDir(dir.to_path_buf()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir() && is_git_name(p.as_path()))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoGitDir(dir.to_path_buf()))
}

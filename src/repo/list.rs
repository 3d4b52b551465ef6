//! Work-list generation
//!
//! Walks every commit reachable from HEAD and lists each distinct text blob
//! once, with the path it was first seen under and the language inferred
//! from that path.

use super::GitStore;
use crate::tokenize::Language;
use anyhow::{Context, Result};
use git2::{ObjectType, Oid, TreeWalkMode, TreeWalkResult};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// A blob found in history, formatted as a work-list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedBlob {
    pub address: String,
    pub path: String,
    pub language: Language,
}

impl fmt::Display for ListedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.address, self.path, self.language)
    }
}

impl GitStore {
    /// List the distinct non-binary blobs of a supported language reachable
    /// from HEAD, newest commits first.
    ///
    /// A tree or blob seen before is not visited again, so each object id
    /// appears once under the first path it was found at.
    pub fn list_blobs(&self) -> Result<Vec<ListedBlob>> {
        let mut revwalk = self.repo.revwalk().context("Failed to create revwalk")?;
        revwalk.push_head().context("Failed to resolve HEAD")?;

        let mut visited: HashSet<Oid> = HashSet::new();
        let mut candidates: Vec<(Oid, String)> = Vec::new();

        for oid in revwalk {
            let oid = oid.context("Failed to walk history")?;
            let commit = self.repo.find_commit(oid)?;
            let tree = commit.tree()?;
            if !visited.insert(tree.id()) {
                continue;
            }

            tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                if !visited.insert(entry.id()) {
                    return TreeWalkResult::Skip;
                }
                if entry.kind() == Some(ObjectType::Blob) {
                    let name = String::from_utf8_lossy(entry.name_bytes());
                    candidates.push((entry.id(), format!("{}{}", root, name)));
                }
                TreeWalkResult::Ok
            })
            .with_context(|| format!("Failed to walk tree of commit {}", oid))?;
        }

        let mut listed = Vec::new();
        for (id, path) in candidates {
            if let Some(blob) = self.listed(id, path) {
                listed.push(blob);
            }
        }
        Ok(listed)
    }

    fn listed(&self, id: Oid, path: String) -> Option<ListedBlob> {
        if path.contains(|c: char| c == '\t' || c == '\n') {
            tracing::warn!("Skipping {:?}: path cannot be written to a work list", path);
            return None;
        }

        let language = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Language::from_extension)?;

        match self.repo.find_blob(id) {
            Ok(blob) if blob.is_binary() => {
                tracing::debug!("Skipping binary blob {} ({})", id, path);
                None
            }
            Ok(_) => Some(ListedBlob {
                address: id.to_string(),
                path,
                language,
            }),
            Err(e) => {
                tracing::warn!("Failed to read object {} ({}): {}", id, path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use tempfile::TempDir;

    fn commit(repo: &Repository, files: &[(&str, &str)]) -> Oid {
        let workdir = repo.workdir().unwrap();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = workdir.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();

        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_list_blobs_across_history() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit(
            &repo,
            &[
                ("a.rb", "x = 1\n"),
                ("lib/b.py", "y = 2\n"),
                ("data.rb", "\x00\x01binary"),
                ("README", "hello\n"),
            ],
        );
        commit(&repo, &[("a.rb", "x = 2\n"), ("copy.rb", "x = 1\n")]);

        let store = GitStore::open(dir.path()).unwrap();
        let listed = store.list_blobs().unwrap();
        let rows: Vec<_> = listed
            .iter()
            .map(|b| (b.path.as_str(), b.language))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("a.rb", Language::Ruby),
                ("copy.rb", Language::Ruby),
                ("lib/b.py", Language::Python),
            ]
        );

        let old = repo.blob(b"x = 1\n").unwrap();
        assert_eq!(listed[1].address, old.to_string());
        assert_eq!(
            listed[2].to_string(),
            format!("{}\tlib/b.py\tPYTHON", listed[2].address)
        );
    }

    #[test]
    fn test_list_blobs_needs_head() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();

        let store = GitStore::open(dir.path()).unwrap();
        assert!(store.list_blobs().is_err());
    }
}

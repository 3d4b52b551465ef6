//! Hashing of source files on disk
//!
//! Walks files and directories, picks a language from each file extension
//! and prints one record per file with significant tokens.

use crate::normalize::Normalizer;
use crate::tokenize::Language;
use anyhow::{Context, Result};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output line for one file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub language: Language,
    pub fingerprint: String,
    pub size: u64,
    pub token_count: usize,
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.path.display(),
            self.language,
            self.fingerprint,
            self.size,
            self.token_count
        )
    }
}

/// Hashes files, keeping one normalizer per language
#[derive(Default)]
pub struct FileHasher {
    normalizers: HashMap<Language, Normalizer>,
}

impl FileHasher {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalizer(&mut self, language: Language) -> Result<&mut Normalizer> {
        match self.normalizers.entry(language) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(Normalizer::new(language)?)),
        }
    }

    /// Hash one file. Returns `None` for unknown extensions, empty files and
    /// files without significant tokens.
    pub fn hash_file(&mut self, path: &Path) -> Result<Option<FileRecord>> {
        let Some(language) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Language::from_extension)
        else {
            return Ok(None);
        };

        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
        if content.is_empty() {
            return Ok(None);
        }

        let hash = self.normalizer(language)?.normalize_bytes(&content);
        if hash.is_empty() {
            return Ok(None);
        }

        Ok(Some(FileRecord {
            path: path.to_path_buf(),
            language,
            fingerprint: hash.fingerprint,
            size: content.len() as u64,
            token_count: hash.token_count,
        }))
    }

    /// Hash every file under `roots` in file-name order, skipping hidden
    /// entries. Unreadable files are logged and skipped.
    pub fn scan<W: Write>(&mut self, roots: &[PathBuf], out: &mut W) -> Result<usize> {
        let mut written = 0;

        for root in roots {
            for entry in walkdir::WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }

                match self.hash_file(entry.path()) {
                    Ok(Some(record)) => {
                        writeln!(out, "{}", record).context("Failed to write result")?;
                        written += 1;
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("{:#}", e),
                }
            }
        }

        out.flush().context("Failed to flush results")?;
        Ok(written)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

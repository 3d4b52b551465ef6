//! Batch processing of work lists
//!
//! A work list names blobs by object id together with a display name and a
//! language tag. Each matching blob is normalized and, when it has any
//! significant tokens, written as one tab-separated record. Records keep
//! the order of the work list.

pub mod control;

pub use control::{JobSpec, Mode};

use crate::error::Error;
use crate::normalize::Normalizer;
use crate::repo::ObjectStore;
use crate::tokenize::Language;
use anyhow::{Context, Result};
use std::fmt;
use std::io::{BufRead, Write};

/// One line of a work list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Object id of the file content
    pub address: String,
    /// Path of the file in the repository, informational only
    pub name: String,
    pub language_tag: String,
}

impl WorkItem {
    /// Parse a tab-separated work-list line (1-based `line` for errors)
    pub fn parse(text: &str, line: usize) -> Result<Self, Error> {
        let fields: Vec<&str> = text.split('\t').collect();
        let &[address, name, language_tag] = fields.as_slice() else {
            return Err(Error::MalformedWorkList {
                line,
                found: fields.len(),
            });
        };

        Ok(Self {
            address: address.to_string(),
            name: name.to_string(),
            language_tag: language_tag.to_string(),
        })
    }
}

/// Output line for one normalized file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub address: String,
    pub language: Language,
    pub fingerprint: String,
    pub size: u64,
    pub token_count: usize,
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.address, self.language, self.fingerprint, self.size, self.token_count
        )
    }
}

/// Why a work-list entry produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Tagged with another language
    Language,
    /// Not present in the object store
    Missing,
    /// Zero bytes of content
    Empty,
    /// No significant tokens
    Insignificant,
}

/// Result of processing one work-list entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Record(ResultRecord),
    Skipped(Skip),
}

/// Counters for one processed work list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub entries: usize,
    pub written: usize,
    pub skipped_language: usize,
    pub missing: usize,
    pub empty: usize,
    pub insignificant: usize,
}

impl BatchSummary {
    fn record_skip(&mut self, skip: Skip) {
        match skip {
            Skip::Language => self.skipped_language += 1,
            Skip::Missing => self.missing += 1,
            Skip::Empty => self.empty += 1,
            Skip::Insignificant => self.insignificant += 1,
        }
    }
}

/// Normalizes the files of a work list for one language
pub struct BatchProcessor<'s, S: ObjectStore> {
    store: &'s S,
    normalizer: Normalizer,
}

impl<'s, S: ObjectStore> BatchProcessor<'s, S> {
    pub fn new(store: &'s S, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    pub fn language(&self) -> Language {
        self.normalizer.language()
    }

    /// Process a single entry
    pub fn process_item(&mut self, item: &WorkItem) -> Result<Outcome> {
        let language = self.language();
        if item.language_tag != language.tag() {
            return Ok(Outcome::Skipped(Skip::Language));
        }

        let Some(blob) = self.store.blob(&item.address)? else {
            tracing::debug!("Object {} ({}) not found", item.address, item.name);
            return Ok(Outcome::Skipped(Skip::Missing));
        };
        if blob.content.is_empty() {
            return Ok(Outcome::Skipped(Skip::Empty));
        }

        let hash = self.normalizer.normalize_bytes(&blob.content);
        if hash.is_empty() {
            tracing::debug!("{} ({}) has no significant tokens", item.address, item.name);
            return Ok(Outcome::Skipped(Skip::Insignificant));
        }

        Ok(Outcome::Record(ResultRecord {
            address: item.address.clone(),
            language,
            fingerprint: hash.fingerprint,
            size: blob.size,
            token_count: hash.token_count,
        }))
    }

    /// Read a work list line by line and write one record per hashed file
    pub fn process<R: BufRead, W: Write>(
        &mut self,
        work_list: R,
        out: &mut W,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for (index, line) in work_list.lines().enumerate() {
            let line = line.context("Failed to read work list")?;
            let item = WorkItem::parse(line.trim_end_matches('\r'), index + 1)?;
            summary.entries += 1;

            match self.process_item(&item)? {
                Outcome::Record(record) => {
                    writeln!(out, "{}", record).context("Failed to write result")?;
                    summary.written += 1;
                }
                Outcome::Skipped(skip) => summary.record_skip(skip),
            }
        }

        out.flush().context("Failed to flush results")?;
        Ok(summary)
    }
}

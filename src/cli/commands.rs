//! Command implementations

use crate::batch::control::parse_control;
use crate::batch::{BatchProcessor, BatchSummary, JobSpec, Mode};
use crate::config::Settings;
use crate::files::FileHasher;
use crate::normalize::Normalizer;
use crate::repo::GitStore;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Run every job of a control file in order
pub fn run(control_file: &Path, settings: &Settings) -> Result<Vec<BatchSummary>> {
    let content = std::fs::read_to_string(control_file)
        .with_context(|| format!("Failed to read control file: {:?}", control_file))?;
    let jobs = parse_control(&content)
        .with_context(|| format!("Invalid control file: {:?}", control_file))?;

    let mut summaries = Vec::new();
    for job in &jobs {
        if let Some(summary) = run_job(job, settings)? {
            summaries.push(summary);
        }
    }

    tracing::info!("Finished {} of {} jobs", summaries.len(), jobs.len());
    Ok(summaries)
}

/// Run one job. Returns `None` for jobs in an unsupported mode, which leave
/// their output untouched.
pub fn run_job(job: &JobSpec, settings: &Settings) -> Result<Option<BatchSummary>> {
    if job.mode == Mode::MinHash {
        tracing::info!("Skipping minhash job for {}", job.repository);
        return Ok(None);
    }

    let location = settings.repository_path(&job.repository);
    let store = GitStore::open(&location)?;
    tracing::info!("Processing {:?} for {}", job.work_list, store.git_dir().display());

    let work_list = File::open(&job.work_list)
        .with_context(|| format!("Failed to open work list: {:?}", job.work_list))?;
    let output = File::create(&job.output)
        .with_context(|| format!("Failed to create output file: {:?}", job.output))?;

    let mut out = BufWriter::with_capacity(settings.output_buffer_size, output);
    let mut processor = BatchProcessor::new(&store, Normalizer::new(settings.language)?);
    let summary = processor
        .process(BufReader::new(work_list), &mut out)
        .with_context(|| format!("Failed to process work list: {:?}", job.work_list))?;

    tracing::info!(
        "Wrote {} of {} entries to {:?} ({} other language, {} missing, {} empty, {} without tokens)",
        summary.written,
        summary.entries,
        job.output,
        summary.skipped_language,
        summary.missing,
        summary.empty,
        summary.insignificant
    );

    Ok(Some(summary))
}

/// Print a work list of every text blob reachable from HEAD
pub fn list_blobs<W: Write>(repository: &Path, out: &mut W) -> Result<usize> {
    let store = GitStore::open(repository)?;
    let listed = store.list_blobs()?;

    for blob in &listed {
        writeln!(out, "{}", blob).context("Failed to write work list")?;
    }
    out.flush().context("Failed to flush work list")?;

    tracing::info!("Listed {} blobs from {}", listed.len(), store.git_dir().display());
    Ok(listed.len())
}

/// Hash files on disk and print one record per file
pub fn hash_files<W: Write>(paths: &[PathBuf], out: &mut W) -> Result<usize> {
    let mut hasher = FileHasher::new();
    let written = hasher.scan(paths, out)?;
    tracing::debug!("Hashed {} files", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository;
    use tempfile::TempDir;

    #[test]
    fn test_minhash_job_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.txt");
        let job = JobSpec {
            repository: "does/not/exist".to_string(),
            work_list: dir.path().join("missing.txt"),
            output: output.clone(),
            mode: Mode::MinHash,
        };

        assert!(run_job(&job, &Settings::default()).unwrap().is_none());
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_repository_is_fatal() {
        let dir = TempDir::new().unwrap();
        let job = JobSpec {
            repository: dir.path().join("nowhere").to_string_lossy().into_owned(),
            work_list: dir.path().join("list.txt"),
            output: dir.path().join("out.txt"),
            mode: Mode::CodeHash,
        };

        assert!(run_job(&job, &Settings::default()).is_err());
    }

    #[test]
    fn test_run_job_writes_records() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path().join("project")).unwrap();
        let oid = repo.blob(b"puts 42\n").unwrap();

        let list = dir.path().join("list.txt");
        std::fs::write(&list, format!("{}\tmain.rb\tRUBY\n", oid)).unwrap();
        let settings = Settings {
            repository_root: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let job = JobSpec {
            repository: "project".to_string(),
            work_list: list,
            output: dir.path().join("out.txt"),
            mode: Mode::CodeHash,
        };

        let summary = run_job(&job, &settings).unwrap().unwrap();
        assert_eq!(summary.written, 1);

        let output = std::fs::read_to_string(&job.output).unwrap();
        let fields: Vec<_> = output.trim_end().split('\t').collect();
        assert_eq!(fields[0], oid.to_string());
        assert_eq!(fields[1], "RUBY");
        assert_eq!(fields[3], "8");
        assert_eq!(fields[4], "3");
    }
}

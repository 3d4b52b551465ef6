//! Control files
//!
//! Each line declares one batch job:
//! `repository_location,worklist_path,output_path[,mode]`.

use crate::error::Error;
use std::path::PathBuf;

/// Processing mode of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normalized token hash
    CodeHash,
    /// Not supported; such jobs are skipped
    MinHash,
}

impl Mode {
    /// Only `minhash` disables a job; any other mode hashes
    fn parse(text: &str, line: usize) -> Self {
        match text {
            "minhash" => Mode::MinHash,
            "" | "codehash" => Mode::CodeHash,
            other => {
                tracing::debug!("Line {}: treating mode {:?} as codehash", line, other);
                Mode::CodeHash
            }
        }
    }
}

/// One batch job from a control file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Repository location as written in the control file
    pub repository: String,
    pub work_list: PathBuf,
    pub output: PathBuf,
    pub mode: Mode,
}

impl JobSpec {
    /// Parse a comma-separated control line (1-based `line` for errors)
    pub fn parse(text: &str, line: usize) -> Result<Self, Error> {
        let fields: Vec<&str> = text.split(',').map(str::trim).collect();
        let (repository, work_list, output, mode) = match fields.as_slice() {
            &[repository, work_list, output] => (repository, work_list, output, ""),
            &[repository, work_list, output, mode] => (repository, work_list, output, mode),
            _ => {
                return Err(Error::MalformedControl {
                    line,
                    found: fields.len(),
                })
            }
        };

        Ok(Self {
            repository: repository.to_string(),
            work_list: PathBuf::from(work_list),
            output: PathBuf::from(output),
            mode: Mode::parse(mode, line),
        })
    }
}

/// Parse every job of a control file, skipping blank lines
pub fn parse_control(content: &str) -> Result<Vec<JobSpec>, Error> {
    content
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| JobSpec::parse(text, index + 1))
        .collect()
}

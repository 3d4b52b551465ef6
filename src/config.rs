//! Run configuration for codehash

use crate::tokenize::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional settings file next to a control file
pub const SETTINGS_FILE: &str = "codehash.toml";

/// Settings shared by every job of a control file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Language processed by each batch job
    #[serde(default = "default_language")]
    pub language: Language,

    /// Base directory for relative repository locations
    #[serde(default)]
    pub repository_root: Option<PathBuf>,

    /// Capacity of the buffered output writer, in bytes
    #[serde(default = "default_output_buffer_size")]
    pub output_buffer_size: usize,
}

fn default_language() -> Language {
    Language::Ruby
}

fn default_output_buffer_size() -> usize {
    64 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            repository_root: None,
            output_buffer_size: default_output_buffer_size(),
        }
    }
}

impl Settings {
    /// Load `codehash.toml` from `dir`, or return defaults when absent
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(SETTINGS_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let settings: Settings = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve a repository location from a control file
    pub fn repository_path(&self, location: &str) -> PathBuf {
        match &self.repository_root {
            Some(root) => root.join(location),
            None => PathBuf::from(location),
        }
    }
}

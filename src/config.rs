//! Database configuration.
//!
//! A configuration can be built in code, loaded from a TOML file, or
//! assembled by the `minidb` binary from command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Configuration for a [crate::Database].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding one `<table>.jsonl` row log per table.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory holding one `<table>.json` schema document per table
    /// (defaults to `<data_dir>/metadata`).
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,

    /// Fail the whole statement when a WHERE comparison mixes incomparable
    /// types, instead of excluding the offending row.
    #[serde(default)]
    pub strict_comparisons: bool,

    /// `fsync` row logs after appends and rewrites.
    #[serde(default)]
    pub sync_writes: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metadata_dir: None,
            strict_comparisons: false,
            sync_writes: false,
        }
    }
}

impl DatabaseConfig {
    /// Creates a default configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> DbResult<Self> {
        toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> DbResult<String> {
        toml::to_string_pretty(self).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Returns the effective metadata directory.
    pub fn effective_metadata_dir(&self) -> PathBuf {
        self.metadata_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("metadata"))
    }

    /// Sets the metadata directory.
    pub fn with_metadata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metadata_dir = Some(dir.into());
        self
    }

    /// Sets strict comparison mode.
    pub fn with_strict_comparisons(mut self, strict: bool) -> Self {
        self.strict_comparisons = strict;
        self
    }

    /// Sets whether writes are synced to disk.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

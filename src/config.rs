//! Summary configuration: which backend, and where it keeps its data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::station::StationLike;
use crate::summary::{IndexSummary, MemorySummary, Summary};

/// Config file name inside a summary directory.
pub const CONFIG_FILE: &str = "summary_config.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Nested in-memory sets, saved as a JSON file.
    #[default]
    Memory,
    /// Term index, snapshotted into a directory.
    Index,
}

/// Persistent summary configuration.
///
/// Without a path, both backends keep everything in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub backend: BackendKind,
    /// JSON file for the memory backend, index directory for the index backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl SummaryConfig {
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: None,
        }
    }

    pub fn index() -> Self {
        Self {
            backend: BackendKind::Index,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read config from a directory. Returns None if the file doesn't exist.
    pub fn read_from(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config to a directory.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

/// Build the summary described by `config`.
pub fn open_summary<S: StationLike + 'static>(config: &SummaryConfig) -> Result<Box<dyn Summary<S>>> {
    let summary: Box<dyn Summary<S>> = match (config.backend, &config.path) {
        (BackendKind::Memory, None) => Box::new(MemorySummary::<S>::new()),
        (BackendKind::Memory, Some(path)) => Box::new(MemorySummary::<S>::open(path)?),
        (BackendKind::Index, None) => Box::new(IndexSummary::<S>::in_memory()),
        (BackendKind::Index, Some(path)) => Box::new(IndexSummary::<S>::open(path)?),
    };
    tracing::debug!(backend = ?config.backend, path = ?config.path, "Opened summary");
    Ok(summary)
}

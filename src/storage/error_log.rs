use super::base::StorageError;
use super::disk::write_atomic;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub name: String,
    pub link: String,
    pub error: String,
}

/// JSON array of failed sets. Every append rewrites the whole array.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    /// Opens the log at `path`, initialising it to `[]` when it does not exist.
    /// An existing file that is not a valid log is rejected up front.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };

        if log.path.exists() {
            let existing = log.entries()?;
            debug!(
                "Resuming error log {} with {} entries",
                log.path.display(),
                existing.len()
            );
        } else {
            if let Some(parent) = log.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            write_atomic(&log.path, b"[]")?;
        }

        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<ErrorLogEntry>, StorageError> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn append(&self, entry: ErrorLogEntry) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.push(entry);
        let json = serde_json::to_string_pretty(&entries)?;
        write_atomic(&self.path, json.as_bytes())
    }
}

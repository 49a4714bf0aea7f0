//! Per-workspace checksum tracking.
//!
//! The manager remembers the SHA-256 of the content last observed (by a full
//! read) or produced (by a write or edit) for each absolute path. Edits use
//! the stored value to detect changes made behind the agent's back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tracing::trace;

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Thread-safe map from absolute path to last-known content checksum.
#[derive(Debug, Default)]
pub struct ChecksumManager {
    entries: RwLock<HashMap<PathBuf, String>>,
}

impl ChecksumManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase hex SHA-256 of `data`.
    #[must_use]
    pub fn compute(&self, data: &[u8]) -> String {
        compute_checksum(data)
    }

    /// The stored checksum for `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Store `checksum` for `path`, replacing any previous value.
    pub fn update(&self, path: impl Into<PathBuf>, checksum: impl Into<String>) {
        let path = path.into();
        trace!(path = %path.display(), "Recording checksum");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, checksum.into());
    }

    /// Forget every stored checksum.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no path is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

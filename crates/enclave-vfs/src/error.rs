use std::path::PathBuf;

use thiserror::Error;

/// Virtual filesystem errors.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Missing directory or file.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A path component that must be a directory is something else.
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// File is larger than the configured ceiling.
    #[error("File too large: {} is {size} bytes (limit {limit})", .path.display())]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// Native IO error wrapper, annotated with the failing operation.
    #[error("IO error during {op} on {}: {source}", .path.display())]
    Io {
        /// Operation name (`lstat`, `rename`, ...).
        op: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    /// Map a [`std::io::Error`] onto the VFS taxonomy.
    ///
    /// `NotFound` and `NotADirectory` keep their identity so callers can
    /// branch on them; everything else is wrapped with its context.
    #[must_use]
    pub fn from_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::NotADirectory => Self::NotADirectory(path),
            _ => Self::Io { op, path, source },
        }
    }

    /// True if this error reports a missing entry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Convenience result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

//! File operation errors.

use std::path::PathBuf;

use enclave_vfs::VfsError;
use enclave_workspace::WorkspaceError;
use thiserror::Error;

/// Broad class of a [`FileOpError`], used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The path escapes the workspace or cannot be resolved safely.
    Boundary,
    /// The path is missing, already exists, or has the wrong shape.
    Existence,
    /// The content is binary or too large.
    ContentPolicy,
    /// The file changed, or the requested edit does not match it.
    Conflict,
    /// Underlying filesystem failure.
    Io,
    /// The request itself is malformed.
    Validation,
}

/// Errors returned by the read, write and edit operations.
#[derive(Debug, Error)]
pub enum FileOpError {
    /// The context was built without a workspace root.
    #[error("workspace root not set")]
    WorkspaceRootNotSet,

    /// The path escapes the workspace.
    #[error("path is outside workspace root: {path}")]
    OutsideWorkspace {
        /// Path as supplied by the caller.
        path: String,
    },

    /// A symlink chain revisits a link.
    #[error("symlink loop detected at {}", .path.display())]
    SymlinkLoop {
        /// The link that closed the cycle.
        path: PathBuf,
    },

    /// A symlink chain exceeds the hop limit.
    #[error("symlink chain too long at {} (max {limit} hops)", .path.display())]
    SymlinkChainTooLong {
        /// The link at which the limit was hit.
        path: PathBuf,
        /// The hop limit.
        limit: usize,
    },

    /// The file does not exist.
    #[error("file does not exist: {}", .0.display())]
    FileMissing(PathBuf),

    /// The file already exists; use edit to modify it.
    #[error("file already exists: {} (use edit_file to modify it)", .0.display())]
    FileExists(PathBuf),

    /// The path is a directory.
    #[error("path is a directory: {}", .0.display())]
    IsDirectory(PathBuf),

    /// A non-directory sits where a directory is required.
    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The content looks binary.
    #[error("binary content is not supported: {}", .0.display())]
    BinaryFile(PathBuf),

    /// The content exceeds the size limit.
    #[error("file too large: {} is {size} bytes (limit {limit})", .path.display())]
    TooLarge {
        /// Offending file.
        path: PathBuf,
        /// Size in bytes.
        size: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// The file changed since it was last read.
    #[error("edit conflict: {} changed since it was last read; read it again", .path.display())]
    EditConflict {
        /// Edited file.
        path: PathBuf,
    },

    /// An edit operation's `before` text does not occur in the file.
    #[error("edit operation {index}: snippet not found in {}", .path.display())]
    SnippetNotFound {
        /// Edited file.
        path: PathBuf,
        /// Zero-based index of the failing operation.
        index: usize,
    },

    /// An edit operation's `before` text occurs a different number of times
    /// than expected.
    #[error(
        "edit operation {index}: expected {expected} replacement(s) in {} but found {found}",
        .path.display()
    )]
    ReplacementMismatch {
        /// Edited file.
        path: PathBuf,
        /// Zero-based index of the failing operation.
        index: usize,
        /// Expected occurrence count.
        expected: usize,
        /// Actual occurrence count.
        found: usize,
    },

    /// Permission bits outside `0o777`.
    #[error("invalid permissions {0:#o} (must be at most 0o777)")]
    InvalidPermissions(u32),

    /// The file is not valid UTF-8 text.
    #[error("file is not valid UTF-8: {}", .0.display())]
    InvalidEncoding(PathBuf),

    /// The request is malformed.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Filesystem failure, carrying the operation and path.
    #[error(transparent)]
    Io(VfsError),
}

impl FileOpError {
    /// The broad class this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::WorkspaceRootNotSet
            | Self::OutsideWorkspace { .. }
            | Self::SymlinkLoop { .. }
            | Self::SymlinkChainTooLong { .. } => ErrorCategory::Boundary,
            Self::FileMissing(_)
            | Self::FileExists(_)
            | Self::IsDirectory(_)
            | Self::NotADirectory(_) => ErrorCategory::Existence,
            Self::BinaryFile(_) | Self::TooLarge { .. } | Self::InvalidEncoding(_) => {
                ErrorCategory::ContentPolicy
            },
            Self::EditConflict { .. }
            | Self::SnippetNotFound { .. }
            | Self::ReplacementMismatch { .. } => ErrorCategory::Conflict,
            Self::InvalidPermissions(_) | Self::InvalidArguments(_) => ErrorCategory::Validation,
            Self::Io(_) => ErrorCategory::Io,
        }
    }
}

impl From<VfsError> for FileOpError {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::NotFound(path) => Self::FileMissing(path),
            VfsError::NotADirectory(path) => Self::NotADirectory(path),
            VfsError::TooLarge { path, size, limit } => Self::TooLarge { path, size, limit },
            other @ VfsError::Io { .. } => Self::Io(other),
        }
    }
}

impl From<WorkspaceError> for FileOpError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::WorkspaceRootNotSet => Self::WorkspaceRootNotSet,
            WorkspaceError::OutsideWorkspace { path } => Self::OutsideWorkspace { path },
            WorkspaceError::SymlinkLoop { path } => Self::SymlinkLoop { path },
            WorkspaceError::SymlinkChainTooLong { path, limit } => {
                Self::SymlinkChainTooLong { path, limit }
            },
            WorkspaceError::RootNotDirectory(path) | WorkspaceError::NotADirectory(path) => {
                Self::NotADirectory(path)
            },
            WorkspaceError::Vfs(err) => err.into(),
        }
    }
}

/// Result type for file operations.
pub type FileOpResult<T> = Result<T, FileOpError>;

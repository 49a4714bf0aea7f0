//! Workspace error types.

use std::path::PathBuf;

use enclave_vfs::VfsError;
use thiserror::Error;

/// Errors raised while establishing or enforcing the workspace boundary.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The context was built without a workspace root.
    #[error("workspace root not set")]
    WorkspaceRootNotSet,

    /// The configured root exists but is not a directory.
    #[error("workspace root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// The requested path escapes the workspace via `..`, an absolute path,
    /// or a symlink target.
    #[error("path is outside workspace root: {path}")]
    OutsideWorkspace {
        /// Path as supplied by the caller.
        path: String,
    },

    /// A symlink chain revisits a link it already followed.
    #[error("symlink loop detected at {}", .path.display())]
    SymlinkLoop {
        /// The link that closed the cycle.
        path: PathBuf,
    },

    /// A symlink chain is longer than the hop limit.
    #[error("symlink chain too long at {} (max {limit} hops)", .path.display())]
    SymlinkChainTooLong {
        /// The link at which the limit was hit.
        path: PathBuf,
        /// The hop limit.
        limit: usize,
    },

    /// A non-directory sits where a directory is required.
    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Underlying filesystem failure.
    #[error("filesystem error: {0}")]
    Vfs(#[from] VfsError),
}

impl WorkspaceError {
    /// True for the errors that signal an attempted boundary escape or an
    /// unresolvable symlink structure.
    #[must_use]
    pub fn is_boundary_violation(&self) -> bool {
        matches!(
            self,
            Self::OutsideWorkspace { .. }
                | Self::SymlinkLoop { .. }
                | Self::SymlinkChainTooLong { .. }
                | Self::WorkspaceRootNotSet
        )
    }
}

/// Result type for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

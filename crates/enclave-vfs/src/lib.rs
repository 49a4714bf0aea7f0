//! Enclave Virtual File System (VFS).
//!
//! A minimal, synchronous capability interface over the filesystem. Every
//! higher layer of the workspace sandbox (boundary resolution, reads, atomic
//! writes) talks to the disk exclusively through the [`Vfs`] trait, which has
//! two implementations:
//!
//! - [`HostVfs`] backed by the real operating system
//! - [`MemoryVfs`] held entirely in memory, with fault injection for tests

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// Virtual filesystem error types.
pub mod error;
/// Host-backed virtual filesystem implementation.
pub mod host;
/// In-memory virtual filesystem implementation.
pub mod memory;
/// Lexical path utilities.
pub mod path;

pub use error::{VfsError, VfsResult};
pub use host::HostVfs;
pub use memory::MemoryVfs;
pub use path::normalize_lexically;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Type of a filesystem entry as reported by `lstat`/`stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link (only ever reported by `lstat`).
    Symlink,
}

/// File metadata returned by stat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Entry type.
    pub kind: FileKind,
    /// Size of the entry in bytes.
    pub size: u64,
    /// Unix permission bits (`0o777` mask).
    pub mode: u32,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

impl FileInfo {
    /// True if the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// True if the entry is a regular file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// True if the entry is a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// Directory entry returned by [`Vfs::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry within its directory.
    pub name: String,
    /// Entry type, without following a symlink.
    pub kind: FileKind,
}

/// Filesystem capability consumed by the workspace sandbox.
///
/// All calls are blocking. Implementations must be safe to share between
/// threads because several tool calls may run concurrently.
pub trait Vfs: Send + Sync {
    /// Metadata for `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// [`VfsError::NotFound`] if nothing exists at `path`.
    fn stat(&self, path: &Path) -> VfsResult<FileInfo>;

    /// Metadata for `path` itself, without following a final symlink.
    ///
    /// # Errors
    ///
    /// [`VfsError::NotFound`] if nothing exists at `path`.
    fn lstat(&self, path: &Path) -> VfsResult<FileInfo>;

    /// Read a byte range of a file.
    ///
    /// `offset == 0 && limit == 0` reads the whole file. `limit == 0` with a
    /// non-zero offset reads to the end. An offset at or past the end yields
    /// an empty buffer. Implementations enforce their own size ceiling.
    ///
    /// # Errors
    ///
    /// [`VfsError::TooLarge`] when the file exceeds the ceiling, or any
    /// lookup/I/O failure.
    fn read_file_range(&self, path: &Path, offset: u64, limit: u64) -> VfsResult<Vec<u8>>;

    /// Replace `path` with `content` atomically (temp file + rename).
    ///
    /// The target path is either left untouched or fully replaced; a
    /// partially written file is never observable there.
    ///
    /// # Errors
    ///
    /// Returns an error if any step before or including the rename fails.
    fn write_file_atomic(&self, path: &Path, content: &[u8], mode: u32) -> VfsResult<()>;

    /// Create `path` and all missing ancestors as directories.
    ///
    /// # Errors
    ///
    /// [`VfsError::NotADirectory`] if an ancestor exists as a file.
    fn ensure_dirs(&self, path: &Path) -> VfsResult<()>;

    /// List the entries of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// [`VfsError::NotFound`] if `path` is missing, [`VfsError::NotADirectory`]
    /// if it is not a directory.
    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read the raw target of a symbolic link.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is missing or not a symlink.
    fn read_link(&self, path: &Path) -> VfsResult<PathBuf>;

    /// The current user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    fn user_home_dir(&self) -> VfsResult<PathBuf>;

    /// Absolute, symlink-free form of an existing path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist.
    fn canonicalize(&self, path: &Path) -> VfsResult<PathBuf>;
}

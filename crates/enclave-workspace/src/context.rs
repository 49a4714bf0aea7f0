//! Workspace context: the root, its limits, and the state shared by every
//! file operation inside it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use enclave_vfs::{HostVfs, Vfs};
use tracing::info;

use crate::checksum::ChecksumManager;
use crate::content::{BinaryDetector, DEFAULT_BINARY_SAMPLE_SIZE, NulByteDetector};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::resolver::{self, ResolvedPath};

/// Default ceiling for reads, writes and edits (5 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Permission bits applied to newly created files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Tunable limits for a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceOptions {
    /// Largest file, in bytes, that may be read, written or edited.
    pub max_file_size: u64,
    /// Number of leading bytes inspected for binary detection.
    pub binary_sample_size: usize,
    /// Mode for new files when the caller gives none.
    pub default_file_mode: u32,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            binary_sample_size: DEFAULT_BINARY_SAMPLE_SIZE,
            default_file_mode: DEFAULT_FILE_MODE,
        }
    }
}

impl WorkspaceOptions {
    /// Set the maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Set the binary detection sample size.
    #[must_use]
    pub fn with_binary_sample_size(mut self, binary_sample_size: usize) -> Self {
        self.binary_sample_size = binary_sample_size;
        self
    }

    /// Set the mode used for new files.
    #[must_use]
    pub fn with_default_file_mode(mut self, default_file_mode: u32) -> Self {
        self.default_file_mode = default_file_mode;
        self
    }
}

/// Everything a file operation needs: the canonical root, the filesystem,
/// the checksum store and the content policy.
///
/// Contexts are independent; checksums recorded in one are never visible
/// in another.
pub struct WorkspaceContext {
    root: PathBuf,
    options: WorkspaceOptions,
    vfs: Arc<dyn Vfs>,
    checksums: ChecksumManager,
    binary_detector: Arc<dyn BinaryDetector>,
}

impl fmt::Debug for WorkspaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceContext")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("tracked_checksums", &self.checksums.len())
            .field("binary_detector", &self.binary_detector)
            .finish_non_exhaustive()
    }
}

impl WorkspaceContext {
    /// Open a workspace on the host filesystem.
    ///
    /// # Errors
    ///
    /// See [`WorkspaceContext::with_vfs`].
    pub fn open(root: impl AsRef<Path>, options: WorkspaceOptions) -> WorkspaceResult<Self> {
        let vfs: Arc<dyn Vfs> = Arc::new(HostVfs::new(options.max_file_size));
        Self::with_vfs(root, vfs, options)
    }

    /// Open a workspace over an arbitrary filesystem.
    ///
    /// The root is canonicalized through `vfs` so that every later boundary
    /// check compares symlink-free paths.
    ///
    /// # Errors
    ///
    /// - [`WorkspaceError::WorkspaceRootNotSet`] if `root` is empty
    /// - [`WorkspaceError::RootNotDirectory`] if `root` is not a directory
    /// - [`WorkspaceError::Vfs`] if `root` cannot be canonicalized
    pub fn with_vfs(
        root: impl AsRef<Path>,
        vfs: Arc<dyn Vfs>,
        options: WorkspaceOptions,
    ) -> WorkspaceResult<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(WorkspaceError::WorkspaceRootNotSet);
        }

        let canonical = vfs.canonicalize(root)?;
        if !vfs.stat(&canonical)?.is_dir() {
            return Err(WorkspaceError::RootNotDirectory(canonical));
        }

        info!(
            root = %canonical.display(),
            max_file_size = options.max_file_size,
            "Opened workspace"
        );

        Ok(Self {
            root: canonical,
            options,
            vfs,
            checksums: ChecksumManager::new(),
            binary_detector: Arc::new(NulByteDetector::new(options.binary_sample_size)),
        })
    }

    /// Replace the binary content policy.
    #[must_use]
    pub fn with_binary_detector(mut self, detector: Arc<dyn BinaryDetector>) -> Self {
        self.binary_detector = detector;
        self
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured limits.
    #[must_use]
    pub fn options(&self) -> &WorkspaceOptions {
        &self.options
    }

    /// Maximum file size in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.options.max_file_size
    }

    /// Mode applied to newly created files.
    #[must_use]
    pub fn default_file_mode(&self) -> u32 {
        self.options.default_file_mode
    }

    /// The filesystem backing this workspace.
    #[must_use]
    pub fn vfs(&self) -> &dyn Vfs {
        self.vfs.as_ref()
    }

    /// Checksums recorded for files in this workspace.
    #[must_use]
    pub fn checksums(&self) -> &ChecksumManager {
        &self.checksums
    }

    /// The binary content policy.
    #[must_use]
    pub fn binary_detector(&self) -> &dyn BinaryDetector {
        self.binary_detector.as_ref()
    }

    /// True if `content` should be refused as binary.
    #[must_use]
    pub fn is_binary(&self, content: &[u8]) -> bool {
        self.binary_detector.is_binary(content)
    }

    /// Resolve `path` against this workspace. See [`resolver::resolve`].
    ///
    /// # Errors
    ///
    /// Any boundary or lookup failure reported by the resolver.
    pub fn resolve(&self, path: impl AsRef<Path>) -> WorkspaceResult<ResolvedPath> {
        resolver::resolve(self, path)
    }

    /// Create the missing parent directories of an already resolved path.
    ///
    /// # Errors
    ///
    /// Any boundary or filesystem failure. See [`resolver::ensure_parent_dirs`].
    pub fn ensure_parent_dirs(&self, absolute: &Path) -> WorkspaceResult<()> {
        resolver::ensure_parent_dirs(self, absolute)
    }
}

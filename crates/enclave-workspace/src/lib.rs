//! Enclave Workspace - the boundary every file operation runs inside.
//!
//! A [`WorkspaceContext`] pins a canonical root directory, a [`Vfs`]
//! implementation, and a [`ChecksumManager`]. Paths supplied by an agent are
//! turned into [`ResolvedPath`]s by [`resolve`], which refuses anything that
//! escapes the root lexically or through a symlink.
//!
//! [`Vfs`]: enclave_vfs::Vfs

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod checksum;
pub mod content;
pub mod context;
pub mod error;
pub mod resolver;

pub use checksum::{ChecksumManager, compute_checksum};
pub use content::{BinaryDetector, DEFAULT_BINARY_SAMPLE_SIZE, NulByteDetector};
pub use context::{DEFAULT_FILE_MODE, DEFAULT_MAX_FILE_SIZE, WorkspaceContext, WorkspaceOptions};
pub use error::{WorkspaceError, WorkspaceResult};
pub use resolver::{MAX_SYMLINK_HOPS, ResolvedPath, ensure_parent_dirs, resolve};

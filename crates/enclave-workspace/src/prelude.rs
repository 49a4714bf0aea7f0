//! Prelude module - commonly used types for convenient import.
//!
//! ```rust,ignore
//! use enclave_workspace::prelude::*;
//! ```

pub use crate::{
    ChecksumManager, ResolvedPath, WorkspaceContext, WorkspaceError, WorkspaceOptions,
    WorkspaceResult, compute_checksum,
};

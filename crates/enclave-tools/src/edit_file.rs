//! Checksum-gated edit operation and the `edit_file` tool.

use std::path::PathBuf;
use std::sync::Arc;

use enclave_workspace::{WorkspaceContext, compute_checksum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FileOpError, FileOpResult};
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult, required_str, run_blocking};

/// One search-and-replace step of an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOperation {
    /// Exact text to find. Must not be empty.
    pub before: String,
    /// Replacement text.
    pub after: String,
    /// How many occurrences of `before` the file must contain. Zero means one.
    #[serde(default)]
    pub expected_replacements: usize,
}

impl EditOperation {
    /// Replace the single occurrence of `before` with `after`.
    #[must_use]
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
            expected_replacements: 1,
        }
    }

    /// Require exactly `count` occurrences and replace them all.
    #[must_use]
    pub fn with_expected_replacements(mut self, count: usize) -> Self {
        self.expected_replacements = count;
        self
    }

    fn expected(&self) -> usize {
        self.expected_replacements.max(1)
    }
}

/// Result of a successful edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Resolved absolute path.
    pub absolute_path: PathBuf,
    /// Path relative to the workspace root.
    pub relative_path: String,
    /// Number of operations applied.
    pub operations_applied: usize,
    /// Size of the file after the edit, in bytes.
    pub file_size: u64,
}

/// Apply `operations` in order to the existing file at `path`.
///
/// Each operation sees the result of the ones before it. If a checksum was
/// recorded for the file (by a full read or an earlier write), the current
/// content must still match it, both before the edits are applied and again
/// right before the write. The original permission bits are kept.
///
/// # Errors
///
/// [`FileOpError::InvalidArguments`] for an empty operation list or an empty
/// `before`, boundary errors from resolution, [`FileOpError::FileMissing`],
/// [`FileOpError::IsDirectory`], [`FileOpError::BinaryFile`],
/// [`FileOpError::InvalidEncoding`], [`FileOpError::EditConflict`],
/// [`FileOpError::SnippetNotFound`], [`FileOpError::ReplacementMismatch`],
/// [`FileOpError::TooLarge`], or an I/O failure.
pub fn edit_file(
    ctx: &WorkspaceContext,
    path: &str,
    operations: &[EditOperation],
) -> FileOpResult<EditOutcome> {
    if operations.is_empty() {
        return Err(FileOpError::InvalidArguments(
            "at least one edit operation is required".into(),
        ));
    }
    if let Some(index) = operations.iter().position(|op| op.before.is_empty()) {
        return Err(FileOpError::InvalidArguments(format!(
            "operation {index}: before must not be empty"
        )));
    }

    let resolved = ctx.resolve(path)?;
    let abs = resolved.absolute;
    let vfs = ctx.vfs();

    let info = vfs.stat(&abs)?;
    if info.is_dir() {
        return Err(FileOpError::IsDirectory(abs));
    }
    if info.size > ctx.max_file_size() {
        return Err(FileOpError::TooLarge {
            path: abs,
            size: info.size,
            limit: ctx.max_file_size(),
        });
    }

    let original = vfs.read_file_range(&abs, 0, 0)?;
    if ctx.is_binary(&original) {
        return Err(FileOpError::BinaryFile(abs));
    }

    let current_checksum = compute_checksum(&original);
    let prior_checksum = ctx.checksums().get(&abs);
    if prior_checksum
        .as_deref()
        .is_some_and(|prior| prior != current_checksum)
    {
        warn!(path = %abs.display(), "File changed since last read; refusing edit");
        return Err(FileOpError::EditConflict { path: abs });
    }

    let mut content =
        String::from_utf8(original).map_err(|_| FileOpError::InvalidEncoding(abs.clone()))?;

    for (index, op) in operations.iter().enumerate() {
        let expected = op.expected();
        let found = content.matches(op.before.as_str()).count();
        if found == 0 {
            return Err(FileOpError::SnippetNotFound { path: abs, index });
        }
        if found != expected {
            return Err(FileOpError::ReplacementMismatch {
                path: abs,
                index,
                expected,
                found,
            });
        }
        content = content.replacen(op.before.as_str(), &op.after, expected);
    }

    let file_size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if file_size > ctx.max_file_size() {
        return Err(FileOpError::TooLarge {
            path: abs,
            size: file_size,
            limit: ctx.max_file_size(),
        });
    }

    // Without a recorded baseline there is nothing to revalidate against.
    if prior_checksum.is_some() {
        let latest = vfs.read_file_range(&abs, 0, 0)?;
        if compute_checksum(&latest) != current_checksum {
            warn!(path = %abs.display(), "File changed during edit; refusing write");
            return Err(FileOpError::EditConflict { path: abs });
        }
        debug!(path = %abs.display(), "Revalidated checksum before write");
    }

    vfs.write_file_atomic(&abs, content.as_bytes(), info.mode)?;
    ctx.checksums()
        .update(abs.clone(), compute_checksum(content.as_bytes()));

    info!(
        path = %abs.display(),
        operations = operations.len(),
        bytes = file_size,
        "Edited file"
    );

    Ok(EditOutcome {
        absolute_path: abs,
        relative_path: resolved.relative,
        operations_applied: operations.len(),
        file_size,
    })
}

/// Built-in tool for editing existing files.
pub struct EditFileTool;

#[async_trait::async_trait]
impl BuiltinTool for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Edits an existing file by exact string replacement. Operations apply in order; each \
         before string must occur exactly expected_replacements times (default 1). Fails if the \
         file changed since it was last read; read it again and retry."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace root or absolute inside it"
                },
                "operations": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "before": {
                                "type": "string",
                                "description": "The exact text to find"
                            },
                            "after": {
                                "type": "string",
                                "description": "The replacement text"
                            },
                            "expected_replacements": {
                                "type": "integer",
                                "minimum": 1,
                                "description": "Number of occurrences to replace (default: 1)"
                            }
                        },
                        "required": ["before", "after"]
                    }
                }
            },
            "required": ["path", "operations"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let path = required_str(&args, "path")?.to_string();
        let operations = args
            .get("operations")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("operations is required".into()))?;
        let operations: Vec<EditOperation> = serde_json::from_value(operations)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid operations: {e}")))?;

        let workspace = Arc::clone(ctx.workspace());
        let outcome = run_blocking(move || edit_file(&workspace, &path, &operations)).await?;

        Ok(format!(
            "Applied {} operation(s) to {} ({} bytes)",
            outcome.operations_applied, outcome.relative_path, outcome.file_size
        ))
    }
}

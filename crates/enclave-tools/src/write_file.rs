//! Create-only write operation and the `write_file` tool.

use std::path::PathBuf;
use std::sync::Arc;

use enclave_vfs::VfsError;
use enclave_workspace::{WorkspaceContext, compute_checksum};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{FileOpError, FileOpResult};
use crate::{BuiltinTool, ToolContext, ToolError, ToolResult, required_str, run_blocking};

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    /// Resolved absolute path.
    pub absolute_path: PathBuf,
    /// Path relative to the workspace root.
    pub relative_path: String,
    /// Number of bytes written.
    pub bytes_written: u64,
    /// Permission bits applied to the new file.
    pub mode: u32,
}

/// Create a new file at `path` holding `content`.
///
/// Fails if anything already exists there; modifications go through
/// [`edit_file`](crate::edit_file()). Missing parent directories are created
/// inside the workspace. The file appears atomically with `mode` (the
/// workspace default when `None`).
///
/// # Errors
///
/// Boundary errors from resolution, [`FileOpError::FileExists`],
/// [`FileOpError::IsDirectory`], [`FileOpError::BinaryFile`],
/// [`FileOpError::TooLarge`], [`FileOpError::InvalidPermissions`], or an
/// I/O failure.
pub fn write_file(
    ctx: &WorkspaceContext,
    path: &str,
    content: &[u8],
    mode: Option<u32>,
) -> FileOpResult<WriteOutcome> {
    let mode = mode.unwrap_or_else(|| ctx.default_file_mode());
    if mode > 0o777 {
        return Err(FileOpError::InvalidPermissions(mode));
    }

    let resolved = ctx.resolve(path)?;
    let abs = resolved.absolute;
    let vfs = ctx.vfs();

    match vfs.lstat(&abs) {
        Ok(info) if info.is_dir() => return Err(FileOpError::IsDirectory(abs)),
        Ok(_) => return Err(FileOpError::FileExists(abs)),
        Err(VfsError::NotFound(_)) => {},
        Err(e) => return Err(e.into()),
    }

    if ctx.is_binary(content) {
        return Err(FileOpError::BinaryFile(abs));
    }
    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > ctx.max_file_size() {
        return Err(FileOpError::TooLarge {
            path: abs,
            size,
            limit: ctx.max_file_size(),
        });
    }

    ctx.ensure_parent_dirs(&abs)?;
    vfs.write_file_atomic(&abs, content, mode)?;
    ctx.checksums().update(abs.clone(), compute_checksum(content));

    info!(
        path = %abs.display(),
        bytes = size,
        mode = %format_args!("{mode:o}"),
        "Created file"
    );

    Ok(WriteOutcome {
        absolute_path: abs,
        relative_path: resolved.relative,
        bytes_written: size,
        mode,
    })
}

/// Parse a permission argument given either as a JSON integer or as an
/// octal string such as `"0644"` or `"0o755"`.
fn parse_mode(args: &Value) -> Result<Option<u32>, ToolError> {
    let invalid =
        || ToolError::InvalidArguments("perm must be an octal mode such as \"0644\"".into());
    match args.get("perm") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(invalid),
        Some(Value::String(s)) => {
            let digits = s.strip_prefix("0o").unwrap_or(s);
            u32::from_str_radix(digits, 8).map(Some).map_err(|_| invalid())
        },
        Some(_) => Err(invalid()),
    }
}

/// Built-in tool for creating files.
pub struct WriteFileTool;

#[async_trait::async_trait]
impl BuiltinTool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Creates a new file inside the workspace. Creates parent directories if they don't exist. \
         Fails if the file already exists; use edit_file to change existing files."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the new file, relative to the workspace root or absolute inside it"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                },
                "perm": {
                    "type": ["integer", "string"],
                    "description": "Octal permission bits such as \"0644\" (default: 0644)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let path = required_str(&args, "path")?.to_string();
        let content = required_str(&args, "content")?.to_string();
        let mode = parse_mode(&args)?;

        let workspace = Arc::clone(ctx.workspace());
        let outcome =
            run_blocking(move || write_file(&workspace, &path, content.as_bytes(), mode)).await?;

        Ok(format!(
            "Created {} ({} bytes)",
            outcome.relative_path, outcome.bytes_written
        ))
    }
}

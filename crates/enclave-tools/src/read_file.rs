//! Read operation and the `read_file` tool.

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use enclave_workspace::{WorkspaceContext, compute_checksum};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{FileOpError, FileOpResult};
use crate::truncate::truncate_at_char_boundary;
use crate::{BuiltinTool, ToolContext, ToolResult, optional_u64, required_str, run_blocking};

/// Maximum line length before truncation in tool output.
const MAX_LINE_LENGTH: usize = 2000;

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOutcome {
    /// Resolved absolute path.
    pub absolute_path: PathBuf,
    /// Path relative to the workspace root.
    pub relative_path: String,
    /// Content of the requested range, decoded as UTF-8 (lossy).
    pub content: String,
    /// Byte offset the read started at.
    pub offset: u64,
    /// Size of the whole file in bytes.
    pub size: u64,
    /// 1-based line number of the first line in `content`.
    pub start_line: u64,
    /// 1-based line number of the last line in `content`.
    pub end_line: u64,
    /// Number of lines contained in `content`.
    pub total_lines: u64,
    /// True if the file continues past the returned range.
    pub truncated: bool,
}

/// Read `limit` bytes of `path` starting at byte `offset`.
///
/// `limit == 0` reads up to the configured maximum file size. When the read
/// covers the whole file, its checksum becomes the baseline for later edits;
/// partial reads never touch the checksum store.
///
/// # Errors
///
/// Boundary errors from resolution, [`FileOpError::FileMissing`],
/// [`FileOpError::IsDirectory`], [`FileOpError::TooLarge`],
/// [`FileOpError::BinaryFile`], or an I/O failure.
pub fn read_file(
    ctx: &WorkspaceContext,
    path: &str,
    offset: u64,
    limit: u64,
) -> FileOpResult<ReadOutcome> {
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

    let limit = if limit == 0 { ctx.max_file_size() } else { limit };
    let bytes = vfs.read_file_range(&abs, offset, limit)?;
    if ctx.is_binary(&bytes) {
        return Err(FileOpError::BinaryFile(abs));
    }

    let start_line = if offset > 0 {
        let prefix = vfs.read_file_range(&abs, 0, offset)?;
        count_newlines(&prefix).saturating_add(1)
    } else {
        1
    };

    let read_len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    if offset == 0 && read_len == info.size {
        let checksum = compute_checksum(&bytes);
        debug!(path = %abs.display(), checksum = %checksum, "Cached checksum after full read");
        ctx.checksums().update(abs.clone(), checksum);
    }

    let content = String::from_utf8_lossy(&bytes).into_owned();
    let total_lines = u64::try_from(split_lines(&content).len()).unwrap_or(u64::MAX);
    let end_line = start_line.saturating_add(total_lines).saturating_sub(1);

    Ok(ReadOutcome {
        absolute_path: abs,
        relative_path: resolved.relative,
        content,
        offset,
        size: info.size,
        start_line,
        end_line,
        total_lines,
        truncated: offset.saturating_add(read_len) < info.size,
    })
}

fn count_newlines(bytes: &[u8]) -> u64 {
    let count = bytes.iter().filter(|&&b| b == b'\n').count();
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Lines of `text`, without a phantom empty line after a trailing newline.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Render an outcome in `cat -n` style, numbered from its start line.
#[must_use]
pub fn format_read_outcome(outcome: &ReadOutcome) -> String {
    let mut output = String::new();
    let lines = split_lines(&outcome.content);
    if lines.is_empty() {
        output.push_str("(empty file)\n");
    }

    let mut line_num = outcome.start_line;
    for line in lines {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let display_line = truncate_at_char_boundary(line, MAX_LINE_LENGTH);
        let _ = writeln!(output, "{line_num:>6}\t{display_line}");
        line_num = line_num.saturating_add(1);
    }

    if outcome.truncated {
        let end = outcome
            .offset
            .saturating_add(u64::try_from(outcome.content.len()).unwrap_or(u64::MAX));
        let _ = write!(
            output,
            "\n(showing bytes {}-{end} of {}; use offset/limit for more)",
            outcome.offset, outcome.size
        );
    }

    output
}

/// Built-in tool for reading files.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl BuiltinTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Reads a file inside the workspace. Returns contents with line numbers (cat -n format). \
         Use offset (byte position) and limit (byte count) to page through large files. \
         A full read records the file's checksum so later edits can detect outside changes."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the workspace root or absolute inside it"
                },
                "offset": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Byte offset to start reading from (default: 0)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Maximum bytes to read (default: the maximum file size)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let path = required_str(&args, "path")?.to_string();
        let offset = optional_u64(&args, "offset")?.unwrap_or(0);
        let limit = optional_u64(&args, "limit")?.unwrap_or(0);

        let workspace = Arc::clone(ctx.workspace());
        let outcome = run_blocking(move || read_file(&workspace, &path, offset, limit)).await?;
        Ok(format_read_outcome(&outcome))
    }
}

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Sandboxed file operations for the Enclave agent runtime.
//!
//! Three operations run inside a [`WorkspaceContext`]:
//!
//! - [`read_file`] reads a byte range and records a checksum on full reads
//! - [`write_file`] creates a new file atomically and never overwrites
//! - [`edit_file`] applies exact replacements, gated on the recorded checksum
//!
//! Each one is also exposed to the model as a JSON [`BuiltinTool`].

mod edit_file;
mod error;
mod read_file;
mod truncate;
mod write_file;

pub use edit_file::{EditFileTool, EditOperation, EditOutcome, edit_file};
pub use error::{ErrorCategory, FileOpError, FileOpResult};
pub use read_file::{ReadFileTool, ReadOutcome, format_read_outcome, read_file};
pub use truncate::{MAX_OUTPUT_CHARS, truncate_at_char_boundary, truncate_output};
pub use write_file::{WriteFileTool, WriteOutcome, write_file};

use enclave_workspace::WorkspaceContext;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A built-in tool that executes directly in-process.
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Tool name.
    fn name(&self) -> &'static str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Shared context available to all built-in tools.
#[derive(Debug, Clone)]
pub struct ToolContext {
    workspace: Arc<WorkspaceContext>,
}

impl ToolContext {
    /// Create a tool context over a workspace.
    #[must_use]
    pub fn new(workspace: Arc<WorkspaceContext>) -> Self {
        Self { workspace }
    }

    /// The workspace every tool call is confined to.
    #[must_use]
    pub fn workspace(&self) -> &Arc<WorkspaceContext> {
        &self.workspace
    }
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid arguments.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The file operation failed.
    #[error(transparent)]
    FileOp(#[from] FileOpError),

    /// No tool with this name is registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Result type for tool execution.
pub type ToolResult = Result<String, ToolError>;

/// Tool description exported to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Input JSON schema.
    pub input_schema: Value,
}

/// Registry of built-in tools for lookup and definition export.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn BuiltinTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the read, write and edit tools registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool));
        registry.register(Box::new(WriteFileTool));
        registry.register(Box::new(EditFileTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Export all tool definitions, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Run the named tool and truncate its output.
    ///
    /// # Errors
    ///
    /// [`ToolError::UnknownTool`] if nothing is registered under `name`, or
    /// the tool's own error.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolResult {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args, ctx).await.map(truncate_output)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{key} is required")))
}

/// A present value must be a non-negative integer.
fn optional_u64(args: &Value, key: &str) -> Result<Option<u64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ToolError::InvalidArguments(format!("{key} must be a non-negative integer"))
        }),
    }
}

/// Run a blocking file operation off the async runtime.
async fn run_blocking<T, F>(op: F) -> Result<T, ToolError>
where
    F: FnOnce() -> FileOpResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("file operation task failed: {e}")))?
        .map_err(ToolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_vfs::{MemoryVfs, Vfs};
    use enclave_workspace::WorkspaceOptions;

    fn ctx() -> ToolContext {
        let memory = Arc::new(MemoryVfs::new(1024));
        memory.add_dir("/workspace");
        let vfs: Arc<dyn Vfs> = memory;
        let workspace =
            WorkspaceContext::with_vfs("/workspace", vfs, WorkspaceOptions::default()).unwrap();
        ToolContext::new(Arc::new(workspace))
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("write_file").is_some());
        assert!(registry.get("edit_file").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["edit_file", "read_file", "write_file"]);
    }

    #[test]
    fn test_definitions() {
        let registry = ToolRegistry::with_defaults();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 3);
        for def in &defs {
            assert!(!def.description.is_empty());
            assert_eq!(def.input_schema["type"], "object");
            assert!(
                def.input_schema["required"]
                    .as_array()
                    .unwrap()
                    .contains(&Value::from("path"))
            );
        }
    }

    #[test]
    fn test_optional_u64() {
        let args = serde_json::json!({"a": 3, "b": -3, "c": null});
        assert_eq!(optional_u64(&args, "a").unwrap(), Some(3));
        assert!(optional_u64(&args, "b").is_err());
        assert_eq!(optional_u64(&args, "c").unwrap(), None);
        assert_eq!(optional_u64(&args, "d").unwrap(), None);
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let registry = ToolRegistry::with_defaults();
        let ctx = ctx();

        let created = registry
            .execute(
                "write_file",
                serde_json::json!({"path": "a.txt", "content": "hi\n"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(created.starts_with("Created a.txt"));

        let read = registry
            .execute("read_file", serde_json::json!({"path": "a.txt"}), &ctx)
            .await
            .unwrap();
        assert!(read.contains("     1\thi"));

        let err = registry
            .execute("bash", serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }
}

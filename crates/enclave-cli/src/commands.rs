//! Subcommand implementations. Each returns the text to print.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use enclave_tools::{
    EditOperation, ToolContext, ToolRegistry, edit_file, format_read_outcome, read_file,
    write_file,
};
use enclave_workspace::WorkspaceContext;
use serde_json::{Value, json};

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text.
    #[default]
    Pretty,
    /// One JSON document per command.
    Json,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize result")
}

pub(crate) fn resolve(ctx: &WorkspaceContext, path: &str, format: OutputFormat) -> Result<String> {
    let resolved = ctx
        .resolve(path)
        .with_context(|| format!("cannot resolve {path}"))?;

    match format {
        OutputFormat::Pretty => Ok(format!(
            "{}\t{}",
            resolved.absolute.display(),
            if resolved.is_root() { "." } else { resolved.relative.as_str() }
        )),
        OutputFormat::Json => to_json(&json!({
            "absolute_path": resolved.absolute,
            "relative_path": resolved.relative,
        })),
    }
}

pub(crate) fn read(
    ctx: &WorkspaceContext,
    path: &str,
    offset: u64,
    limit: u64,
    format: OutputFormat,
) -> Result<String> {
    let outcome =
        read_file(ctx, path, offset, limit).with_context(|| format!("cannot read {path}"))?;

    match format {
        OutputFormat::Pretty => Ok(format_read_outcome(&outcome)),
        OutputFormat::Json => to_json(&outcome),
    }
}

pub(crate) fn write(
    ctx: &WorkspaceContext,
    path: &str,
    content: &[u8],
    mode: Option<u32>,
    format: OutputFormat,
) -> Result<String> {
    let outcome =
        write_file(ctx, path, content, mode).with_context(|| format!("cannot create {path}"))?;

    match format {
        OutputFormat::Pretty => Ok(format!(
            "Created {} ({} bytes, mode {:04o})",
            outcome.relative_path, outcome.bytes_written, outcome.mode
        )),
        OutputFormat::Json => to_json(&outcome),
    }
}

pub(crate) fn edit(
    ctx: &WorkspaceContext,
    path: &str,
    operations: &[EditOperation],
    format: OutputFormat,
) -> Result<String> {
    let outcome =
        edit_file(ctx, path, operations).with_context(|| format!("cannot edit {path}"))?;

    match format {
        OutputFormat::Pretty => Ok(format!(
            "Applied {} operation(s) to {} ({} bytes)",
            outcome.operations_applied, outcome.relative_path, outcome.file_size
        )),
        OutputFormat::Json => to_json(&outcome),
    }
}

/// Build the operation list for `edit` from either repeated flags or a JSON
/// array.
pub(crate) fn edit_operations(
    before: &[String],
    after: &[String],
    expected: Option<usize>,
    operations_json: Option<&str>,
) -> Result<Vec<EditOperation>> {
    if let Some(raw) = operations_json {
        return serde_json::from_str(raw).context("--operations must be a JSON array of edits");
    }

    anyhow::ensure!(
        before.len() == after.len(),
        "--before given {} time(s) but --after given {} time(s)",
        before.len(),
        after.len()
    );

    Ok(before
        .iter()
        .zip(after)
        .map(|(b, a)| {
            EditOperation::new(b.as_str(), a.as_str())
                .with_expected_replacements(expected.unwrap_or(1))
        })
        .collect())
}

pub(crate) fn tools(format: OutputFormat) -> Result<String> {
    let registry = ToolRegistry::with_defaults();

    match format {
        OutputFormat::Pretty => Ok(registry
            .definitions()
            .iter()
            .map(|def| format!("{}\n    {}", def.name, def.description))
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Json => to_json(&registry.definitions()),
    }
}

/// Run a registered tool with raw JSON arguments, as a model would.
pub(crate) async fn call(ctx: Arc<WorkspaceContext>, tool: &str, args: &str) -> Result<String> {
    let args: Value = serde_json::from_str(args).context("--args must be a JSON object")?;
    let registry = ToolRegistry::with_defaults();

    registry
        .execute(tool, args, &ToolContext::new(ctx))
        .await
        .with_context(|| format!("tool {tool} failed"))
}

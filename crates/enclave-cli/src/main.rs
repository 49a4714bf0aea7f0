//! Enclave CLI - workspace-confined file operations.
//!
//! Drives the read, write and edit operations of the sandbox from the shell,
//! with the same boundary checks and conflict detection a model gets through
//! the tool registry.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enclave_config::{Config, parse_octal_mode};
use enclave_workspace::WorkspaceContext;

mod commands;
mod config_bridge;

use commands::OutputFormat;

/// Enclave - workspace-confined file operations
#[derive(Debug, Parser)]
#[command(name = "enclave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true, env = "ENCLAVE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show where a path resolves inside the workspace
    Resolve {
        /// Path to resolve (relative, absolute, or `~`-prefixed)
        path: String,
    },

    /// Read a file, optionally a byte range of it
    Read {
        /// File to read
        path: String,

        /// Byte offset to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Maximum bytes to read (0 reads up to the size limit)
        #[arg(long, default_value_t = 0)]
        limit: u64,
    },

    /// Create a new file (fails if it already exists)
    Write {
        /// File to create
        path: String,

        /// Literal content
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,

        /// Take content from a file, or `-` for stdin
        #[arg(long)]
        from_file: Option<PathBuf>,

        /// Permission bits in octal (e.g. 0644)
        #[arg(long, value_parser = parse_perm)]
        perm: Option<u32>,
    },

    /// Replace snippets in an existing file
    Edit {
        /// File to edit
        path: String,

        /// Text to find (repeat for several operations)
        #[arg(long, conflicts_with = "operations")]
        before: Vec<String>,

        /// Replacement text, paired with `--before` in order
        #[arg(long, conflicts_with = "operations")]
        after: Vec<String>,

        /// Exact number of occurrences each `--before` must have
        #[arg(long)]
        expected: Option<usize>,

        /// Operations as a JSON array of `{before, after, expected_replacements}`
        #[arg(long)]
        operations: Option<String>,
    },

    /// List the tools exposed to the model
    Tools,

    /// Invoke a tool with JSON arguments
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

fn parse_perm(raw: &str) -> Result<u32, String> {
    parse_octal_mode(raw).ok_or_else(|| format!("'{raw}' is not an octal mode"))
}

fn read_content(content: Option<String>, from_file: Option<PathBuf>) -> Result<Vec<u8>> {
    match (content, from_file) {
        (Some(text), _) => Ok(text.into_bytes()),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        },
        (None, Some(path)) => {
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
        },
        (None, None) => Ok(Vec::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let resolved = Config::load(Some(&root), None).context("failed to load configuration")?;

    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = enclave_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
    for file in &resolved.loaded_files {
        tracing::debug!(path = %file, "Loaded config file");
    }

    let options = config_bridge::to_workspace_options(&resolved.config);
    let ctx = WorkspaceContext::open(&root, options)
        .with_context(|| format!("cannot open workspace {}", root.display()))?;

    let format = cli.format;
    let output = match cli.command {
        Commands::Resolve { path } => commands::resolve(&ctx, &path, format)?,
        Commands::Read {
            path,
            offset,
            limit,
        } => commands::read(&ctx, &path, offset, limit, format)?,
        Commands::Write {
            path,
            content,
            from_file,
            perm,
        } => {
            let bytes = read_content(content, from_file)?;
            commands::write(&ctx, &path, &bytes, perm, format)?
        },
        Commands::Edit {
            path,
            before,
            after,
            expected,
            operations,
        } => {
            let ops = commands::edit_operations(&before, &after, expected, operations.as_deref())?;
            commands::edit(&ctx, &path, &ops, format)?
        },
        Commands::Tools => commands::tools(format)?,
        Commands::Call { tool, args } => commands::call(Arc::new(ctx), &tool, &args).await?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_with_range() {
        let cli = Cli::try_parse_from([
            "enclave", "read", "src/lib.rs", "--offset", "10", "--limit", "20",
        ])
        .unwrap();

        match cli.command {
            Commands::Read {
                path,
                offset,
                limit,
            } => {
                assert_eq!(path, "src/lib.rs");
                assert_eq!(offset, 10);
                assert_eq!(limit, 20);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_negative_offset_rejected() {
        assert!(Cli::try_parse_from(["enclave", "read", "a.txt", "--offset", "-1"]).is_err());
    }

    #[test]
    fn test_parse_write_perm_octal() {
        let cli = Cli::try_parse_from([
            "enclave", "write", "bin/run.sh", "--content", "#!/bin/sh\n", "--perm", "0755",
        ])
        .unwrap();

        match cli.command {
            Commands::Write { perm, .. } => assert_eq!(perm, Some(0o755)),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(
            Cli::try_parse_from(["enclave", "write", "a", "--content", "", "--perm", "rwx"])
                .is_err()
        );
    }

    #[test]
    fn test_write_content_conflicts_with_file() {
        assert!(
            Cli::try_parse_from([
                "enclave",
                "write",
                "a",
                "--content",
                "x",
                "--from-file",
                "b"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_edit_repeated_ops() {
        let cli = Cli::try_parse_from([
            "enclave", "edit", "a.txt", "--before", "x", "--after", "y", "--before", "p",
            "--after", "q", "--expected", "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Edit {
                before,
                after,
                expected,
                ..
            } => {
                assert_eq!(before, vec!["x", "p"]);
                assert_eq!(after, vec!["y", "q"]);
                assert_eq!(expected, Some(2));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["enclave", "tools", "--format", "json", "-w", "/tmp", "-v"])
                .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_read_content_literal_wins() {
        let bytes = read_content(Some("abc".into()), None).unwrap();
        assert_eq!(bytes, b"abc");
        assert!(read_content(None, None).unwrap().is_empty());
    }
}

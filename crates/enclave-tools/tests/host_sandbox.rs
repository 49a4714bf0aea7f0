//! File operations against the real filesystem.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::os::unix::fs::{PermissionsExt, symlink};
use std::sync::Arc;

use enclave_tools::{
    EditOperation, FileOpError, ToolContext, ToolRegistry, edit_file, read_file, write_file,
};
use enclave_workspace::{WorkspaceContext, WorkspaceOptions};
use tempfile::TempDir;

fn workspace() -> (TempDir, WorkspaceContext) {
    let dir = TempDir::new().unwrap();
    let ctx = WorkspaceContext::open(dir.path(), WorkspaceOptions::default()).unwrap();
    (dir, ctx)
}

#[test]
fn test_write_edit_read_on_disk() {
    let (dir, ctx) = workspace();

    let written = write_file(&ctx, "src/lib.rs", b"pub fn a() {}\n", None).unwrap();
    assert_eq!(written.relative_path, "src/lib.rs");
    let on_disk = dir.path().join("src/lib.rs");
    assert_eq!(
        std::fs::metadata(&on_disk).unwrap().permissions().mode() & 0o777,
        0o644
    );

    edit_file(&ctx, "src/lib.rs", &[EditOperation::new("a()", "b()")]).unwrap();
    assert_eq!(std::fs::read_to_string(&on_disk).unwrap(), "pub fn b() {}\n");

    let outcome = read_file(&ctx, "src/lib.rs", 0, 0).unwrap();
    assert_eq!(outcome.content, "pub fn b() {}\n");

    // No temp files are left behind next to the target.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("src"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n.to_string_lossy().starts_with(".tmp-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_edit_preserves_mode_on_disk() {
    let (dir, ctx) = workspace();
    let script = dir.path().join("run.sh");
    std::fs::write(&script, "echo hi\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o700)).unwrap();

    edit_file(&ctx, "run.sh", &[EditOperation::new("hi", "bye")]).unwrap();
    assert_eq!(
        std::fs::metadata(&script).unwrap().permissions().mode() & 0o777,
        0o700
    );
}

#[test]
fn test_hand_edit_detected() {
    let (dir, ctx) = workspace();
    let file = dir.path().join("notes.md");
    std::fs::write(&file, "draft\n").unwrap();
    read_file(&ctx, "notes.md", 0, 0).unwrap();

    std::fs::write(&file, "draft, edited by hand\n").unwrap();
    let err = edit_file(&ctx, "notes.md", &[EditOperation::new("draft", "final")]).unwrap_err();
    assert!(matches!(err, FileOpError::EditConflict { .. }));
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "draft, edited by hand\n");
}

#[test]
fn test_symlink_escape_on_disk() {
    let (dir, ctx) = workspace();
    let outside = TempDir::new().unwrap();
    std::fs::write(outside.path().join("target"), "secret").unwrap();
    symlink(outside.path().join("target"), dir.path().join("link")).unwrap();
    symlink(outside.path(), dir.path().join("out")).unwrap();

    assert!(matches!(
        read_file(&ctx, "link", 0, 0),
        Err(FileOpError::OutsideWorkspace { .. })
    ));
    assert!(matches!(
        write_file(&ctx, "out/planted.txt", b"x", None),
        Err(FileOpError::OutsideWorkspace { .. })
    ));
    assert!(!outside.path().join("planted.txt").exists());
}

#[tokio::test]
async fn test_tools_on_disk() {
    let (dir, ctx) = workspace();
    let registry = ToolRegistry::with_defaults();
    let tool_ctx = ToolContext::new(Arc::new(ctx));

    registry
        .execute(
            "write_file",
            serde_json::json!({"path": "a.txt", "content": "one\ntwo\nthree\n"}),
            &tool_ctx,
        )
        .await
        .unwrap();
    registry
        .execute(
            "edit_file",
            serde_json::json!({"path": "a.txt", "operations": [{"before": "two", "after": "2"}]}),
            &tool_ctx,
        )
        .await
        .unwrap();
    let output = registry
        .execute(
            "read_file",
            serde_json::json!({"path": "a.txt", "offset": 4}),
            &tool_ctx,
        )
        .await
        .unwrap();

    assert!(output.contains("     2\t2"));
    assert!(output.contains("     3\tthree"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "one\n2\nthree\n"
    );
}

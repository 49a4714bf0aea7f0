//! Workspace boundary resolution.
//!
//! [`resolve`] turns a caller-supplied path into an absolute path that is
//! guaranteed to lie inside the workspace root, walking it one component at
//! a time and expanding every symlink it meets. A symlink whose target leaves
//! the root is rejected even when the final file does not exist yet, so a
//! create-only write can never be redirected outside the workspace.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use enclave_vfs::{VfsError, normalize_lexically};
use tracing::{debug, warn};

use crate::context::WorkspaceContext;
use crate::error::{WorkspaceError, WorkspaceResult};

/// Maximum number of links in one symlink chain.
pub const MAX_SYMLINK_HOPS: usize = 64;

/// A path that has been proven to lie within the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path with every symlink expanded.
    pub absolute: PathBuf,
    /// Path relative to the root, `/`-separated. Empty for the root itself.
    pub relative: String,
}

impl ResolvedPath {
    /// True if this is the workspace root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }
}

/// Resolve `path` inside the workspace of `ctx`.
///
/// `~` and `~/...` expand to the user's home directory, relative paths are
/// joined onto the root, and the result is cleaned lexically before the
/// walk. Nothing is created on disk.
///
/// # Errors
///
/// - [`WorkspaceError::WorkspaceRootNotSet`] if the context has no root
/// - [`WorkspaceError::OutsideWorkspace`] if the path or any symlink target
///   leaves the root
/// - [`WorkspaceError::SymlinkLoop`] / [`WorkspaceError::SymlinkChainTooLong`]
///   for unresolvable link chains
/// - [`WorkspaceError::NotADirectory`] if a file sits where a directory is needed
/// - [`WorkspaceError::Vfs`] for any other lookup failure
pub fn resolve(ctx: &WorkspaceContext, path: impl AsRef<Path>) -> WorkspaceResult<ResolvedPath> {
    let path = path.as_ref();
    let request = path.to_string_lossy();
    let root = ctx.root();
    if root.as_os_str().is_empty() {
        return Err(WorkspaceError::WorkspaceRootNotSet);
    }

    let expanded = expand_home(ctx, path)?;
    let absolute = if expanded.has_root() {
        expanded
    } else {
        root.join(expanded)
    };
    let cleaned = normalize_lexically(&absolute);

    let result = Walker::new(ctx, &request).walk(&cleaned).and_then(|resolved| {
        let relative = relative_to_root(root, &resolved, &request)?;
        Ok(ResolvedPath {
            absolute: resolved,
            relative,
        })
    });

    match &result {
        Ok(resolved) => debug!(
            request = %request,
            resolved = %resolved.absolute.display(),
            "Resolved workspace path"
        ),
        Err(e) if e.is_boundary_violation() => warn!(
            request = %request,
            root = %root.display(),
            error = %e,
            "Rejected workspace path"
        ),
        Err(_) => {},
    }

    result
}

/// Create every missing ancestor directory of `absolute`.
///
/// The parent is resolved again first, so a symlink planted in the parent
/// chain cannot make directory creation escape the root.
///
/// # Errors
///
/// Any boundary failure from [`resolve`], or the filesystem error from
/// creating the directories.
pub fn ensure_parent_dirs(ctx: &WorkspaceContext, absolute: &Path) -> WorkspaceResult<()> {
    let Some(parent) = absolute.parent() else {
        return Ok(());
    };
    let resolved = resolve(ctx, parent)?;
    ctx.vfs().ensure_dirs(&resolved.absolute)?;
    Ok(())
}

fn expand_home(ctx: &WorkspaceContext, path: &Path) -> WorkspaceResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = ctx.vfs().user_home_dir()?;
            Ok(if rest.as_os_str().is_empty() {
                home
            } else {
                home.join(rest)
            })
        },
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn is_within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Symlink-expanding walk for a single [`resolve`] call.
struct Walker<'a> {
    ctx: &'a WorkspaceContext,
    request: &'a str,
    /// Links whose targets are being resolved further up the call stack.
    expanding: Vec<PathBuf>,
}

impl<'a> Walker<'a> {
    fn new(ctx: &'a WorkspaceContext, request: &'a str) -> Self {
        Self {
            ctx,
            request,
            expanding: Vec::new(),
        }
    }

    fn outside(&self) -> WorkspaceError {
        WorkspaceError::OutsideWorkspace {
            path: self.request.to_string(),
        }
    }

    /// Component walk over an absolute, lexically clean path.
    ///
    /// Outside the root, only ancestors of the root and symlinks are
    /// accepted as intermediate positions; a symlink must lead back inside.
    /// The caller checks the final position.
    fn walk(&mut self, path: &Path) -> WorkspaceResult<PathBuf> {
        let ctx = self.ctx;
        let root = ctx.root();

        let mut current = PathBuf::new();
        let mut components = path.components();
        while let Some(component) = components.next() {
            let name = match component {
                Component::Prefix(_) | Component::RootDir => {
                    current.push(component.as_os_str());
                    continue;
                },
                Component::CurDir => continue,
                Component::ParentDir => {
                    if !current.pop() || !is_within(&current, root) {
                        return Err(self.outside());
                    }
                    continue;
                },
                Component::Normal(name) => name,
            };

            let candidate = current.join(name);
            let inside = is_within(&candidate, root);
            let info = match ctx.vfs().lstat(&candidate) {
                Ok(info) => info,
                Err(VfsError::NotFound(_)) => {
                    if !inside {
                        return Err(self.outside());
                    }
                    current = candidate;
                    continue;
                },
                Err(VfsError::NotADirectory(_)) => {
                    return Err(WorkspaceError::NotADirectory(current));
                },
                Err(e) => return Err(e.into()),
            };

            if info.is_symlink() {
                current = self.follow(candidate)?;
                continue;
            }
            if !inside && !root.starts_with(&candidate) {
                return Err(self.outside());
            }

            let has_more = components
                .clone()
                .any(|c| matches!(c, Component::Normal(_)));
            if !info.is_dir() && has_more {
                return Err(WorkspaceError::NotADirectory(candidate));
            }
            current = candidate;
        }

        Ok(current)
    }

    /// Follow the chain of links starting at `link` to its final position.
    ///
    /// The parent of every target is resolved by a nested walk, so links in
    /// a target's ancestors form chains of their own. A link that reappears
    /// in the same chain, or in a chain still being expanded above this
    /// one, is a loop.
    fn follow(&mut self, mut link: PathBuf) -> WorkspaceResult<PathBuf> {
        let ctx = self.ctx;
        let root = ctx.root();
        let mut chain: HashSet<PathBuf> = HashSet::new();

        loop {
            if self.expanding.contains(&link) || !chain.insert(link.clone()) {
                return Err(WorkspaceError::SymlinkLoop { path: link });
            }
            if chain.len() > MAX_SYMLINK_HOPS {
                return Err(WorkspaceError::SymlinkChainTooLong {
                    path: link,
                    limit: MAX_SYMLINK_HOPS,
                });
            }

            let raw = ctx.vfs().read_link(&link)?;
            let target = normalize_lexically(&match link.parent() {
                Some(parent) if !raw.has_root() => parent.join(&raw),
                _ => raw,
            });
            if !is_within(&target, root) {
                debug!(
                    link = %link.display(),
                    target = %target.display(),
                    "Symlink target outside workspace"
                );
                return Err(self.outside());
            }

            let (Some(parent), Some(name)) = (target.parent(), target.file_name()) else {
                return Ok(target);
            };
            if target == root {
                return Ok(target);
            }

            self.expanding.push(link.clone());
            let parent = self.walk(parent);
            self.expanding.pop();
            let parent = parent?;
            if !is_within(&parent, root) {
                return Err(self.outside());
            }

            let candidate = parent.join(name);
            match ctx.vfs().lstat(&candidate) {
                Ok(info) if info.is_symlink() => link = candidate,
                Ok(_) | Err(VfsError::NotFound(_)) => return Ok(candidate),
                Err(VfsError::NotADirectory(_)) => {
                    return Err(WorkspaceError::NotADirectory(parent));
                },
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn relative_to_root(root: &Path, resolved: &Path, request: &str) -> WorkspaceResult<String> {
    let outside = || WorkspaceError::OutsideWorkspace {
        path: request.to_string(),
    };
    let relative = resolved.strip_prefix(root).map_err(|_| outside())?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy()),
            Component::CurDir => {},
            _ => return Err(outside()),
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::WorkspaceOptions;
    use enclave_vfs::{MemoryVfs, Vfs};
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryVfs>, WorkspaceContext) {
        let memory = Arc::new(MemoryVfs::new(1024).with_home("/workspace/home"));
        memory.add_dir("/workspace/src");
        memory.add_dir("/outside");
        memory.add_file("/workspace/src/main.rs", "fn main() {}\n");
        memory.add_file("/outside/secret.txt", "secret");
        let vfs: Arc<dyn Vfs> = memory.clone();
        let ctx =
            WorkspaceContext::with_vfs("/workspace", vfs, WorkspaceOptions::default()).unwrap();
        (memory, ctx)
    }

    fn assert_outside(result: WorkspaceResult<ResolvedPath>) {
        assert!(
            matches!(result, Err(WorkspaceError::OutsideWorkspace { .. })),
            "expected OutsideWorkspace, got {result:?}"
        );
    }

    #[test]
    fn test_relative_path() {
        let (_, ctx) = setup();
        let resolved = resolve(&ctx, "src/main.rs").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/src/main.rs"));
        assert_eq!(resolved.relative, "src/main.rs");
    }

    #[test]
    fn test_absolute_path_inside_root() {
        let (_, ctx) = setup();
        let resolved = resolve(&ctx, "/workspace/src/main.rs").unwrap();
        assert_eq!(resolved.relative, "src/main.rs");
    }

    #[test]
    fn test_root_itself() {
        let (_, ctx) = setup();
        for path in [".", "/workspace", "src/.."] {
            let resolved = resolve(&ctx, path).unwrap();
            assert_eq!(resolved.absolute, Path::new("/workspace"));
            assert!(resolved.is_root());
        }
    }

    #[test]
    fn test_missing_path_resolves() {
        let (_, ctx) = setup();
        let resolved = resolve(&ctx, "new/dir/file.txt").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/new/dir/file.txt"));
        assert_eq!(resolved.relative, "new/dir/file.txt");
    }

    #[test]
    fn test_parent_escape_rejected() {
        let (_, ctx) = setup();
        assert_outside(resolve(&ctx, "../outside/secret.txt"));
        assert_outside(resolve(&ctx, "src/../../outside"));
        assert_outside(resolve(&ctx, "/outside/secret.txt"));
        assert_outside(resolve(&ctx, "/"));
    }

    #[test]
    fn test_sibling_prefix_rejected() {
        let (memory, ctx) = setup();
        memory.add_file("/workspace-evil/file.txt", "x");
        assert_outside(resolve(&ctx, "/workspace-evil/file.txt"));
    }

    #[test]
    fn test_tilde_expansion() {
        let (memory, ctx) = setup();
        memory.add_dir("/workspace/home");
        let resolved = resolve(&ctx, "~/notes.md").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/home/notes.md"));
        let resolved = resolve(&ctx, "~").unwrap();
        assert_eq!(resolved.relative, "home");
    }

    #[test]
    fn test_tilde_outside_root_rejected() {
        let memory = Arc::new(MemoryVfs::new(1024));
        memory.add_dir("/workspace");
        memory.add_dir("/home/user");
        let vfs: Arc<dyn Vfs> = memory;
        let ctx =
            WorkspaceContext::with_vfs("/workspace", vfs, WorkspaceOptions::default()).unwrap();
        assert_outside(resolve(&ctx, "~/.ssh/id_rsa"));
    }

    #[test]
    fn test_symlink_inside_root_followed() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/link.rs", "src/main.rs");
        let resolved = resolve(&ctx, "link.rs").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/src/main.rs"));
        assert_eq!(resolved.relative, "src/main.rs");
    }

    #[test]
    fn test_symlinked_directory_followed() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/code", "/workspace/src");
        let resolved = resolve(&ctx, "code/new.rs").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/src/new.rs"));
    }

    #[test]
    fn test_symlink_escape_rejected() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/escape", "/outside");
        memory.add_symlink("/workspace/secret", "../outside/secret.txt");
        assert_outside(resolve(&ctx, "escape/secret.txt"));
        assert_outside(resolve(&ctx, "escape/does-not-exist.txt"));
        assert_outside(resolve(&ctx, "secret"));
    }

    #[test]
    fn test_outside_alias_into_root_accepted() {
        let (memory, ctx) = setup();
        memory.add_symlink("/alias", "/workspace");
        let resolved = resolve(&ctx, "/alias/src/main.rs").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/src/main.rs"));
    }

    #[test]
    fn test_dangling_symlink_escape_rejected() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/dangling", "/outside/new-file.txt");
        assert_outside(resolve(&ctx, "dangling"));
    }

    #[test]
    fn test_dangling_symlink_inside_root() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/pending", "src/not-yet.rs");
        let resolved = resolve(&ctx, "pending").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/src/not-yet.rs"));
    }

    #[test]
    fn test_link_through_escaping_ancestor_rejected() {
        let (memory, ctx) = setup();
        // The target path looks inside the root, but its parent is a link out.
        memory.add_symlink("/workspace/out", "/outside");
        memory.add_symlink("/workspace/sneaky", "/workspace/out/secret.txt");
        assert_outside(resolve(&ctx, "sneaky"));
    }

    #[test]
    fn test_symlink_loop_detected() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/a", "b");
        memory.add_symlink("/workspace/b", "a");
        assert!(matches!(
            resolve(&ctx, "a"),
            Err(WorkspaceError::SymlinkLoop { .. })
        ));
    }

    #[test]
    fn test_self_loop_detected() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/self", "self");
        assert!(matches!(
            resolve(&ctx, "self/file.txt"),
            Err(WorkspaceError::SymlinkLoop { .. })
        ));
    }

    #[test]
    fn test_chain_too_long() {
        let (memory, ctx) = setup();
        let links = MAX_SYMLINK_HOPS + 1;
        for i in 0..links {
            memory.add_symlink(format!("/workspace/l{i}"), format!("l{}", i + 1));
        }
        memory.add_file(format!("/workspace/l{links}"), "end");

        assert!(matches!(
            resolve(&ctx, "l0"),
            Err(WorkspaceError::SymlinkChainTooLong { limit: MAX_SYMLINK_HOPS, .. })
        ));
        // Exactly the limit resolves.
        let resolved = resolve(&ctx, "l1").unwrap();
        assert_eq!(resolved.absolute, PathBuf::from(format!("/workspace/l{links}")));
        let resolved = resolve(&ctx, "l2").unwrap();
        assert_eq!(resolved.absolute, PathBuf::from(format!("/workspace/l{links}")));
    }

    #[test]
    fn test_chain_through_same_directory_link_twice() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/x", "d/f1");
        memory.add_symlink("/workspace/d", "real");
        memory.add_symlink("/workspace/real/f1", "../d/f2");
        memory.add_file("/workspace/real/f2", "payload");

        let resolved = resolve(&ctx, "x").unwrap();
        assert_eq!(resolved.absolute, Path::new("/workspace/real/f2"));
        assert_eq!(resolved.relative, "real/f2");
    }

    #[test]
    fn test_ancestor_links_not_counted_in_chain() {
        let (memory, ctx) = setup();
        // Every hop goes through `d`, doubling the links touched.
        memory.add_symlink("/workspace/d", ".");
        let links = MAX_SYMLINK_HOPS - 1;
        for i in 0..links {
            memory.add_symlink(format!("/workspace/c{i}"), format!("d/c{}", i + 1));
        }
        memory.add_file(format!("/workspace/c{links}"), "end");

        let resolved = resolve(&ctx, "c0").unwrap();
        assert_eq!(resolved.relative, format!("c{links}"));
    }

    #[test]
    fn test_target_through_its_own_link_is_loop() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/a", "a/inner");
        assert!(matches!(
            resolve(&ctx, "a"),
            Err(WorkspaceError::SymlinkLoop { .. })
        ));
    }

    #[test]
    fn test_file_used_as_directory() {
        let (_, ctx) = setup();
        assert!(matches!(
            resolve(&ctx, "src/main.rs/nested"),
            Err(WorkspaceError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_lookup_error_propagates() {
        let (memory, ctx) = setup();
        memory.set_error("/workspace/src", std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            resolve(&ctx, "src/main.rs"),
            Err(WorkspaceError::Vfs(VfsError::Io { .. }))
        ));
    }

    #[test]
    fn test_ensure_parent_dirs_creates_tree() {
        let (memory, ctx) = setup();
        let resolved = resolve(&ctx, "a/b/c.txt").unwrap();
        ensure_parent_dirs(&ctx, &resolved.absolute).unwrap();
        assert!(memory.exists("/workspace/a/b"));
        assert!(!memory.exists("/workspace/a/b/c.txt"));
    }

    #[test]
    fn test_ensure_parent_dirs_rejects_escape() {
        let (memory, ctx) = setup();
        memory.add_symlink("/workspace/out", "/outside");
        let err = ensure_parent_dirs(&ctx, Path::new("/workspace/out/new/file.txt")).unwrap_err();
        assert!(matches!(err, WorkspaceError::OutsideWorkspace { .. }));
        assert!(!memory.exists("/outside/new"));
    }
}

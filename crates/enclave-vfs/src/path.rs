use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` components, collapse `..` against the
/// preceding normal component.
///
/// Does NOT touch the filesystem. A `..` directly under the root is dropped
/// (`/..` is `/`); leading `..` components of a relative path are kept.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    let mut normal_depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                cleaned.push(component.as_os_str());
            },
            Component::CurDir => {},
            Component::ParentDir => {
                if normal_depth > 0 {
                    cleaned.pop();
                    normal_depth = normal_depth.saturating_sub(1);
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            },
            Component::Normal(part) => {
                cleaned.push(part);
                normal_depth = normal_depth.saturating_add(1);
            },
        }
    }

    cleaned
}

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::path::normalize_lexically;
use crate::{DirEntry, FileInfo, FileKind, Vfs, VfsError, VfsResult};

/// Maximum symlink expansions during a single lookup (mirrors Linux `MAXSYMLINKS`).
const MAX_LOOKUP_HOPS: usize = 40;

/// Callback run after every successful read.
///
/// Receives the resolved path and the number of reads of that path so far.
/// Returning `Some(bytes)` replaces the file content, which is how tests
/// simulate another actor editing the file between two reads.
pub type ReadHook = dyn Fn(&Path, usize) -> Option<Vec<u8>> + Send + Sync;

#[derive(Debug, Clone)]
enum Node {
    File {
        content: Vec<u8>,
        mode: u32,
        modified: SystemTime,
    },
    Dir,
    Symlink(PathBuf),
}

impl Node {
    fn info(&self) -> FileInfo {
        match self {
            Self::File {
                content,
                mode,
                modified,
            } => FileInfo {
                kind: FileKind::File,
                size: u64::try_from(content.len()).unwrap_or(u64::MAX),
                mode: *mode,
                modified: Some(*modified),
            },
            Self::Dir => FileInfo {
                kind: FileKind::Dir,
                size: 0,
                mode: 0o755,
                modified: None,
            },
            Self::Symlink(_) => FileInfo {
                kind: FileKind::Symlink,
                size: 0,
                mode: 0o777,
                modified: None,
            },
        }
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<PathBuf, Node>,
    errors: HashMap<PathBuf, io::ErrorKind>,
    failing_writes: HashSet<PathBuf>,
    read_counts: HashMap<PathBuf, usize>,
    write_attempts: usize,
}

/// An in-memory implementation of [`Vfs`].
///
/// Paths are Unix-style and absolute. Lookups follow symlinks in ancestors
/// the way the kernel does, so the workspace resolver can be exercised
/// without touching the disk. Fault injection hooks (`set_error`,
/// `fail_writes`, `set_read_hook`) let tests drive the failure paths.
pub struct MemoryVfs {
    state: Mutex<State>,
    read_hook: Mutex<Option<Box<ReadHook>>>,
    max_file_size: u64,
    home: PathBuf,
}

impl std::fmt::Debug for MemoryVfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVfs")
            .field("max_file_size", &self.max_file_size)
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

impl MemoryVfs {
    /// Create an empty filesystem containing only `/`.
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        let mut state = State::default();
        state.nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            state: Mutex::new(state),
            read_hook: Mutex::new(None),
            max_file_size,
            home: PathBuf::from("/home/user"),
        }
    }

    /// Set the directory returned by [`Vfs::user_home_dir`].
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a directory and all of its ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state();
        insert_ancestors(&mut state, path.as_ref());
        state
            .nodes
            .insert(normalize_lexically(path.as_ref()), Node::Dir);
    }

    /// Create (or overwrite) a file with mode `0o644`, creating ancestors.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.add_file_with_mode(path, content, 0o644);
    }

    /// Create (or overwrite) a file with an explicit mode, creating ancestors.
    pub fn add_file_with_mode(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        mode: u32,
    ) {
        let mut state = self.state();
        insert_ancestors(&mut state, path.as_ref());
        state.nodes.insert(
            normalize_lexically(path.as_ref()),
            Node::File {
                content: content.into(),
                mode,
                modified: SystemTime::now(),
            },
        );
    }

    /// Create a symlink at `link` pointing at `target` (stored verbatim).
    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let mut state = self.state();
        insert_ancestors(&mut state, link.as_ref());
        state
            .nodes
            .insert(normalize_lexically(link.as_ref()), Node::Symlink(target.into()));
    }

    /// Replace the content of an existing file, keeping its mode.
    ///
    /// Simulates an edit made by another process. Creates the file if absent.
    pub fn set_content(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let key = normalize_lexically(path.as_ref());
        let mut state = self.state();
        let mode = match state.nodes.get(&key) {
            Some(Node::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        state.nodes.insert(
            key,
            Node::File {
                content: content.into(),
                mode,
                modified: SystemTime::now(),
            },
        );
    }

    /// Remove a single entry (not recursive).
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.state()
            .nodes
            .remove(&normalize_lexically(path.as_ref()));
    }

    /// Current content of the file stored exactly at `path`, if any.
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.state().nodes.get(&normalize_lexically(path.as_ref())) {
            Some(Node::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Mode of the file stored exactly at `path`, if any.
    #[must_use]
    pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        match self.state().nodes.get(&normalize_lexically(path.as_ref())) {
            Some(Node::File { mode, .. }) => Some(*mode),
            _ => None,
        }
    }

    /// True if any entry is stored exactly at `path`.
    #[must_use]
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.state()
            .nodes
            .contains_key(&normalize_lexically(path.as_ref()))
    }

    /// Make every operation on exactly `path` fail with `kind`.
    pub fn set_error(&self, path: impl AsRef<Path>, kind: io::ErrorKind) {
        self.state()
            .errors
            .insert(normalize_lexically(path.as_ref()), kind);
    }

    /// Remove an injected error.
    pub fn clear_error(&self, path: impl AsRef<Path>) {
        self.state()
            .errors
            .remove(&normalize_lexically(path.as_ref()));
    }

    /// Make atomic writes to `path` fail after the temp file would have been
    /// written but before the rename, leaving the target untouched.
    pub fn fail_writes(&self, path: impl AsRef<Path>) {
        self.state()
            .failing_writes
            .insert(normalize_lexically(path.as_ref()));
    }

    /// Number of `write_file_atomic` calls, successful or not.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.state().write_attempts
    }

    /// Number of successful reads of the file at `path`.
    #[must_use]
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.state()
            .read_counts
            .get(&normalize_lexically(path.as_ref()))
            .copied()
            .unwrap_or(0)
    }

    /// Install a hook run after every successful read. See [`ReadHook`].
    pub fn set_read_hook<F>(&self, hook: F)
    where
        F: Fn(&Path, usize) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        *self
            .read_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    fn injected(state: &State, op: &'static str, path: &Path) -> VfsResult<()> {
        match state.errors.get(&normalize_lexically(path)) {
            Some(kind) => Err(VfsError::from_io(op, path, io::Error::from(*kind))),
            None => Ok(()),
        }
    }

    fn node_at<'a>(
        state: &'a State,
        path: &Path,
        follow_last: bool,
    ) -> VfsResult<(PathBuf, &'a Node)> {
        let real = locate(state, path, follow_last)?;
        match state.nodes.get(&real) {
            Some(node) => Ok((real, node)),
            None => Err(VfsError::NotFound(path.to_path_buf())),
        }
    }
}

fn insert_ancestors(state: &mut State, path: &Path) {
    let normalized = normalize_lexically(path);
    let mut current = PathBuf::new();
    let mut components = normalized.components().peekable();
    while let Some(component) = components.next() {
        current.push(component.as_os_str());
        if components.peek().is_some() {
            state.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
    }
}

fn split(path: &Path) -> (PathBuf, VecDeque<OsString>) {
    let mut base = PathBuf::new();
    let mut names = VecDeque::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => base.push(component.as_os_str()),
            Component::Normal(name) => names.push_back(name.to_os_string()),
            Component::CurDir | Component::ParentDir => {},
        }
    }
    (base, names)
}

/// Walk `path` the way the kernel would, following symlinks in every
/// ancestor (and in the final component when `follow_last`).
///
/// A missing final component is not an error here; callers decide.
fn locate(state: &State, path: &Path, follow_last: bool) -> VfsResult<PathBuf> {
    let (mut current, mut pending) = split(&normalize_lexically(path));
    if current.as_os_str().is_empty() {
        current.push("/");
    }
    let mut hops = 0usize;

    while let Some(name) = pending.pop_front() {
        let candidate = current.join(&name);
        let is_last = pending.is_empty();

        match state.nodes.get(&candidate) {
            None if is_last => return Ok(candidate),
            None => return Err(VfsError::NotFound(path.to_path_buf())),
            Some(Node::File { .. }) if !is_last => {
                return Err(VfsError::NotADirectory(path.to_path_buf()));
            },
            Some(Node::Symlink(target)) if !is_last || follow_last => {
                hops = hops.saturating_add(1);
                if hops > MAX_LOOKUP_HOPS {
                    return Err(VfsError::Io {
                        op: "lookup",
                        path: path.to_path_buf(),
                        source: io::Error::other("too many levels of symbolic links"),
                    });
                }
                let joined = if target.has_root() {
                    target.clone()
                } else {
                    current.join(target)
                };
                let (base, names) = split(&normalize_lexically(&joined));
                current = base;
                for name in names.into_iter().rev() {
                    pending.push_front(name);
                }
            },
            Some(_) => current = candidate,
        }
    }

    Ok(current)
}

impl Vfs for MemoryVfs {
    fn stat(&self, path: &Path) -> VfsResult<FileInfo> {
        let state = self.state();
        Self::injected(&state, "stat", path)?;
        Self::node_at(&state, path, true).map(|(_, node)| node.info())
    }

    fn lstat(&self, path: &Path) -> VfsResult<FileInfo> {
        let state = self.state();
        Self::injected(&state, "lstat", path)?;
        Self::node_at(&state, path, false).map(|(_, node)| node.info())
    }

    fn read_file_range(&self, path: &Path, offset: u64, limit: u64) -> VfsResult<Vec<u8>> {
        let (real, bytes, count) = {
            let mut state = self.state();
            Self::injected(&state, "read", path)?;
            let (real, node) = Self::node_at(&state, path, true)?;
            let Node::File { content, .. } = node else {
                return Err(VfsError::from_io(
                    "read",
                    path,
                    io::Error::from(io::ErrorKind::IsADirectory),
                ));
            };

            let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
            if size > self.max_file_size {
                return Err(VfsError::TooLarge {
                    path: path.to_path_buf(),
                    size,
                    limit: self.max_file_size,
                });
            }

            let bytes = if offset == 0 && limit == 0 {
                content.clone()
            } else if offset >= size {
                Vec::new()
            } else {
                let start = usize::try_from(offset).unwrap_or(usize::MAX);
                let remaining = size.saturating_sub(offset);
                let wanted = if limit == 0 { remaining } else { remaining.min(limit) };
                let end = start.saturating_add(usize::try_from(wanted).unwrap_or(usize::MAX));
                content.get(start..end).map(<[u8]>::to_vec).unwrap_or_default()
            };

            let counter = state.read_counts.entry(real.clone()).or_insert(0);
            *counter = counter.saturating_add(1);
            let count = *counter;
            (real, bytes, count)
        };

        let replacement = self
            .read_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|hook| hook(&real, count));
        if let Some(content) = replacement {
            self.set_content(&real, content);
        }

        Ok(bytes)
    }

    fn write_file_atomic(&self, path: &Path, content: &[u8], mode: u32) -> VfsResult<()> {
        let mut state = self.state();
        state.write_attempts = state.write_attempts.saturating_add(1);
        Self::injected(&state, "write", path)?;

        let parent = path
            .parent()
            .ok_or_else(|| VfsError::NotADirectory(path.to_path_buf()))?;
        let (parent_real, parent_node) = Self::node_at(&state, parent, true)?;
        if !matches!(parent_node, Node::Dir) {
            return Err(VfsError::NotADirectory(parent.to_path_buf()));
        }

        let target = match path.file_name() {
            Some(name) => parent_real.join(name),
            None => return Err(VfsError::NotADirectory(path.to_path_buf())),
        };

        if state.failing_writes.contains(&normalize_lexically(path))
            || state.failing_writes.contains(&target)
        {
            return Err(VfsError::Io {
                op: "rename",
                path: path.to_path_buf(),
                source: io::Error::other("injected failure before rename"),
            });
        }

        if matches!(state.nodes.get(&target), Some(Node::Dir)) {
            return Err(VfsError::from_io(
                "rename",
                path,
                io::Error::from(io::ErrorKind::IsADirectory),
            ));
        }

        state.nodes.insert(
            target,
            Node::File {
                content: content.to_vec(),
                mode: mode & 0o777,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn ensure_dirs(&self, path: &Path) -> VfsResult<()> {
        let mut state = self.state();
        Self::injected(&state, "mkdir", path)?;

        let (mut current, names) = split(&normalize_lexically(path));
        for name in names {
            let candidate = current.join(&name);
            match state.nodes.get(&candidate) {
                Some(Node::Dir) => current = candidate,
                Some(Node::File { .. }) => return Err(VfsError::NotADirectory(candidate)),
                Some(Node::Symlink(_)) => {
                    let (real, node) = Self::node_at(&state, &candidate, true)?;
                    if !matches!(node, Node::Dir) {
                        return Err(VfsError::NotADirectory(candidate));
                    }
                    current = real;
                },
                None => {
                    state.nodes.insert(candidate.clone(), Node::Dir);
                    current = candidate;
                },
            }
        }
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let state = self.state();
        Self::injected(&state, "readdir", path)?;
        let (real, node) = Self::node_at(&state, path, true)?;
        if !matches!(node, Node::Dir) {
            return Err(VfsError::NotADirectory(path.to_path_buf()));
        }

        let mut entries: Vec<DirEntry> = state
            .nodes
            .iter()
            .filter(|(entry, _)| entry.parent() == Some(real.as_path()))
            .filter_map(|(entry, node)| {
                entry.file_name().map(|name| DirEntry {
                    name: name.to_string_lossy().into_owned(),
                    kind: node.info().kind,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        let state = self.state();
        Self::injected(&state, "readlink", path)?;
        match Self::node_at(&state, path, false)? {
            (_, Node::Symlink(target)) => Ok(target.clone()),
            _ => Err(VfsError::from_io(
                "readlink",
                path,
                io::Error::from(io::ErrorKind::InvalidInput),
            )),
        }
    }

    fn user_home_dir(&self) -> VfsResult<PathBuf> {
        Ok(self.home.clone())
    }

    fn canonicalize(&self, path: &Path) -> VfsResult<PathBuf> {
        let state = self.state();
        Self::injected(&state, "canonicalize", path)?;
        Self::node_at(&state, path, true).map(|(real, _)| real)
    }
}

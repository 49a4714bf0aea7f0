use std::fs::{self, File, Metadata};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{DirEntry, FileInfo, FileKind, Vfs, VfsError, VfsResult};

/// Prefix for temp files created next to an atomic-write target.
const TEMP_PREFIX: &str = ".tmp-";

/// An implementation of [`Vfs`] backed by the physical host filesystem.
#[derive(Debug, Clone)]
pub struct HostVfs {
    max_file_size: u64,
}

impl HostVfs {
    /// Create a new host VFS that refuses to read files above `max_file_size` bytes.
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// The read ceiling in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    fn too_large(&self, path: &Path, size: u64) -> VfsError {
        VfsError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: self.max_file_size,
        }
    }
}

fn file_info(metadata: &Metadata) -> FileInfo {
    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_dir() {
        FileKind::Dir
    } else {
        FileKind::File
    };

    FileInfo {
        kind,
        size: metadata.len(),
        mode: permission_bits(metadata),
        modified: metadata.modified().ok(),
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(unix)]
fn apply_mode(file: &File, path: &Path, mode: u32) -> VfsResult<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o777))
        .map_err(|e| VfsError::from_io("chmod", path, e))
}

#[cfg(not(unix))]
fn apply_mode(file: &File, path: &Path, mode: u32) -> VfsResult<()> {
    let mut permissions = file
        .metadata()
        .map_err(|e| VfsError::from_io("stat", path, e))?
        .permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    file.set_permissions(permissions)
        .map_err(|e| VfsError::from_io("chmod", path, e))
}

impl Vfs for HostVfs {
    fn stat(&self, path: &Path) -> VfsResult<FileInfo> {
        let metadata = fs::metadata(path).map_err(|e| VfsError::from_io("stat", path, e))?;
        Ok(file_info(&metadata))
    }

    fn lstat(&self, path: &Path) -> VfsResult<FileInfo> {
        let metadata =
            fs::symlink_metadata(path).map_err(|e| VfsError::from_io("lstat", path, e))?;
        Ok(file_info(&metadata))
    }

    fn read_file_range(&self, path: &Path, offset: u64, limit: u64) -> VfsResult<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| VfsError::from_io("open", path, e))?;
        let size = file
            .metadata()
            .map_err(|e| VfsError::from_io("stat", path, e))?
            .len();

        if size > self.max_file_size {
            return Err(self.too_large(path, size));
        }

        if offset == 0 && limit == 0 {
            // Bound the read in case the file grows while we are reading it.
            let mut buffer = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
            (&mut file)
                .take(self.max_file_size.saturating_add(1))
                .read_to_end(&mut buffer)
                .map_err(|e| VfsError::from_io("read", path, e))?;
            let read = u64::try_from(buffer.len()).unwrap_or(u64::MAX);
            if read > self.max_file_size {
                return Err(self.too_large(path, read));
            }
            return Ok(buffer);
        }

        if offset >= size {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| VfsError::from_io("seek", path, e))?;

        let remaining = size.saturating_sub(offset);
        let wanted = if limit == 0 {
            remaining
        } else {
            remaining.min(limit)
        };

        let mut buffer = Vec::with_capacity(usize::try_from(wanted).unwrap_or(0));
        file.take(wanted)
            .read_to_end(&mut buffer)
            .map_err(|e| VfsError::from_io("read", path, e))?;
        Ok(buffer)
    }

    fn write_file_atomic(&self, path: &Path, content: &[u8], mode: u32) -> VfsResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| VfsError::NotADirectory(path.to_path_buf()))?;

        // The temp file lives in the target's directory so the final rename
        // never crosses a filesystem boundary. Dropping `tmp` on any early
        // return removes it.
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| VfsError::from_io("create temp", dir, e))?;

        tmp.write_all(content)
            .map_err(|e| VfsError::from_io("write temp", tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| VfsError::from_io("sync temp", tmp.path(), e))?;
        apply_mode(tmp.as_file(), tmp.path(), mode)?;

        tmp.persist(path).map_err(|e| VfsError::Io {
            op: "rename",
            path: path.to_path_buf(),
            source: e.error,
        })?;

        debug!(
            path = %path.display(),
            bytes = content.len(),
            mode = %format_args!("{mode:o}"),
            "Atomically replaced file"
        );
        Ok(())
    }

    fn ensure_dirs(&self, path: &Path) -> VfsResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder
            .create(path)
            .map_err(|e| VfsError::from_io("mkdir", path, e))
    }

    fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| VfsError::from_io("readdir", path, e))? {
            let entry = entry.map_err(|e| VfsError::from_io("readdir", path, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| VfsError::from_io("lstat", entry.path(), e))?;
            let kind = if file_type.is_symlink() {
                FileKind::Symlink
            } else if file_type.is_dir() {
                FileKind::Dir
            } else {
                FileKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_link(&self, path: &Path) -> VfsResult<PathBuf> {
        fs::read_link(path).map_err(|e| VfsError::from_io("readlink", path, e))
    }

    fn user_home_dir(&self) -> VfsResult<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| VfsError::NotFound(PathBuf::from("~")))
    }

    fn canonicalize(&self, path: &Path) -> VfsResult<PathBuf> {
        fs::canonicalize(path).map_err(|e| VfsError::from_io("canonicalize", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vfs() -> HostVfs {
        HostVfs::new(1024)
    }

    #[test]
    fn test_read_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();

        assert_eq!(vfs().read_file_range(&path, 0, 0).unwrap(), b"hello world");
    }

    #[test]
    fn test_read_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello world").unwrap();

        assert_eq!(vfs().read_file_range(&path, 6, 3).unwrap(), b"wor");
        assert_eq!(vfs().read_file_range(&path, 6, 0).unwrap(), b"world");
        assert_eq!(vfs().read_file_range(&path, 0, 5).unwrap(), b"hello");
        assert!(vfs().read_file_range(&path, 11, 4).unwrap().is_empty());
        assert!(vfs().read_file_range(&path, 400, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_too_large() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, "x".repeat(2048)).unwrap();

        let err = vfs().read_file_range(&path, 0, 0).unwrap_err();
        assert!(matches!(err, VfsError::TooLarge { size: 2048, limit: 1024, .. }));

        // The ceiling applies to partial reads too.
        let err = vfs().read_file_range(&path, 0, 10).unwrap_err();
        assert!(matches!(err, VfsError::TooLarge { .. }));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = vfs()
            .read_file_range(&dir.path().join("nope"), 0, 0)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");

        vfs().write_file_atomic(&path, b"first", 0o644).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        vfs().write_file_atomic(&path, b"second", 0o644).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_applies_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.sh");

        vfs().write_file_atomic(&path, b"#!/bin/sh\n", 0o750).unwrap();
        assert_eq!(vfs().stat(&path).unwrap().mode, 0o750);
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the target makes the rename fail.
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "keep").unwrap();

        let err = vfs()
            .write_file_atomic(&target, b"payload", 0o644)
            .unwrap_err();
        assert!(matches!(err, VfsError::Io { op: "rename", .. }));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["occupied".to_string()]);
        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_read_dir_sorted_with_kinds() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();

        let entries = vfs().read_dir(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "a".into(),
                    kind: FileKind::Dir
                },
                DirEntry {
                    name: "b.txt".into(),
                    kind: FileKind::File
                },
            ]
        );

        assert!(matches!(
            vfs().read_dir(&dir.path().join("b.txt")).unwrap_err(),
            VfsError::NotADirectory(_)
        ));
    }

    #[test]
    fn test_ensure_dirs_nested() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("c");

        vfs().ensure_dirs(&nested).unwrap();
        assert!(vfs().stat(&nested).unwrap().is_dir());
        // Idempotent.
        vfs().ensure_dirs(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dirs_through_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(vfs().ensure_dirs(&file.join("sub")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_lstat_reports_symlink() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target.txt");
        let link = dir.path().join("link");
        fs::write(&target, "data").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(vfs().lstat(&link).unwrap().is_symlink());
        assert!(vfs().stat(&link).unwrap().is_file());
        assert_eq!(vfs().read_link(&link).unwrap(), target);
    }

    #[test]
    fn test_canonicalize_resolves_dots() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let canonical_root = fs::canonicalize(dir.path()).unwrap();

        let resolved = vfs()
            .canonicalize(&dir.path().join("sub").join(".."))
            .unwrap();
        assert_eq!(resolved, canonical_root);
    }
}

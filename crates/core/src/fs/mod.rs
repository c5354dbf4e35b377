//! Filesystem abstraction.
//!
//! Every component that touches the project directory or the shared cache
//! goes through [`FileSystem`], so the orchestrator can be exercised against
//! [`MemoryFs`] in tests and [`OsFs`] in production.

mod memory;
mod os;

pub use memory::MemoryFs;
pub use os::OsFs;

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link (only reported by [`FileSystem::symlink_metadata`]).
    Symlink,
}

/// Subset of file metadata the toolset needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Entry kind.
    pub kind: FileKind,
    /// Size in bytes (0 for directories).
    pub len: u64,
    /// Unix permission bits.
    pub mode: u32,
}

impl Metadata {
    /// Whether the entry is a regular file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Whether the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// Whether the entry is a symbolic link.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// Options for [`FileSystem::open_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Create the file if missing.
    pub create: bool,
    /// Truncate an existing file.
    pub truncate: bool,
    /// Append to an existing file.
    pub append: bool,
    /// Permission bits for a newly created file.
    pub mode: Option<u32>,
}

impl OpenOptions {
    /// Options equivalent to `create` + `truncate`.
    #[must_use]
    pub fn write() -> Self {
        Self {
            create: true,
            truncate: true,
            ..Self::default()
        }
    }

    /// Options equivalent to `create` + `append`.
    #[must_use]
    pub fn append() -> Self {
        Self {
            create: true,
            append: true,
            ..Self::default()
        }
    }

    /// Set the mode used when the file is created.
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Entry yielded by [`FileSystem::walk`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Entry metadata (symlinks are not followed).
    pub metadata: Metadata,
}

/// Polymorphic filesystem.
pub trait FileSystem: Debug + Send + Sync {
    /// Metadata, following symlinks.
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Metadata of the entry itself, without following symlinks.
    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Open a file for writing with explicit options.
    fn open_file(&self, path: &Path, options: OpenOptions) -> io::Result<Box<dyn Write + Send>>;

    /// Create a single directory.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Create a directory and all missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a file, a symlink or an empty directory.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Remove a path recursively. Missing paths are not an error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Rename a file or directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Set permission bits.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Create `link` pointing at `original`. A no-op where symlinks are unsupported.
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Target of a symlink.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Direct children of a directory, sorted by path.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create a fresh, uniquely named directory under the system temp dir.
    fn temp_dir(&self, prefix: &str) -> io::Result<PathBuf>;

    /// Current working directory.
    fn current_dir(&self) -> io::Result<PathBuf>;

    /// Home directory of the current user.
    fn home_dir(&self) -> io::Result<PathBuf>;

    /// Create or truncate a file for writing.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        self.open_file(path, OpenOptions::write())
    }

    /// Read an entire file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read an entire file as UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Replace a file's contents.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = self.create(path)?;
        file.write_all(data)?;
        file.flush()
    }

    /// `false` when the path is missing (or unreadable), `true` when it can be stat'ed.
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    /// Walk a tree depth-first in path order, starting with `root` itself.
    fn walk(&self, root: &Path) -> io::Result<Vec<WalkEntry>> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(path) = stack.pop() {
            let metadata = self.symlink_metadata(&path)?;
            if metadata.is_dir() {
                let mut children = self.read_dir(&path)?;
                children.reverse();
                stack.extend(children);
            }
            out.push(WalkEntry { path, metadata });
        }
        Ok(out)
    }
}

/// Lexically clean a path: drop `.` components and resolve `..` against
/// preceding components.
#[must_use]
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Absolute, cleaned form of `path`, joining relative paths onto the current directory.
pub fn abs(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean(path));
    }
    let cwd = fs
        .current_dir()
        .map_err(|e| Error::io(e, None, "resolve current directory"))?;
    Ok(clean(&cwd.join(path)))
}

/// Read and decode a JSON document.
pub fn read_json<T: DeserializeOwned>(fs: &dyn FileSystem, path: &Path) -> Result<T> {
    let data = fs
        .read(path)
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read"))?;
    serde_json::from_slice(&data).map_err(|e| Error::json(e, path))
}

/// Encode a JSON document with two-space indentation and a trailing newline.
pub fn write_json<T: Serialize>(fs: &dyn FileSystem, path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value).map_err(|e| Error::json(e, path))?;
    data.push(b'\n');
    fs.write(path, &data)
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "write"))
}

//! In-memory filesystem for tests.

use super::{FileKind, FileSystem, Metadata, OpenOptions, clean};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mode: u32 },
    Dir { mode: u32 },
    Symlink { target: PathBuf },
}

impl Node {
    fn metadata(&self) -> Metadata {
        match self {
            Self::File { data, mode } => Metadata {
                kind: FileKind::File,
                len: data.len() as u64,
                mode: *mode,
            },
            Self::Dir { mode } => Metadata {
                kind: FileKind::Dir,
                len: 0,
                mode: *mode,
            },
            Self::Symlink { .. } => Metadata {
                kind: FileKind::Symlink,
                len: 0,
                mode: 0o777,
            },
        }
    }
}

type Tree = BTreeMap<PathBuf, Node>;

/// [`FileSystem`] kept entirely in memory.
///
/// Paths are cleaned and resolved against a configurable current directory
/// (default `/`). Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    tree: Arc<RwLock<Tree>>,
    cwd: PathBuf,
    home: PathBuf,
    temp_counter: Arc<AtomicU64>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{}: already exists", path.display()),
    )
}

impl MemoryFs {
    /// Create an empty filesystem containing only `/`.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Tree::new();
        tree.insert(PathBuf::from("/"), Node::Dir { mode: 0o755 });
        Self {
            tree: Arc::new(RwLock::new(tree)),
            cwd: PathBuf::from("/"),
            home: PathBuf::from("/home/user"),
            temp_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use `dir` as the current working directory.
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = clean(&dir.into());
        self
    }

    /// Use `dir` as the home directory.
    #[must_use]
    pub fn with_home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home = clean(&dir.into());
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            clean(path)
        } else {
            clean(&self.cwd.join(path))
        }
    }

    fn read_tree(&self) -> std::sync::RwLockReadGuard<'_, Tree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tree(&self) -> std::sync::RwLockWriteGuard<'_, Tree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follow symlinks until a non-link entry (or a missing path) is reached.
    fn follow(tree: &Tree, path: &Path) -> io::Result<PathBuf> {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_SYMLINK_HOPS {
            match tree.get(&current) {
                Some(Node::Symlink { target }) => {
                    current = if target.is_absolute() {
                        clean(target)
                    } else {
                        let parent = current.parent().unwrap_or_else(|| Path::new("/"));
                        clean(&parent.join(target))
                    };
                }
                _ => return Ok(current),
            }
        }
        Err(io::Error::other(format!(
            "{}: too many levels of symbolic links",
            path.display()
        )))
    }

    fn require_parent_dir(tree: &Tree, path: &Path) -> io::Result<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let parent = Self::follow(tree, parent)?;
        match tree.get(&parent) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(_) => Err(io::Error::other(format!(
                "{}: not a directory",
                parent.display()
            ))),
            None => Err(not_found(&parent)),
        }
    }

    fn has_children(tree: &Tree, dir: &Path) -> bool {
        tree.range(dir.to_path_buf()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(dir))
            .next()
            .is_some()
    }
}

/// Writer that appends to a file node on every write.
struct MemWriter {
    tree: Arc<RwLock<Tree>>,
    path: PathBuf,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        match tree.get_mut(&self.path) {
            Some(Node::File { data, .. }) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(not_found(&self.path)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for MemoryFs {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        let tree = self.read_tree();
        let target = Self::follow(&tree, &self.resolve(path))?;
        tree.get(&target)
            .map(Node::metadata)
            .ok_or_else(|| not_found(path))
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        self.read_tree()
            .get(&self.resolve(path))
            .map(Node::metadata)
            .ok_or_else(|| not_found(path))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let tree = self.read_tree();
        let target = Self::follow(&tree, &self.resolve(path))?;
        match tree.get(&target) {
            Some(Node::File { data, .. }) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(_) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn open_file(&self, path: &Path, options: OpenOptions) -> io::Result<Box<dyn Write + Send>> {
        let mut tree = self.write_tree();
        let target = Self::follow(&tree, &self.resolve(path))?;
        match tree.get_mut(&target) {
            Some(Node::File { data, .. }) => {
                if options.truncate {
                    data.clear();
                }
            }
            Some(_) => {
                return Err(io::Error::other(format!(
                    "{}: is a directory",
                    path.display()
                )));
            }
            None if options.create => {
                Self::require_parent_dir(&tree, &target)?;
                tree.insert(
                    target.clone(),
                    Node::File {
                        data: Vec::new(),
                        mode: options.mode.unwrap_or(0o644),
                    },
                );
            }
            None => return Err(not_found(path)),
        }
        Ok(Box::new(MemWriter {
            tree: Arc::clone(&self.tree),
            path: target,
        }))
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        let path = self.resolve(path);
        let mut tree = self.write_tree();
        if tree.contains_key(&path) {
            return Err(already_exists(&path));
        }
        Self::require_parent_dir(&tree, &path)?;
        tree.insert(path, Node::Dir { mode: 0o755 });
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = self.resolve(path);
        let mut tree = self.write_tree();
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component.as_os_str());
            let resolved = Self::follow(&tree, &current)?;
            match tree.get(&resolved) {
                Some(Node::Dir { .. }) => {}
                Some(_) => {
                    return Err(io::Error::other(format!(
                        "{}: not a directory",
                        current.display()
                    )));
                }
                None => {
                    tree.insert(resolved, Node::Dir { mode: 0o755 });
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let path = self.resolve(path);
        let mut tree = self.write_tree();
        match tree.get(&path) {
            None => Err(not_found(&path)),
            Some(Node::Dir { .. }) if Self::has_children(&tree, &path) => Err(io::Error::other(
                format!("{}: directory not empty", path.display()),
            )),
            Some(_) => {
                tree.remove(&path);
                Ok(())
            }
        }
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let path = self.resolve(path);
        let mut tree = self.write_tree();
        let doomed: Vec<PathBuf> = tree
            .range(path.clone()..)
            .take_while(|(p, _)| p.starts_with(&path))
            .map(|(p, _)| p.clone())
            .collect();
        for p in doomed {
            tree.remove(&p);
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = self.resolve(from);
        let to = self.resolve(to);
        let mut tree = self.write_tree();
        if !tree.contains_key(&from) {
            return Err(not_found(&from));
        }
        Self::require_parent_dir(&tree, &to)?;

        let moved: Vec<(PathBuf, Node)> = tree
            .range(from.clone()..)
            .take_while(|(p, _)| p.starts_with(&from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();

        let stale: Vec<PathBuf> = tree
            .range(to.clone()..)
            .take_while(|(p, _)| p.starts_with(&to))
            .map(|(p, _)| p.clone())
            .collect();
        for p in stale {
            tree.remove(&p);
        }

        for (old, node) in moved {
            tree.remove(&old);
            let suffix = old.strip_prefix(&from).unwrap_or_else(|_| Path::new(""));
            let new = if suffix.as_os_str().is_empty() {
                to.clone()
            } else {
                to.join(suffix)
            };
            tree.insert(new, node);
        }
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut tree = self.write_tree();
        let target = Self::follow(&tree, &self.resolve(path))?;
        match tree.get_mut(&target) {
            Some(Node::File { mode: m, .. } | Node::Dir { mode: m }) => {
                *m = mode;
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        let link = self.resolve(link);
        let mut tree = self.write_tree();
        if tree.contains_key(&link) {
            return Err(already_exists(&link));
        }
        Self::require_parent_dir(&tree, &link)?;
        tree.insert(
            link,
            Node::Symlink {
                target: original.to_path_buf(),
            },
        );
        Ok(())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        match self.read_tree().get(&self.resolve(path)) {
            Some(Node::Symlink { target }) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: not a symlink", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let tree = self.read_tree();
        let dir = Self::follow(&tree, &self.resolve(path))?;
        match tree.get(&dir) {
            Some(Node::Dir { .. }) => {}
            Some(_) => {
                return Err(io::Error::other(format!(
                    "{}: not a directory",
                    path.display()
                )));
            }
            None => return Err(not_found(path)),
        }
        Ok(tree
            .range(dir.clone()..)
            .skip(1)
            .take_while(|(p, _)| p.starts_with(&dir))
            .filter(|(p, _)| p.parent() == Some(dir.as_path()))
            .map(|(p, _)| p.clone())
            .collect())
    }

    fn temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let dir = PathBuf::from("/tmp").join(format!("{prefix}{n}"));
        self.create_dir_all(&dir)?;
        Ok(dir)
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }

    fn home_dir(&self) -> io::Result<PathBuf> {
        Ok(self.home.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_parent() {
        let fs = MemoryFs::new();
        let err = fs.write(Path::new("/a/b.txt"), b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        fs.create_dir_all(Path::new("/a")).unwrap();
        fs.write(Path::new("/a/b.txt"), b"x").unwrap();
        assert!(fs.exists(Path::new("/a/b.txt")));
    }

    #[test]
    fn test_truncate_and_append() {
        let fs = MemoryFs::new();
        let p = Path::new("/f");
        fs.write(p, b"hello").unwrap();
        fs.write(p, b"hi").unwrap();
        assert_eq!(fs.read(p).unwrap(), b"hi");

        let mut w = fs.open_file(p, OpenOptions::append()).unwrap();
        w.write_all(b"!!").unwrap();
        assert_eq!(fs.read_to_string(p).unwrap(), "hi!!");
    }

    #[test]
    fn test_symlink_is_followed() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/cache/bin")).unwrap();
        fs.write(Path::new("/cache/bin/tool"), b"bin").unwrap();
        fs.symlink(Path::new("/cache/bin/tool"), Path::new("/cache/t"))
            .unwrap();

        assert!(fs.metadata(Path::new("/cache/t")).unwrap().is_file());
        assert!(fs
            .symlink_metadata(Path::new("/cache/t"))
            .unwrap()
            .is_symlink());
        assert_eq!(fs.read(Path::new("/cache/t")).unwrap(), b"bin");

        // dangling link: lstat works, stat fails
        fs.remove(Path::new("/cache/bin/tool")).unwrap();
        assert!(!fs.exists(Path::new("/cache/t")));
        assert!(fs.symlink_metadata(Path::new("/cache/t")).is_ok());
    }

    #[test]
    fn test_remove_non_empty_dir_fails() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/d/e")).unwrap();
        assert!(fs.remove(Path::new("/d")).is_err());
        fs.remove_all(Path::new("/d")).unwrap();
        assert!(!fs.exists(Path::new("/d")));
        assert!(!fs.exists(Path::new("/d/e")));
    }

    #[test]
    fn test_remove_all_does_not_touch_siblings_with_common_prefix() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/a/b")).unwrap();
        fs.create_dir_all(Path::new("/a/bc")).unwrap();
        fs.remove_all(Path::new("/a/b")).unwrap();
        assert!(fs.exists(Path::new("/a/bc")));
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/src/x")).unwrap();
        fs.write(Path::new("/src/x/f"), b"1").unwrap();
        fs.rename(Path::new("/src"), Path::new("/dst")).unwrap();
        assert!(!fs.exists(Path::new("/src")));
        assert_eq!(fs.read(Path::new("/dst/x/f")).unwrap(), b"1");
    }

    #[test]
    fn test_read_dir_lists_direct_children() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/c/rtgo__1.22.0/go1.22.0")).unwrap();
        fs.create_dir_all(Path::new("/c/gh")).unwrap();
        fs.write(Path::new("/c/stats.json"), b"{}").unwrap();
        assert_eq!(
            fs.read_dir(Path::new("/c")).unwrap(),
            vec![
                PathBuf::from("/c/gh"),
                PathBuf::from("/c/rtgo__1.22.0"),
                PathBuf::from("/c/stats.json"),
            ]
        );
    }

    #[test]
    fn test_temp_dirs_are_unique() {
        let fs = MemoryFs::new();
        let a = fs.temp_dir("toolset-").unwrap();
        let b = fs.temp_dir("toolset-").unwrap();
        assert_ne!(a, b);
        assert!(fs.metadata(&a).unwrap().is_dir());
    }

    #[test]
    fn test_chmod() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/x"), b"").unwrap();
        fs.chmod(Path::new("/x"), 0o755).unwrap();
        assert_eq!(fs.metadata(Path::new("/x")).unwrap().mode, 0o755);
    }
}

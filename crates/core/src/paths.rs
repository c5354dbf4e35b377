//! Path helpers: cache and spec directory resolution, tilde expansion,
//! compound extension detection and directory sizing.
//!
//! Directory resolution supports environment variable overrides:
//! - `TOOLSET_CACHE_DIR` - Override the shared cache (default `~/.cache/toolset`)
//! - `TOOLSET_SPEC_DIR` - Override the project directory (default `.`)

use crate::fs::FileSystem;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "TOOLSET_CACHE_DIR";

/// Environment variable overriding the spec directory.
pub const SPEC_DIR_ENV: &str = "TOOLSET_SPEC_DIR";

/// Compound extensions recognised by [`ext`], longest first.
const KNOWN_EXTENSIONS: &[&str] = &[".tar.bz2", ".tar.gz", ".tar.xz", ".tgz", ".zip", ".exe"];

/// Get the shared cache directory.
///
/// Resolution order:
/// 1. `TOOLSET_CACHE_DIR` environment variable (tilde-expanded)
/// 2. `~/.cache/toolset`
pub fn cache_dir(fs: &dyn FileSystem) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
        && !dir.is_empty()
    {
        return expand_tilde(fs, Path::new(&dir));
    }

    Ok(home_dir(fs)?.join(".cache").join("toolset"))
}

/// Get the project directory holding `.toolset.json`.
///
/// Resolution order:
/// 1. `TOOLSET_SPEC_DIR` environment variable
/// 2. `.`
pub fn spec_dir(fs: &dyn FileSystem) -> Result<PathBuf> {
    let dir = std::env::var(SPEC_DIR_ENV)
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ".".to_string());
    crate::fs::abs(fs, &expand_tilde(fs, Path::new(&dir))?)
}

fn home_dir(fs: &dyn FileSystem) -> Result<PathBuf> {
    fs.home_dir()
        .map_err(|e| Error::io(e, None, "determine home directory"))
}

/// Replace a leading `~` or `~/` with the home directory.
pub fn expand_tilde(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf> {
    let Some(raw) = path.to_str() else {
        return Ok(path.to_path_buf());
    };
    if raw == "~" {
        return home_dir(fs);
    }
    match raw.strip_prefix("~/") {
        Some(rest) => Ok(home_dir(fs)?.join(rest)),
        None => Ok(path.to_path_buf()),
    }
}

/// Lower-cased extension of `path`, recognising compound archive suffixes.
///
/// Returns one of `.tar.gz`, `.tar.bz2`, `.tar.xz`, `.tgz`, `.zip`, `.exe`
/// or `""`.
#[must_use]
pub fn ext(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    KNOWN_EXTENSIONS
        .iter()
        .find(|e| name.ends_with(*e))
        .copied()
        .unwrap_or("")
}

/// Total size in bytes of regular files beneath `root`.
///
/// A missing root has size zero.
pub fn dir_size(fs: &dyn FileSystem, root: &Path) -> Result<u64> {
    if !fs.exists(root) {
        return Ok(0);
    }
    let entries = fs
        .walk(root)
        .map_err(|e| Error::io(e, Some(root.to_path_buf()), "walk directory"))?;
    Ok(entries
        .iter()
        .filter(|e| e.metadata.is_file())
        .map(|e| e.metadata.len)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_ext() {
        assert_eq!(ext(Path::new("archive.TAR.GZ")), ".tar.gz");
        assert_eq!(ext(Path::new(".hidden.tar.gz")), ".tar.gz");
        assert_eq!(ext(Path::new("/tmp/x/tool_1.0_linux.tar.bz2")), ".tar.bz2");
        assert_eq!(ext(Path::new("tool.tar.xz")), ".tar.xz");
        assert_eq!(ext(Path::new("tool.tgz")), ".tgz");
        assert_eq!(ext(Path::new("tool.Zip")), ".zip");
        assert_eq!(ext(Path::new("tool.exe")), ".exe");
        assert_eq!(ext(Path::new("noext")), "");
        assert_eq!(ext(Path::new("notes.txt")), "");
    }

    #[test]
    fn test_expand_tilde() {
        let fs = MemoryFs::new().with_home_dir("/home/dev");
        assert_eq!(
            expand_tilde(&fs, Path::new("~")).unwrap(),
            PathBuf::from("/home/dev")
        );
        assert_eq!(
            expand_tilde(&fs, Path::new("~/.cache/toolset")).unwrap(),
            PathBuf::from("/home/dev/.cache/toolset")
        );
        assert_eq!(
            expand_tilde(&fs, Path::new("/abs/~x")).unwrap(),
            PathBuf::from("/abs/~x")
        );
        assert_eq!(
            expand_tilde(&fs, Path::new("~other/x")).unwrap(),
            PathBuf::from("~other/x")
        );
    }

    #[test]
    fn test_cache_dir_default() {
        let fs = MemoryFs::new().with_home_dir("/home/dev");
        temp_env::with_var_unset(CACHE_DIR_ENV, || {
            let dir = cache_dir(&fs).unwrap();
            assert_eq!(dir, PathBuf::from("/home/dev/.cache/toolset"));
        });
    }

    #[test]
    fn test_cache_dir_override() {
        let fs = MemoryFs::new().with_home_dir("/home/dev");
        temp_env::with_var(CACHE_DIR_ENV, Some("~/tools"), || {
            let dir = cache_dir(&fs).unwrap();
            assert_eq!(dir, PathBuf::from("/home/dev/tools"));
        });
    }

    #[test]
    fn test_spec_dir() {
        let fs = MemoryFs::new().with_current_dir("/proj");
        temp_env::with_var_unset(SPEC_DIR_ENV, || {
            assert_eq!(spec_dir(&fs).unwrap(), PathBuf::from("/proj"));
        });
        temp_env::with_var(SPEC_DIR_ENV, Some("sub"), || {
            assert_eq!(spec_dir(&fs).unwrap(), PathBuf::from("/proj/sub"));
        });
    }

    #[test]
    fn test_dir_size() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/cache/a/b")).unwrap();
        fs.write(Path::new("/cache/a/x"), b"1234").unwrap();
        fs.write(Path::new("/cache/a/b/y"), b"56").unwrap();
        assert_eq!(dir_size(&fs, Path::new("/cache")).unwrap(), 6);
        assert_eq!(dir_size(&fs, Path::new("/missing")).unwrap(), 0);
    }
}

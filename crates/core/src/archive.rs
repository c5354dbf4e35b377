//! Archive extraction.
//!
//! Dispatches on [`crate::paths::ext`]: `.zip`, `.tar.gz`/`.tgz`, `.tar.bz2`
//! and `.tar.xz`. Extraction works on the real disk because downloaded
//! assets and toolchain tarballs are staged in OS temp directories.

use crate::paths::ext;
use crate::{Error, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

const DIR_MODE: u32 = 0o755;

/// Extract `archive` into `dest`, creating `dest` if needed.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    debug!(archive = %archive.display(), dest = %dest.display(), "Extracting archive");
    create_dir(dest).map_err(|e| Error::archive(archive, e.to_string()))?;

    let file =
        File::open(archive).map_err(|e| Error::io(e, Some(archive.to_path_buf()), "open archive"))?;
    let result = match ext(archive) {
        ".zip" => extract_zip(file, dest),
        ".tar.gz" | ".tgz" => extract_tar(flate2::read::GzDecoder::new(file), dest),
        ".tar.bz2" => extract_tar(bzip2::read::BzDecoder::new(file), dest),
        ".tar.xz" => extract_tar(xz2::read::XzDecoder::new(file), dest),
        _ => return Err(Error::unsupported_archive(archive)),
    };
    result.map_err(|e| Error::archive(archive, e.to_string()))
}

fn extract_zip(file: File, dest: &Path) -> io::Result<()> {
    let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;
        let Some(rel) = entry.enclosed_name() else {
            trace!(name = entry.name(), "Skipping unsafe zip entry");
            continue;
        };
        let out = dest.join(rel);

        if entry.is_dir() {
            create_dir(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            create_dir(parent)?;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        std::fs::write(&out, &content)?;
        set_mode(&out, entry.unix_mode().unwrap_or(0o644))?;
    }
    Ok(())
}

fn extract_tar<R: Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if !(kind.is_file() || kind.is_dir()) {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(rel) = enclosed(&path) else {
            trace!(path = %path.display(), "Skipping unsafe tar entry");
            continue;
        };
        let out = dest.join(rel);

        if kind.is_dir() {
            create_dir(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            create_dir(parent)?;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        std::fs::write(&out, &content)?;
        set_mode(&out, entry.header().mode().unwrap_or(0o644))?;
    }
    Ok(())
}

/// Relative form of `path` if it stays below the extraction root.
fn enclosed(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

fn create_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(path)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(path)
    }
}

fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_bytes(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append(&header, &content[..]).unwrap();
        }

        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_path("tool/link").unwrap();
        link.set_link_name("bin").unwrap();
        link.set_size(0);
        link.set_cksum();
        builder.append(&link, io::empty()).unwrap();

        builder.into_inner().unwrap()
    }

    fn tar_gz(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(&tar_bytes(&[("tool/bin", b"#!/bin/sh\n", 0o755)]))
            .unwrap();
        enc.finish().unwrap();
        path
    }

    #[test]
    fn test_extract_tar_gz() {
        let tmp = TempDir::new().unwrap();
        let archive = tar_gz(tmp.path(), "tool_1.0_linux_amd64.TAR.GZ");
        let dest = tmp.path().join("out");

        extract(&archive, &dest).unwrap();
        let bin = dest.join("tool/bin");
        assert_eq!(std::fs::read(&bin).unwrap(), b"#!/bin/sh\n");
        assert!(!dest.join("tool/link").exists(), "symlinks are skipped");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&bin).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_extract_tar_bz2_and_xz() {
        let tmp = TempDir::new().unwrap();
        let data = tar_bytes(&[("a/x", b"x", 0o644)]);

        let bz = tmp.path().join("a.tar.bz2");
        let mut enc =
            bzip2::write::BzEncoder::new(File::create(&bz).unwrap(), bzip2::Compression::default());
        enc.write_all(&data).unwrap();
        enc.finish().unwrap();

        let xz = tmp.path().join("a.tar.xz");
        let mut enc = xz2::write::XzEncoder::new(File::create(&xz).unwrap(), 6);
        enc.write_all(&data).unwrap();
        enc.finish().unwrap();

        for archive in [bz, xz] {
            let dest = tmp.path().join(format!("out-{}", ext(&archive)));
            extract(&archive, &dest).unwrap();
            assert_eq!(std::fs::read(dest.join("a/x")).unwrap(), b"x");
        }
    }

    #[test]
    fn test_extract_zip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("tool.zip");
        let mut zw = zip::ZipWriter::new(File::create(&archive).unwrap());
        let opts = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        zw.add_directory("tool/", opts).unwrap();
        zw.start_file("tool/tool.exe", opts).unwrap();
        zw.write_all(b"MZ").unwrap();
        zw.finish().unwrap();

        let dest = tmp.path().join("out");
        extract(&archive, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("tool/tool.exe")).unwrap(), b"MZ");
    }

    #[test]
    fn test_unsupported_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("tool.rar");
        std::fs::write(&archive, b"rar").unwrap();
        assert!(matches!(
            extract(&archive, &tmp.path().join("out")),
            Err(Error::UnsupportedArchive { .. })
        ));
    }

    #[test]
    fn test_enclosed_rejects_escape() {
        assert_eq!(enclosed(Path::new("./a/b")), Some(PathBuf::from("a/b")));
        assert_eq!(enclosed(Path::new("../etc/passwd")), None);
        assert_eq!(enclosed(Path::new("/etc/passwd")), None);
    }
}

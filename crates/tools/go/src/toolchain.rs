//! Go toolchain discovery and installation.
//!
//! Two kinds of toolchain are recognised:
//!
//! - the global `go` found on `PATH`, keyed `go`;
//! - local toolchains under `<cache>/rtgo__<ver>/go<ver>`, keyed `go@<ver>`,
//!   each with a private build cache at `<cache>/rtgo__<ver>/gocache`.
//!
//! A local directory whose `go` binary is missing is left over from an
//! interrupted install and is removed during discovery.

use crate::exec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use toolset_core::fs::FileSystem;
use toolset_core::runtime::{Arch, Os, Platform, executable_name};
use toolset_core::{Error, Result, ResultExt, archive, http};
use tracing::{debug, info, warn};

/// Directory prefix of local toolchains inside the cache.
pub const LOCAL_PREFIX: &str = "rtgo__";

/// Release index listing every published toolchain.
pub const DOWNLOAD_INDEX: &str = "https://go.dev/dl/?mode=json";

/// Base URL of toolchain archives.
pub const DOWNLOAD_BASE: &str = "https://go.dev/dl";

/// A usable Go toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Registry key: `go` or `go@<ver>`.
    pub key: String,
    /// Path of the `go` binary.
    pub go_bin: PathBuf,
    /// Toolchain version without the `go` prefix, e.g. `1.23.4`.
    pub version: String,
    /// Private `GOCACHE`, for local toolchains.
    pub build_cache: Option<PathBuf>,
}

impl Toolchain {
    /// The toolchain found on `PATH`.
    #[must_use]
    pub fn global(go_bin: PathBuf, version: impl Into<String>) -> Self {
        Self {
            key: "go".to_string(),
            go_bin,
            version: version.into(),
            build_cache: None,
        }
    }

    /// A toolchain installed under `cache_dir`.
    #[must_use]
    pub fn local(cache_dir: &Path, version: &str) -> Self {
        Self {
            key: format!("go@{version}"),
            go_bin: local_go_bin(cache_dir, version),
            version: version.to_string(),
            build_cache: Some(local_root(cache_dir, version).join("gocache")),
        }
    }
}

/// `<cache>/rtgo__<ver>`
#[must_use]
pub fn local_root(cache_dir: &Path, version: &str) -> PathBuf {
    cache_dir.join(format!("{LOCAL_PREFIX}{version}"))
}

/// `<cache>/rtgo__<ver>/go<ver>/bin/go`
#[must_use]
pub fn local_go_bin(cache_dir: &Path, version: &str) -> PathBuf {
    local_root(cache_dir, version)
        .join(format!("go{version}"))
        .join("bin")
        .join(executable_name("go"))
}

/// Find the global toolchain and every local one.
pub async fn discover(
    fs: &dyn FileSystem,
    cache_dir: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<Toolchain>> {
    let mut found = Vec::new();
    if let Ok(bin) = which::which("go") {
        match exec::go(&bin, &["env", "GOVERSION"], None, &[], cancel).await {
            Ok(version) => {
                let version = version.trim_start_matches("go").to_string();
                debug!(bin = %bin.display(), %version, "Found global Go toolchain");
                found.push(Toolchain::global(bin, version));
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => warn!(bin = %bin.display(), error = %e, "Ignoring unusable global Go toolchain"),
        }
    }
    found.extend(discover_local(fs, cache_dir)?);
    Ok(found)
}

/// Local toolchains under `cache_dir`, removing directories missing their binary.
pub fn discover_local(fs: &dyn FileSystem, cache_dir: &Path) -> Result<Vec<Toolchain>> {
    if !fs.exists(cache_dir) {
        return Ok(Vec::new());
    }
    let entries = fs
        .read_dir(cache_dir)
        .map_err(|e| Error::io(e, Some(cache_dir.to_path_buf()), "list cache"))?;

    let mut found = Vec::new();
    for entry in entries {
        let Some(version) = entry
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(LOCAL_PREFIX))
            .filter(|v| !v.is_empty())
        else {
            continue;
        };

        let toolchain = Toolchain::local(cache_dir, version);
        if fs.exists(&toolchain.go_bin) {
            debug!(key = %toolchain.key, "Found local Go toolchain");
            found.push(toolchain);
        } else {
            warn!(dir = %entry.display(), "Removing incomplete Go toolchain");
            fs.remove_all(&entry)
                .map_err(|e| Error::io(e, Some(entry.clone()), "remove incomplete toolchain"))?;
        }
    }
    Ok(found)
}

#[derive(Debug, Deserialize)]
struct Release {
    version: String,
    #[serde(default)]
    stable: bool,
}

/// Newest stable `M.N.P` matching `requested` (`M.N`) in the release index.
fn pick_version(releases: &[Release], requested: &str) -> Result<String> {
    let prefix = format!("go{requested}.");
    releases
        .iter()
        .filter(|r| r.stable && r.version.starts_with(&prefix))
        .filter_map(|r| {
            let v = r.version.trim_start_matches("go");
            semver::Version::parse(v).ok().map(|sv| (sv, v))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| Error::UnsupportedRuntime(format!("go@{requested}")))
}

/// Settings for fetching toolchains.
#[derive(Debug, Clone)]
pub struct ToolchainSource {
    /// Release index URL.
    pub index_url: String,
    /// Archive base URL.
    pub download_base: String,
}

impl Default for ToolchainSource {
    fn default() -> Self {
        Self {
            index_url: DOWNLOAD_INDEX.to_string(),
            download_base: DOWNLOAD_BASE.to_string(),
        }
    }
}

impl ToolchainSource {
    /// Complete a partial `M.N` into the newest stable `M.N.P`. A full
    /// version is returned unchanged.
    pub async fn resolve_version(&self, requested: &str, cancel: &CancellationToken) -> Result<String> {
        if semver::Version::parse(requested).is_ok() {
            return Ok(requested.to_string());
        }
        let client = http::api_client()?;
        let body = http::get_bytes(client.get(&self.index_url), &self.index_url, cancel).await?;
        let releases: Vec<Release> = serde_json::from_slice(&body)
            .map_err(|e| Error::network(&self.index_url, format!("invalid release index: {e}")))?;
        pick_version(&releases, requested)
    }

    /// Install toolchain `requested` under `cache_dir` and return it.
    ///
    /// The archive is unpacked into a staging directory inside the cache and
    /// renamed into place, so a toolchain is only visible once complete.
    pub async fn install(
        &self,
        fs: &dyn FileSystem,
        cache_dir: &Path,
        requested: &str,
        cancel: &CancellationToken,
    ) -> Result<Toolchain> {
        let version = self.resolve_version(requested, cancel).await?;
        let toolchain = Toolchain::local(cache_dir, &version);
        if fs.exists(&toolchain.go_bin) {
            debug!(key = %toolchain.key, "Go toolchain already installed");
            return Ok(toolchain);
        }

        let platform = Platform::current()?;
        let file = archive_name(&version, platform);
        let url = format!("{}/{file}", self.download_base.trim_end_matches('/'));
        info!(%version, %url, "Installing Go toolchain");

        std::fs::create_dir_all(cache_dir)
            .map_err(|e| Error::io(e, Some(cache_dir.to_path_buf()), "create cache"))?;
        let staging = tempfile::Builder::new()
            .prefix(".rtgo-staging-")
            .tempdir_in(cache_dir)
            .map_err(|e| Error::io(e, Some(cache_dir.to_path_buf()), "create staging directory"))?;

        let download = staging.path().join(&file);
        let client = http::download_client()?;
        http::download(client.get(&url), &url, &download, cancel).await?;

        let unpacked = staging.path().join("unpacked");
        let (src, dst) = (download.clone(), unpacked.clone());
        tokio::task::spawn_blocking(move || archive::extract(&src, &dst))
            .await
            .map_err(|e| Error::archive(&download, e.to_string()))??;

        let root = local_root(cache_dir, &version);
        let target = root.join(format!("go{version}"));
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::io(e, Some(root.clone()), "create toolchain directory"))?;
        std::fs::rename(unpacked.join("go"), &target)
            .map_err(|e| Error::io(e, Some(target.clone()), "move toolchain into place"))
            .with_context(|| format!("install go@{version}"))?;
        if let Some(build_cache) = &toolchain.build_cache {
            std::fs::create_dir_all(build_cache)
                .map_err(|e| Error::io(e, Some(build_cache.clone()), "create build cache"))?;
        }

        info!(key = %toolchain.key, "Installed Go toolchain");
        Ok(toolchain)
    }
}

/// Official archive name, e.g. `go1.23.4.linux-amd64.tar.gz`.
#[must_use]
pub fn archive_name(version: &str, platform: Platform) -> String {
    let arch = match platform.arch {
        Arch::Arm => "armv6l".to_string(),
        other => other.to_string(),
    };
    let ext = if platform.os == Os::Windows { "zip" } else { "tar.gz" };
    format!("go{version}.{}-{arch}.{ext}", platform.os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolset_core::fs::MemoryFs;

    fn release(version: &str, stable: bool) -> Release {
        Release {
            version: version.into(),
            stable,
        }
    }

    #[test]
    fn test_pick_version() {
        let releases = vec![
            release("go1.24rc1", false),
            release("go1.23.4", true),
            release("go1.23.10", true),
            release("go1.23.11rc1", false),
            release("go1.2.2", true),
        ];
        assert_eq!(pick_version(&releases, "1.23").unwrap(), "1.23.10");
        assert_eq!(pick_version(&releases, "1.2").unwrap(), "1.2.2");
        assert!(matches!(
            pick_version(&releases, "1.99"),
            Err(Error::UnsupportedRuntime(_))
        ));
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(
            archive_name("1.23.4", Platform::new(Os::Linux, Arch::Amd64)),
            "go1.23.4.linux-amd64.tar.gz"
        );
        assert_eq!(
            archive_name("1.23.4", Platform::new(Os::Windows, Arch::Arm64)),
            "go1.23.4.windows-arm64.zip"
        );
        assert_eq!(
            archive_name("1.23.4", Platform::new(Os::Linux, Arch::Arm)),
            "go1.23.4.linux-armv6l.tar.gz"
        );
    }

    #[test]
    fn test_discover_local_collects_garbage() {
        let fs = MemoryFs::new();
        let cache = Path::new("/cache");
        let good = Toolchain::local(cache, "1.23.4");
        fs.create_dir_all(good.go_bin.parent().unwrap()).unwrap();
        fs.write(&good.go_bin, b"go").unwrap();
        fs.create_dir_all(&cache.join("rtgo__1.22.0/go1.22.0")).unwrap();
        fs.create_dir_all(&cache.join("go1.23.4")).unwrap();

        let found = discover_local(&fs, cache).unwrap();
        assert_eq!(found, vec![good]);
        assert!(!fs.exists(&cache.join("rtgo__1.22.0")));
        assert!(fs.exists(&cache.join("go1.23.4")));
    }

    #[test]
    fn test_local_layout() {
        let t = Toolchain::local(Path::new("/cache"), "1.23.4");
        assert_eq!(t.key, "go@1.23.4");
        assert_eq!(
            t.build_cache.as_deref(),
            Some(Path::new("/cache/rtgo__1.23.4/gocache"))
        );
        assert!(t.go_bin.starts_with("/cache/rtgo__1.23.4/go1.23.4/bin"));
    }
}

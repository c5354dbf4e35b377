//! GitHub Releases runtime for toolset.
//!
//! Installs prebuilt binaries published as GitHub release assets. Modules are
//! written `<owner>/<repo>@<semver>`; the asset for the host is discovered by
//! name, downloaded, unpacked and the binary named after the repository is
//! moved to `<cache>/gh/<owner>/<repo>@<ver>/<repo>`.

use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::{FileSystem, OsFs};
use toolset_core::runtime::{ModuleInfo, Platform, executable_name, run_binary};
use toolset_core::version::ModVer;
use toolset_core::{Error, Result, ResultExt, archive, env, http};
use tracing::{debug, info};

/// Registry key of this runtime.
pub const RUNTIME_KEY: &str = "gh";

/// Default REST API base.
pub const DEFAULT_API: &str = "https://api.github.com";

/// Token variables, in order of precedence.
pub const TOKEN_VARS: &[&str] = &["TOOLSET_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// GitHub release metadata from the API.
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

/// GitHub release asset.
#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

/// A parsed `<owner>/<repo>@<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    /// Repository owner.
    pub owner: String,
    /// Repository name, also the binary name.
    pub name: String,
    /// Release tag, e.g. `v2.62.0`.
    pub version: String,
}

impl Repo {
    /// Parse a module string. The version must be a semantic version,
    /// optionally prefixed with `v`.
    pub fn parse(module: &str) -> Result<Self> {
        let mod_ver = ModVer::parse(module)?;
        let (owner, name) = match mod_ver.name().split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                ((*owner).to_string(), (*name).to_string())
            }
            _ => return Err(Error::invalid_format(module, "expected <owner>/<repo>@<version>")),
        };

        let version = mod_ver.version();
        if mod_ver.is_latest() || semver::Version::parse(version.trim_start_matches('v')).is_err() {
            return Err(Error::non_semver(version));
        }
        Ok(Self {
            owner,
            name,
            version,
        })
    }

    /// Canonical module string.
    #[must_use]
    pub fn module(&self) -> String {
        format!("{}/{}@{}", self.owner, self.name, self.version)
    }

    fn mod_ver(&self) -> Result<ModVer> {
        ModVer::new(format!("{}/{}", self.owner, self.name), &self.version)
    }
}

/// Regex matching release assets built for `platform`.
pub fn asset_pattern(repo: &Repo, platform: Platform) -> Result<Regex> {
    let arch = platform
        .arch
        .alternates()
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?i)^{}[-_]?v?{}[-_]?{}[-_]?({arch})(\.tar\.gz|\.zip|\.tgz|\.tar\.xz|\.tar\.bz2)$",
        regex::escape(&repo.name),
        regex::escape(repo.version.trim_start_matches('v')),
        regex::escape(&platform.os.to_string()),
    );
    Regex::new(&pattern).map_err(|e| Error::invalid_format(pattern, e.to_string()))
}

/// API location and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    /// REST API base URL.
    pub api_base: String,
    /// Bearer token.
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API.to_string(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Default API with the token from `TOOLSET_GITHUB_TOKEN` or `GITHUB_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            token: env::first_set(TOKEN_VARS),
            ..Self::default()
        }
    }
}

/// Installs and runs binaries from GitHub releases.
#[derive(Debug, Clone)]
pub struct GitHubRuntime {
    fs: Arc<dyn FileSystem>,
    cache_dir: PathBuf,
    config: GitHubConfig,
    platform: Option<Platform>,
    api: Client,
    downloads: Client,
    cancel: CancellationToken,
}

impl GitHubRuntime {
    /// Create the runtime installing under `<cache_dir>/gh`.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cache_dir: impl Into<PathBuf>,
        config: GitHubConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            fs,
            cache_dir: cache_dir.into(),
            config,
            platform: None,
            api: http::api_client()?,
            downloads: http::download_client()?,
            cancel,
        })
    }

    /// Pick assets for `platform` instead of the host.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Registry key.
    #[must_use]
    pub fn version(&self) -> &'static str {
        RUNTIME_KEY
    }

    fn platform(&self) -> Result<Platform> {
        self.platform.map_or_else(Platform::current, Ok)
    }

    fn bin_dir(&self, repo: &Repo) -> PathBuf {
        self.cache_dir
            .join("gh")
            .join(&repo.owner)
            .join(format!("{}@{}", repo.name, repo.version))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn api_get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.config.api_base.trim_end_matches('/'));
        debug!(%url, "Querying GitHub API");
        let request = self
            .authorized(self.api.get(&url))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        let body = http::get_bytes(request, &url, &self.cancel).await?;
        serde_json::from_slice(&body).map_err(|e| Error::network(&url, format!("invalid response: {e}")))
    }

    async fn release(&self, repo: &Repo) -> Result<Release> {
        self.api_get(&format!(
            "/repos/{}/{}/releases/tags/{}",
            repo.owner, repo.name, repo.version
        ))
        .await
    }

    /// Validate `module` and confirm the release exists.
    pub async fn parse(&self, module: &str) -> Result<String> {
        let repo = Repo::parse(module)?;
        self.release(&repo)
            .await
            .with_context(|| format!("look up release {}", repo.module()))?;
        Ok(repo.module())
    }

    /// Local view of `module`.
    pub fn get_module(&self, module: &str) -> Result<ModuleInfo> {
        let repo = Repo::parse(module)?;
        Ok(ModuleInfo::probe(
            self.fs.as_ref(),
            repo.name.clone(),
            repo.mod_ver()?,
            self.bin_dir(&repo),
            false,
        ))
    }

    /// Download, unpack and place the binary unless it is already present.
    pub async fn install(&self, module: &str) -> Result<()> {
        let info = self.get_module(module)?;
        if info.is_installed {
            debug!(%module, "Already installed");
            return Ok(());
        }
        let repo = Repo::parse(module)?;
        let platform = self.platform()?;

        let release = self.release(&repo).await?;
        let pattern = asset_pattern(&repo, platform)?;
        let asset = release
            .assets
            .iter()
            .find(|a| pattern.is_match(&a.name))
            .ok_or_else(|| {
                let available: Vec<_> = release.assets.iter().map(|a| a.name.as_str()).collect();
                debug!(?available, %platform, "No matching asset");
                Error::UnsupportedPlatform {
                    os: platform.os.to_string(),
                    arch: platform.arch.to_string(),
                }
            })?;
        info!(%module, asset = %asset.name, tag = %release.tag_name, "Installing GitHub release");

        // Download and extraction need a real disk; only the final binary
        // goes through the runtime's filesystem.
        let staging = tempfile::Builder::new()
            .prefix("toolset-gh-")
            .tempdir()
            .map_err(|e| Error::io(e, None, "create staging directory"))?;

        let download = staging.path().join(&asset.name);
        let request = self.authorized(self.downloads.get(&asset.browser_download_url));
        http::download(request, &asset.browser_download_url, &download, &self.cancel).await?;

        let unpacked = staging.path().join("unpacked");
        let (src, dst) = (download.clone(), unpacked.clone());
        tokio::task::spawn_blocking(move || archive::extract(&src, &dst))
            .await
            .map_err(|e| Error::archive(&download, e.to_string()))??;

        let binary = find_binary(&unpacked, &executable_name(&repo.name))?;
        let data = OsFs::new()
            .read(&binary)
            .map_err(|e| Error::io(e, Some(binary.clone()), "read unpacked binary"))?;
        self.place_binary(&info.bin_dir, &info.bin_path, &data)
    }

    /// Write `data` to `bin_path` through a sibling partial file.
    fn place_binary(&self, bin_dir: &Path, bin_path: &Path, data: &[u8]) -> Result<()> {
        self.fs
            .create_dir_all(bin_dir)
            .map_err(|e| Error::io(e, Some(bin_dir.to_path_buf()), "create tool directory"))?;
        let partial = bin_path.with_extension("partial");
        self.fs
            .write(&partial, data)
            .map_err(|e| Error::io(e, Some(partial.clone()), "write binary"))?;
        self.fs
            .chmod(&partial, 0o755)
            .map_err(|e| Error::io(e, Some(partial.clone()), "make binary executable"))?;
        self.fs
            .rename(&partial, bin_path)
            .map_err(|e| Error::io(e, Some(bin_path.to_path_buf()), "move binary into place"))
    }

    /// Run the installed binary.
    pub async fn run(&self, module: &str, args: &[String]) -> Result<()> {
        let info = self.get_module(module)?;
        if !info.is_installed {
            return Err(Error::ToolNotInstalled(info.mod_ver.to_string()));
        }
        run_binary(&info.bin_path, args, &[], &self.cancel).await
    }

    /// Newest release tag, when it is a semantic version.
    ///
    /// A latest release with a non-semver tag leaves the module unchanged.
    pub async fn get_latest(&self, module: &str) -> Result<(String, bool)> {
        let repo = Repo::parse(module)?;
        let latest: Release = self
            .api_get(&format!("/repos/{}/{}/releases/latest", repo.owner, repo.name))
            .await?;
        if semver::Version::parse(latest.tag_name.trim_start_matches('v')).is_err() {
            debug!(%module, tag = %latest.tag_name, "Latest release is not semver");
            return Ok((repo.module(), false));
        }
        let changed = latest.tag_name != repo.version;
        let upgraded = Repo {
            version: latest.tag_name,
            ..repo
        };
        Ok((upgraded.module(), changed))
    }

    /// Delete the tool's directory.
    pub fn remove(&self, module: &str) -> Result<()> {
        let info = self.get_module(module)?;
        if !info.is_installed {
            return Err(Error::ToolNotInstalled(info.mod_ver.to_string()));
        }
        info!(%module, dir = %info.bin_dir.display(), "Removing GitHub release");
        self.fs
            .remove_all(&info.bin_dir)
            .map_err(|e| Error::io(e, Some(info.bin_dir.clone()), "remove tool"))
    }
}

/// Locate `binary` in an unpacked archive.
///
/// When extraction produced a single top-level directory the search starts
/// inside it; the first match in depth-first path order wins.
fn find_binary(unpacked: &Path, binary: &str) -> Result<PathBuf> {
    let fs = OsFs::new();
    let entries = fs
        .read_dir(unpacked)
        .map_err(|e| Error::io(e, Some(unpacked.to_path_buf()), "list unpacked archive"))?;
    let root = match entries.as_slice() {
        [only] if fs.metadata(only).is_ok_and(|m| m.is_dir()) => only.clone(),
        _ => unpacked.to_path_buf(),
    };

    let direct = root.join(binary);
    if fs.metadata(&direct).is_ok_and(|m| m.is_file()) {
        return Ok(direct);
    }
    fs.walk(&root)
        .map_err(|e| Error::io(e, Some(root.clone()), "search unpacked archive"))?
        .into_iter()
        .find(|e| e.metadata.is_file() && e.path.file_name().is_some_and(|n| n == binary))
        .map(|e| e.path)
        .ok_or_else(|| Error::archive(unpacked, format!("binary '{binary}' not found in archive")))
}

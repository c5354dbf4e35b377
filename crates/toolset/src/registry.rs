//! Runtime registry.
//!
//! The [`RuntimeRegistry`] maps runtime keys (`go`, `go@1.23.4`, `gh`) to
//! installers. It is rebuilt from the cache by [`RuntimeRegistry::discover`]
//! and can install a missing Go toolchain on demand.

use crate::runtime::Runtime;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::FileSystem;
use toolset_core::{Error, Result, ResultExt};
use toolset_tools_github::{GitHubConfig, GitHubRuntime};
use toolset_tools_go::{GoConfig, GoRuntime, ToolchainSource, toolchain};
use tracing::{debug, info};

/// Prefix of keys that name a specific Go toolchain.
pub const GO_TOOLCHAIN_PREFIX: &str = "go@";

/// Registry of available runtimes keyed by [`Runtime::version`].
#[derive(Debug)]
pub struct RuntimeRegistry {
    fs: Arc<dyn FileSystem>,
    cache_dir: PathBuf,
    go: GoConfig,
    github: GitHubConfig,
    toolchains: ToolchainSource,
    cancel: CancellationToken,
    runtimes: BTreeMap<String, Arc<Runtime>>,
    /// Requested keys that resolved to a different installed key, e.g.
    /// `go@1.23` to `go@1.23.10`.
    aliases: BTreeMap<String, String>,
}

impl RuntimeRegistry {
    /// Create an empty registry; call [`discover`](Self::discover) to populate it.
    #[must_use]
    pub fn new(
        fs: Arc<dyn FileSystem>,
        cache_dir: impl Into<PathBuf>,
        go: GoConfig,
        github: GitHubConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fs,
            cache_dir: cache_dir.into(),
            go,
            github,
            toolchains: ToolchainSource::default(),
            cancel,
            runtimes: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Fetch toolchains from `source` instead of go.dev.
    #[must_use]
    pub fn with_toolchain_source(mut self, source: ToolchainSource) -> Self {
        self.toolchains = source;
        self
    }

    /// Shared cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Rebuild the registry from the toolchains found on `PATH` and in the cache.
    pub async fn discover(&mut self) -> Result<()> {
        let mut runtimes = BTreeMap::new();

        let found = toolchain::discover(self.fs.as_ref(), &self.cache_dir, &self.cancel)
            .await
            .context("discover Go toolchains")?;
        for tc in found {
            let rt = GoRuntime::new(
                Arc::clone(&self.fs),
                tc,
                self.cache_dir.clone(),
                &self.go,
                self.cancel.clone(),
            )?;
            runtimes.insert(rt.version().to_string(), Arc::new(Runtime::Go(rt)));
        }

        let gh = GitHubRuntime::new(
            Arc::clone(&self.fs),
            self.cache_dir.clone(),
            self.github.clone(),
            self.cancel.clone(),
        )?;
        runtimes.insert(gh.version().to_string(), Arc::new(Runtime::GitHub(gh)));

        debug!(runtimes = ?runtimes.keys().collect::<Vec<_>>(), "Discovered runtimes");
        self.runtimes = runtimes;
        self.aliases.retain(|_, target| self.runtimes.contains_key(target));
        Ok(())
    }

    /// Look up a runtime by key.
    pub fn get(&self, key: &str) -> Result<Arc<Runtime>> {
        let key = self.aliases.get(key).map_or(key, String::as_str);
        self.runtimes
            .get(key)
            .cloned()
            .ok_or_else(|| Error::RuntimeNotFound(key.to_string()))
    }

    /// Look up a runtime, installing a missing `go@<ver>` toolchain first.
    pub async fn get_install(&mut self, key: &str) -> Result<Arc<Runtime>> {
        if let Ok(rt) = self.get(key) {
            return Ok(rt);
        }
        let Some(version) = key.strip_prefix(GO_TOOLCHAIN_PREFIX) else {
            return Err(Error::UnsupportedRuntime(key.to_string()));
        };

        info!(runtime = %key, "Installing missing runtime");
        let installed = self
            .toolchains
            .install(self.fs.as_ref(), &self.cache_dir, version, &self.cancel)
            .await
            .with_context(|| format!("install runtime {key}"))?;
        self.discover().await?;
        if installed.key != key {
            self.aliases.insert(key.to_string(), installed.key);
        }
        self.get(key)
    }

    /// Sorted runtime keys.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.runtimes.keys().cloned().collect()
    }

    /// Register `runtime` under its own key, replacing any previous entry.
    pub fn insert(&mut self, runtime: Runtime) {
        self.runtimes
            .insert(runtime.version().to_string(), Arc::new(runtime));
    }
}

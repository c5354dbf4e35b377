//! Resolved configuration for one invocation.

use crate::registry::RuntimeRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::{self, FileSystem};
use toolset_core::{Result, paths};
use toolset_tools_github::GitHubConfig;
use toolset_tools_go::GoConfig;

/// Directories and runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Shared cache holding tools, toolchains and stats.
    pub cache_dir: PathBuf,
    /// Project directory holding the spec and lock.
    pub spec_dir: PathBuf,
    /// Go proxy and privacy settings.
    pub go: GoConfig,
    /// GitHub API settings.
    pub github: GitHubConfig,
}

impl Settings {
    /// Resolve settings, preferring explicit directories over the
    /// `TOOLSET_CACHE_DIR` / `TOOLSET_SPEC_DIR` defaults.
    pub fn resolve(
        fs: &dyn FileSystem,
        cache_dir: Option<&Path>,
        spec_dir: Option<&Path>,
    ) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => fs::abs(fs, &paths::expand_tilde(fs, dir)?)?,
            None => fs::abs(fs, &paths::cache_dir(fs)?)?,
        };
        let spec_dir = match spec_dir {
            Some(dir) => fs::abs(fs, &paths::expand_tilde(fs, dir)?)?,
            None => paths::spec_dir(fs)?,
        };
        Ok(Self {
            cache_dir,
            spec_dir,
            go: GoConfig::from_env(),
            github: GitHubConfig::from_env(),
        })
    }

    /// An empty registry wired to these settings.
    #[must_use]
    pub fn registry(&self, fs: Arc<dyn FileSystem>, cancel: CancellationToken) -> RuntimeRegistry {
        RuntimeRegistry::new(
            fs,
            self.cache_dir.clone(),
            self.go.clone(),
            self.github.clone(),
            cancel,
        )
    }
}

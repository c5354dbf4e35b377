//! The workdir orchestrator.
//!
//! A [`Workdir`] owns the loaded spec, lock and usage stats of one project
//! and is their only writer. Every mutation of the spec rebuilds the lock
//! and persists both documents before returning.

mod sync;

use crate::registry::RuntimeRegistry;
use crate::runtime::Runtime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::FileSystem;
use toolset_core::remote::RemoteFetcher;
use toolset_core::runtime::ModuleInfo;
use toolset_core::spec::{self, Include, Lock, Spec, Tool};
use toolset_core::stats::Stats;
use toolset_core::{Error, Result, ResultExt, VERSION, paths};
use tracing::{debug, info};

pub use sync::Upgrade;

/// Environment variables reported by [`Workdir::system_info`].
pub const REPORTED_ENV: &[&str] = &[
    paths::CACHE_DIR_ENV,
    paths::SPEC_DIR_ENV,
    "GOPROXY",
    "GOPRIVATE",
    "GONOPROXY",
    "GONOSUMDB",
    "GOFLAGS",
    "GOTOOLCHAIN",
];

/// A lock tool together with its runtime's view and last use.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolState {
    /// The tool as locked.
    pub tool: Tool,
    /// Runtime view; absent when the tool's runtime is not available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_info: Option<ModuleInfo>,
    /// Last recorded run in this project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_use: Option<DateTime<Utc>>,
}

/// Locations, environment and cache usage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Crate version.
    pub version: String,
    /// Project directory.
    pub spec_dir: PathBuf,
    /// Spec document path.
    pub spec_path: PathBuf,
    /// Lock document path.
    pub lock_path: PathBuf,
    /// Shared cache.
    pub cache_dir: PathBuf,
    /// Stats document path.
    pub stats_path: PathBuf,
    /// Total size of regular files in the cache.
    pub cache_size: u64,
    /// Registered runtime keys.
    pub runtimes: Vec<String>,
    /// Selected environment variables that are set.
    pub env: BTreeMap<String, String>,
}

/// One project's spec, lock and stats, plus the runtimes to act on them.
#[derive(Debug)]
pub struct Workdir {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    spec: Spec,
    lock: Lock,
    stats: Stats,
    registry: RuntimeRegistry,
    fetcher: RemoteFetcher,
    cancel: CancellationToken,
}

impl Workdir {
    /// Create an empty spec and lock in `dir` and open it.
    ///
    /// Fails with [`Error::SpecExists`] when `dir` already has a spec.
    pub fn init(
        fs: Arc<dyn FileSystem>,
        dir: &Path,
        registry: RuntimeRegistry,
        cancel: CancellationToken,
    ) -> Result<Self> {
        spec::ensure_no_spec(fs.as_ref(), dir)?;
        fs.create_dir_all(dir)
            .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "create project directory"))?;
        Spec::default().save(fs.as_ref(), dir)?;
        Lock::default().save(fs.as_ref(), dir)?;
        info!(dir = %dir.display(), "Initialized toolset project");
        Self::open(fs, dir, registry, cancel)
    }

    /// Open the project in `dir` and discover runtimes.
    pub async fn load(
        fs: Arc<dyn FileSystem>,
        dir: &Path,
        registry: RuntimeRegistry,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut workdir = Self::open(fs, dir, registry, cancel)?;
        workdir.registry.discover().await?;
        Ok(workdir)
    }

    /// Open the project in `dir` with `registry` as-is.
    ///
    /// Reads the spec and lock and creates the stats document if needed.
    pub fn open(
        fs: Arc<dyn FileSystem>,
        dir: &Path,
        registry: RuntimeRegistry,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let spec = Spec::load(fs.as_ref(), dir)?;
        let lock = Lock::load(fs.as_ref(), dir)?;
        let stats = Stats::load_or_create(fs.as_ref(), registry.cache_dir())
            .context("load usage stats")?;
        let fetcher = RemoteFetcher::new(Arc::clone(&fs), cancel.clone())?;
        debug!(dir = %dir.display(), tools = lock.tools.len(), "Opened project");
        Ok(Self {
            fs,
            dir: dir.to_path_buf(),
            spec,
            lock,
            stats,
            registry,
            fetcher,
            cancel,
        })
    }

    /// Project directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shared cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        self.registry.cache_dir()
    }

    /// Loaded spec.
    #[must_use]
    pub fn spec(&self) -> &Spec {
        &self.spec
    }

    /// Loaded lock.
    #[must_use]
    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    /// Loaded usage stats.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Runtime registry.
    #[must_use]
    pub fn registry(&self) -> &RuntimeRegistry {
        &self.registry
    }

    /// Mutable runtime registry.
    pub fn registry_mut(&mut self) -> &mut RuntimeRegistry {
        &mut self.registry
    }

    fn project_key(&self) -> String {
        self.dir.display().to_string()
    }

    /// Rebuild the lock from the spec and persist both.
    fn commit(&mut self) -> Result<()> {
        self.lock.from_spec(self.fs.as_ref(), &self.spec);
        self.spec.save(self.fs.as_ref(), &self.dir)?;
        self.lock.save(self.fs.as_ref(), &self.dir)
    }

    fn save_stats(&self) -> Result<()> {
        self.stats
            .save(self.fs.as_ref(), self.registry.cache_dir())
            .context("save usage stats")
    }

    /// Resolve `program` with `runtime` and add it to the spec.
    ///
    /// Returns whether the tool was new and its canonical module string. An
    /// existing tool with the same identity is left untouched.
    pub async fn add(
        &mut self,
        runtime: &str,
        program: &str,
        alias: Option<&str>,
        tags: &[String],
    ) -> Result<(bool, String)> {
        let rt = self.registry.get_install(runtime).await?;
        let module = rt
            .parse(program)
            .await
            .with_context(|| format!("resolve {program}"))?;

        let mut tool = Tool::new(rt.version(), module.clone()).with_tags(tags.iter().cloned());
        if let Some(alias) = alias {
            tool = tool.with_alias(alias);
        }
        if !self.spec.tools.add(tool) {
            debug!(%module, runtime = %rt.version(), "Tool already in spec");
            return Ok((false, module));
        }
        info!(%module, runtime = %rt.version(), "Added tool");
        self.commit()?;
        Ok((true, module))
    }

    /// Include the remote spec at `source`, returning how many tools it contributes.
    pub async fn add_include(&mut self, source: &str, tags: &[String]) -> Result<usize> {
        let remotes = self.fetcher.fetch(source, tags).await?;
        let contributed = remotes.iter().map(|r| r.spec.tools.len()).sum();

        if !self.spec.upsert_include(Include::new(source, tags.to_vec())) {
            debug!(%source, "Include already in spec; refreshing with new tags");
        }
        self.lock.add_remotes(remotes);
        self.commit()?;
        info!(%source, tools = contributed, "Included remote spec");
        Ok(contributed)
    }

    /// Copy the tools of the remote spec at `source` into the spec.
    ///
    /// No include is registered; `tags` are appended to every copied tool.
    /// Returns the number of tools added.
    pub async fn copy_source(&mut self, source: &str, tags: &[String]) -> Result<usize> {
        let remotes = self.fetcher.fetch(source, &[]).await?;
        let mut added = 0;
        for remote in &remotes {
            for mut tool in remote.tagged_tools() {
                tool.merge_tags(tags);
                if self.spec.tools.add(tool) {
                    added += 1;
                }
            }
        }
        self.commit()?;
        info!(%source, tools = added, "Copied tools from remote spec");
        Ok(added)
    }

    /// Find a lock tool by alias, then by program name.
    ///
    /// Purely local: tools whose runtime is not registered are skipped.
    pub fn find_tool(&self, name: &str) -> Result<Tool> {
        if let Some(tool) = self
            .lock
            .tools
            .iter()
            .find(|t| t.alias.as_deref() == Some(name))
        {
            return Ok(tool.clone());
        }

        for tool in self.lock.tools.iter() {
            let rt = match self.registry.get(&tool.runtime) {
                Ok(rt) => rt,
                Err(e) => {
                    debug!(tool = %tool.module, runtime = %tool.runtime, error = %e, "Skipping tool with unavailable runtime");
                    continue;
                }
            };
            if rt.get_module(&tool.module)?.name == name {
                return Ok(tool.clone());
            }
        }
        Err(Error::ToolNotFound(name.to_string()))
    }

    /// Uninstall a tool and drop it from spec, lock and stats.
    pub async fn remove_tool(&mut self, name: &str) -> Result<Tool> {
        let tool = self.find_tool(name)?;
        match self.registry.get(&tool.runtime) {
            Ok(rt) => {
                let info = rt.get_module(&tool.module)?;
                if info.is_installed {
                    rt.remove(&tool.module)
                        .with_context(|| format!("remove {}", tool.module))?;
                }
                if let Some(alias) = &tool.alias {
                    sync::unlink_alias(self.fs.as_ref(), self.registry.cache_dir(), alias, &info.bin_path)?;
                }
            }
            Err(e) => debug!(tool = %tool.module, error = %e, "Runtime unavailable; nothing to uninstall"),
        }

        self.spec.tools.remove(&tool);
        self.commit()?;
        self.lock.tools.remove(&tool);
        self.lock.save(self.fs.as_ref(), &self.dir)?;

        let project = self.project_key();
        if self.stats.remove(&project, &tool.id()) {
            self.save_stats()?;
        }
        info!(tool = %tool.module, "Removed tool");
        Ok(tool)
    }

    /// Run a tool, installing it once if its binary is missing.
    pub async fn run_tool(&mut self, name: &str, args: &[String]) -> Result<()> {
        let tool = self.find_tool(name)?;
        let rt = self.registry.get_install(&tool.runtime).await?;

        let project = self.project_key();
        self.stats.record(&project, &tool.id(), Utc::now());
        self.save_stats()?;

        match run(&rt, &tool, args).await {
            Err(e) if e.is_not_installed() => {
                info!(tool = %tool.module, "Tool not installed; installing");
                rt.install(&tool.module)
                    .await
                    .with_context(|| format!("install {}", tool.module))?;
                run(&rt, &tool, args).await
            }
            other => other,
        }
    }

    /// Lock tools with their runtime view and last use.
    pub fn get_tools(&self) -> Result<Vec<ToolState>> {
        let project = self.project_key();
        self.lock
            .tools
            .iter()
            .map(|tool| {
                let module_info = match self.registry.get(&tool.runtime) {
                    Ok(rt) => Some(rt.get_module(&tool.module)?),
                    Err(_) => None,
                };
                Ok(ToolState {
                    tool: tool.clone(),
                    module_info,
                    last_use: self.stats.last_use(&project, &tool.id()),
                })
            })
            .collect()
    }

    /// Locations, selected environment variables and cache size.
    pub fn system_info(&self) -> Result<SystemInfo> {
        let cache_dir = self.registry.cache_dir().to_path_buf();
        let env = REPORTED_ENV
            .iter()
            .filter_map(|key| {
                std::env::var(key)
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(|v| ((*key).to_string(), v))
            })
            .collect();
        Ok(SystemInfo {
            version: VERSION.to_string(),
            spec_dir: self.dir.clone(),
            spec_path: Spec::path(&self.dir),
            lock_path: Lock::path(&self.dir),
            stats_path: Stats::path(&cache_dir),
            cache_size: paths::dir_size(self.fs.as_ref(), &cache_dir)?,
            runtimes: self.registry.list(),
            env,
            cache_dir,
        })
    }
}

async fn run(rt: &Runtime, tool: &Tool, args: &[String]) -> Result<()> {
    debug!(tool = %tool.module, runtime = %tool.runtime, ?args, "Running tool");
    rt.run(&tool.module, args).await
}

//! Installing the locked tools and bumping their versions.

use super::Workdir;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use toolset_core::fs::FileSystem;
use toolset_core::spec::Tool;
use toolset_core::{Error, Result, ResultExt};
use tracing::{debug, info};

/// A tool whose pinned version changed during [`Workdir::upgrade`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    /// The tool with its new module string.
    pub tool: Tool,
    /// The previous module string.
    pub from: String,
}

impl Workdir {
    /// Install every lock tool matching `tags` that is not installed yet.
    ///
    /// At most `max_workers` installs run at once; zero is treated as one.
    /// Failures do not stop other installs and are returned together once
    /// every worker has finished.
    pub async fn sync(&mut self, max_workers: usize, tags: &[String]) -> Result<()> {
        self.commit()?;
        let tools = self.lock.tools.filter(tags);
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut workers: JoinSet<Result<()>> = JoinSet::new();
        let mut errors = Vec::new();

        for tool in tools.iter() {
            let rt = match self.registry.get_install(&tool.runtime).await {
                Ok(rt) => rt,
                Err(Error::Cancelled) => break,
                Err(e) => {
                    errors.push(e.context(format!("sync {}", tool.module)));
                    continue;
                }
            };
            let info = match rt.get_module(&tool.module) {
                Ok(info) => info,
                Err(e) => {
                    errors.push(e.context(format!("sync {}", tool.module)));
                    continue;
                }
            };
            if info.is_installed {
                debug!(tool = %tool.module, "Already installed");
                if let Some(alias) = &tool.alias
                    && let Err(e) = link_alias(self.fs.as_ref(), self.registry.cache_dir(), alias, &info.bin_path)
                {
                    errors.push(e);
                }
                continue;
            }

            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let fs = Arc::clone(&self.fs);
            let cache_dir = self.registry.cache_dir().to_path_buf();
            let tool = tool.clone();
            workers.spawn(async move {
                let _permit = permit;
                info!(tool = %tool.module, runtime = %tool.runtime, "Installing tool");
                rt.install(&tool.module)
                    .await
                    .with_context(|| format!("install {}", tool.module))?;
                if let Some(alias) = &tool.alias {
                    link_alias(fs.as_ref(), &cache_dir, alias, &info.bin_path)?;
                }
                Ok(())
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(Error::process("install worker", e.to_string())),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Error::join(errors).map_or(Ok(()), Err)
    }

    /// Bump every spec tool accepted by `filter` to its latest version, then
    /// refetch all includes.
    pub async fn upgrade<F>(&mut self, filter: F) -> Result<Vec<Upgrade>>
    where
        F: Fn(&Tool) -> bool,
    {
        let candidates: Vec<Tool> = self.spec.tools.iter().filter(|t| filter(t)).cloned().collect();
        let mut upgrades = Vec::new();

        for tool in candidates {
            let rt = self.registry.get_install(&tool.runtime).await?;
            let (latest, changed) = rt
                .get_latest(&tool.module)
                .await
                .with_context(|| format!("check {} for updates", tool.module))?;
            if !changed {
                debug!(tool = %tool.module, "Up to date");
                continue;
            }

            info!(from = %tool.module, to = %latest, "Upgrading tool");
            let upgraded = Tool {
                module: latest,
                ..tool.clone()
            };
            self.spec.tools.upsert(upgraded.clone());
            self.lock.tools.upsert(upgraded.clone());
            upgrades.push(Upgrade {
                tool: upgraded,
                from: tool.module,
            });
        }

        for include in self.spec.includes.clone() {
            let remotes = self
                .fetcher
                .fetch(&include.src, &include.tags)
                .await
                .with_context(|| format!("refresh include {}", include.src))?;
            self.lock.add_remotes(remotes);
        }
        self.commit()?;
        Ok(upgrades)
    }
}

/// Point `<cache>/<alias>` at `bin_path`, replacing any previous entry.
pub(super) fn link_alias(fs: &dyn FileSystem, cache_dir: &Path, alias: &str, bin_path: &Path) -> Result<()> {
    let link = cache_dir.join(alias);
    if fs.symlink_metadata(&link).is_ok() {
        fs.remove(&link)
            .map_err(|e| Error::io(e, Some(link.clone()), "remove old alias"))?;
    }
    fs.symlink(bin_path, &link)
        .map_err(|e| Error::io(e, Some(link.clone()), "create alias"))?;
    debug!(%alias, target = %bin_path.display(), "Linked alias");
    Ok(())
}

/// Remove `<cache>/<alias>` if it points at `bin_path`.
pub(super) fn unlink_alias(fs: &dyn FileSystem, cache_dir: &Path, alias: &str, bin_path: &Path) -> Result<()> {
    let link = cache_dir.join(alias);
    if fs.read_link(&link).is_ok_and(|target| target == bin_path) {
        fs.remove(&link)
            .map_err(|e| Error::io(e, Some(link.clone()), "remove alias"))?;
    }
    Ok(())
}

//! Remote spec fetching.
//!
//! A source is a local path, an `http(s)://` URL, or a `git+ssh://` /
//! `git+https://` address with a trailing `:<path>` naming the spec inside
//! the repository. Fetching a source returns the remote plus every remote it
//! transitively includes, in pre-order.

use crate::fs::{self, FileSystem};
use crate::http;
use crate::spec::{RemoteSpec, Spec, merge_tags};
use crate::{Error, Result, ResultExt};
use async_recursion::async_recursion;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A parsed include source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Local spec document.
    File {
        /// Absolute, cleaned path.
        path: PathBuf,
    },
    /// Spec served over HTTP(S).
    Url {
        /// Full URL.
        url: String,
    },
    /// Spec inside a git repository.
    Git {
        /// Clone address (`ssh://…` or `https://…`).
        addr: String,
        /// Path of the spec relative to the clone root.
        path: String,
    },
}

impl Source {
    /// Parse a source URI.
    pub fn parse(fs: &dyn FileSystem, raw: &str) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("git+ssh://") {
            let (addr, path) = split_git(raw, rest)?;
            return Ok(Self::Git {
                addr: format!("ssh://{addr}"),
                path,
            });
        }
        if let Some(rest) = raw.strip_prefix("git+https://") {
            let (addr, path) = split_git(raw, rest)?;
            return Ok(Self::Git {
                addr: format!("https://{addr}"),
                path,
            });
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Url {
                url: raw.to_string(),
            });
        }
        if raw.is_empty() || raw.contains("://") {
            return Err(Error::UnsupportedSource(raw.to_string()));
        }
        Ok(Self::File {
            path: fs::abs(fs, Path::new(raw))?,
        })
    }

    /// Normalized key used for cycle detection.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::File { path } => path.display().to_string(),
            Self::Url { url } => url.clone(),
            Self::Git { addr, path } => format!("{addr}:{path}"),
        }
    }
}

/// Normalized key of `raw`, or `raw` itself when it does not parse.
#[must_use]
pub fn source_key(fs: &dyn FileSystem, raw: &str) -> String {
    Source::parse(fs, raw).map_or_else(|_| raw.to_string(), |s| s.key())
}

fn split_git(raw: &str, rest: &str) -> Result<(String, String)> {
    match rest.rsplit_once(':') {
        Some((addr, path)) if !addr.is_empty() && !path.is_empty() => {
            Ok((addr.to_string(), path.to_string()))
        }
        _ => Err(Error::invalid_format(raw, "expected git+<scheme>://<addr>:<path>")),
    }
}

/// State of one traversal: the current include path and every remote fetched so far.
#[derive(Default)]
struct Walk {
    ancestors: Vec<String>,
    fetched: Vec<(String, RemoteSpec)>,
}

/// Fetches remote specs and their includes.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    fs: Arc<dyn FileSystem>,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl RemoteFetcher {
    /// Create a fetcher reading local sources through `fs`.
    pub fn new(fs: Arc<dyn FileSystem>, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            fs,
            client: http::api_client()?,
            cancel,
        })
    }

    /// Fetch `source` and its transitive includes.
    ///
    /// `tags` become the outer tags of the first remote; each nested include
    /// adds its own tags to its parent's. A remote reached through several
    /// include paths is fetched once and carries the union of their tags.
    pub async fn fetch(&self, source: &str, tags: &[String]) -> Result<Vec<RemoteSpec>> {
        info!(%source, "Fetching remote spec");
        let mut walk = Walk::default();
        self.fetch_into(source, tags.to_vec(), &mut walk).await?;
        Ok(walk.fetched.into_iter().map(|(_, remote)| remote).collect())
    }

    #[async_recursion]
    async fn fetch_into(&self, raw: &str, tags: Vec<String>, walk: &mut Walk) -> Result<()> {
        let source = Source::parse(self.fs.as_ref(), raw)?;
        let key = source.key();
        if walk.ancestors.contains(&key) {
            return Err(Error::IncludeCycle(raw.to_string()));
        }

        let seen = walk.fetched.iter().position(|(k, _)| *k == key);
        let (tags, includes) = match seen {
            Some(index) => {
                let remote = &mut walk.fetched[index].1;
                let before = remote.tags.len();
                merge_tags(&mut remote.tags, &tags);
                if remote.tags.len() == before {
                    debug!(source = %raw, "Remote already fetched");
                    return Ok(());
                }
                debug!(source = %raw, "Remote reached again; propagating tags");
                (remote.tags.clone(), remote.spec.includes.clone())
            }
            None => {
                let spec = self
                    .load(&source)
                    .await
                    .with_context(|| format!("fetch {raw}"))?;
                let includes = spec.includes.clone();
                walk.fetched.push((
                    key.clone(),
                    RemoteSpec {
                        source: raw.to_string(),
                        spec,
                        tags: tags.clone(),
                    },
                ));
                (tags, includes)
            }
        };

        walk.ancestors.push(key);
        for include in includes {
            let mut nested = include.tags.clone();
            merge_tags(&mut nested, &tags);
            self.fetch_into(&include.src, nested, walk).await?;
        }
        walk.ancestors.pop();
        Ok(())
    }

    async fn load(&self, source: &Source) -> Result<Spec> {
        let (data, origin) = match source {
            Source::File { path } => {
                debug!(path = %path.display(), "Reading remote spec file");
                let data = self
                    .fs
                    .read(path)
                    .map_err(|e| Error::io(e, Some(path.clone()), "read remote spec"))?;
                (data, path.clone())
            }
            Source::Url { url } => (self.get(url).await?, PathBuf::from(url)),
            Source::Git { addr, path } => (self.clone_and_read(addr, path).await?, PathBuf::from(path)),
        };
        let mut spec: Spec = serde_json::from_slice(&data).map_err(|e| Error::json(e, &origin))?;
        spec.dir.clear();
        Ok(spec)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "Downloading remote spec");
        http::get_bytes(self.client.get(url), url, &self.cancel).await
    }

    async fn clone_and_read(&self, addr: &str, path: &str) -> Result<Vec<u8>> {
        let checkout = tempfile::Builder::new()
            .prefix("toolset-remote-")
            .tempdir()
            .map_err(|e| Error::io(e, None, "create clone directory"))?;
        debug!(%addr, dir = %checkout.path().display(), "Cloning remote spec repository");

        let child = Command::new("git")
            .args(["clone", "--depth", "1", "--quiet", addr])
            .arg(checkout.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::git_clone(addr, e.to_string()))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| Error::git_clone(addr, e.to_string()))?,
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
        };
        if !output.status.success() {
            return Err(Error::git_clone(
                addr,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let file = checkout.path().join(path);
        tokio::fs::read(&file)
            .await
            .map_err(|e| Error::io(e, Some(PathBuf::from(path)), "read spec from clone"))
    }
}

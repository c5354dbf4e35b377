//! Go module proxy client.
//!
//! Implements the subset of the GOPROXY protocol needed to canonicalize a
//! module version: `GET <proxy>/<module>/@latest` and
//! `GET <proxy>/<module>/@v/<version>.info`.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use toolset_core::version::Version;
use toolset_core::{Error, Result, http};
use tracing::debug;

/// Default public proxy.
pub const DEFAULT_PROXY: &str = "https://proxy.golang.org";

#[derive(Debug, Deserialize)]
struct Info {
    #[serde(rename = "Version")]
    version: String,
}

/// Escape a module path or version for the proxy: upper-case letters become
/// `!` followed by the lower-case letter.
#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Client for one module proxy.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    base: String,
    client: Client,
}

impl ProxyClient {
    /// Create a client for the proxy at `base`.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            client: http::api_client()?,
        })
    }

    /// Proxy base URL.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Resolve `version` of the package at `path` to a canonical version.
    ///
    /// A 404 strips the last path element and retries, walking up from a
    /// package inside a module to the module root. Running out of elements
    /// fails with [`Error::UnknownModule`].
    pub async fn resolve(
        &self,
        path: &str,
        version: &Version,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut candidate = path;
        loop {
            match self.info(candidate, version, cancel).await? {
                Some(resolved) => {
                    debug!(module = %path, root = %candidate, %resolved, "Resolved module version");
                    return Ok(resolved);
                }
                None => match candidate.rsplit_once('/') {
                    Some((parent, _)) => candidate = parent,
                    None => return Err(Error::UnknownModule(format!("{path}@{version}"))),
                },
            }
        }
    }

    /// Query one module path. `Ok(None)` means the proxy answered 404.
    async fn info(
        &self,
        module: &str,
        version: &Version,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let url = match version {
            Version::Latest => format!("{}/{}/@latest", self.base, escape(module)),
            Version::Exact(v) => format!("{}/{}/@v/{}.info", self.base, escape(module), escape(v)),
        };
        debug!(%url, "Querying module proxy");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(&url).send() => {
                response.map_err(|e| Error::network(&url, e.to_string()))?
            }
        };
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::network(&url, format!("HTTP {status}: {}", body.trim())));
        }

        let info: Info = response
            .json()
            .await
            .map_err(|e| Error::network(&url, format!("invalid info response: {e}")))?;
        Ok(Some(info.version))
    }
}

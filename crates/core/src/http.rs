//! HTTP plumbing shared by the remote fetcher and the runtime plugins.
//!
//! Every client carries the `toolset/<version>` user agent. API and document
//! requests use [`API_TIMEOUT`] end to end; artifact downloads only bound the
//! connect phase since toolchain archives take longer than that to stream.

use crate::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// End-to-end timeout for API and document requests.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for API and document requests.
pub fn api_client() -> Result<Client> {
    Client::builder()
        .user_agent(crate::user_agent())
        .timeout(API_TIMEOUT)
        .build()
        .map_err(|e| Error::network("", format!("failed to build HTTP client: {e}")))
}

/// Client for artifact downloads.
pub fn download_client() -> Result<Client> {
    Client::builder()
        .user_agent(crate::user_agent())
        .connect_timeout(API_TIMEOUT)
        .build()
        .map_err(|e| Error::network("", format!("failed to build HTTP client: {e}")))
}

/// Send `request`, failing on transport errors, cancellation and non-2xx
/// statuses. `url` is only used for error messages.
pub async fn send(request: RequestBuilder, url: &str, cancel: &CancellationToken) -> Result<Response> {
    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::Cancelled),
        response = request.send() => response.map_err(|e| Error::network(url, e.to_string()))?,
    };
    let status = response.status();
    if !status.is_success() {
        return Err(Error::network(url, format!("HTTP {status}")));
    }
    Ok(response)
}

/// [`send`] and collect the body.
pub async fn get_bytes(
    request: RequestBuilder,
    url: &str,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    let response = send(request, url, cancel).await?;
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        body = response.bytes() => body
            .map(|b| b.to_vec())
            .map_err(|e| Error::network(url, e.to_string())),
    }
}

/// [`send`] and stream the body into `dest` on the local disk.
pub async fn download(
    request: RequestBuilder,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<u64> {
    debug!(%url, dest = %dest.display(), "Downloading");
    let mut response = send(request, url, cancel).await?;
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "create download"))?;

    let mut written = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = response.chunk() => chunk.map_err(|e| Error::network(url, e.to_string()))?,
        };
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "write download"))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "write download"))?;
    Ok(written)
}

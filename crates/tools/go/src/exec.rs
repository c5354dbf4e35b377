//! Spawning the `go` binary.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use toolset_core::env::scrubbed_env;
use toolset_core::{Error, Result};
use tracing::debug;

/// Run `go <args>` with a scrubbed environment plus `overrides`, returning
/// trimmed stdout. stderr is captured for the error on failure.
pub(crate) async fn go(
    bin: &Path,
    args: &[&str],
    dir: Option<&Path>,
    overrides: &[(&str, &str)],
    cancel: &CancellationToken,
) -> Result<String> {
    let command = format!("{} {}", bin.display(), args.join(" "));
    debug!(%command, dir = ?dir, "Running go");

    let mut cmd = Command::new(bin);
    cmd.args(args)
        .env_clear()
        .envs(scrubbed_env(overrides))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let child = cmd
        .spawn()
        .map_err(|e| Error::process(&command, e.to_string()))?;
    let output = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::Cancelled),
        output = child.wait_with_output() => output.map_err(|e| Error::process(&command, e.to_string()))?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::process(
            command,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

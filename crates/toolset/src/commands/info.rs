//! Informational commands: `info`, `runtime` and `version`.

use super::to_json;
use crate::cli::OutputFormat;
use crate::registry::RuntimeRegistry;
use crate::workdir::{SystemInfo, Workdir};
use serde::Serialize;
use std::fmt::Write;
use toolset_core::{Result, VERSION};

/// Render locations, environment and cache usage.
pub fn execute_info(wd: &Workdir, format: OutputFormat) -> Result<String> {
    let info = wd.system_info()?;
    match format {
        OutputFormat::Json => to_json(info),
        OutputFormat::Text => Ok(render_info(&info)),
    }
}

fn render_info(info: &SystemInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "version:   {}", info.version);
    let _ = writeln!(out, "spec dir:  {}", info.spec_dir.display());
    let _ = writeln!(out, "spec:      {}", info.spec_path.display());
    let _ = writeln!(out, "lock:      {}", info.lock_path.display());
    let _ = writeln!(out, "cache dir: {}", info.cache_dir.display());
    let _ = writeln!(out, "stats:     {}", info.stats_path.display());
    let _ = writeln!(out, "cache:     {}", human_size(info.cache_size));
    let _ = writeln!(out, "runtimes:  {}", info.runtimes.join(", "));
    if !info.env.is_empty() {
        out.push_str("env:\n");
        for (key, value) in &info.env {
            let _ = writeln!(out, "  {key}={value}");
        }
    }
    out.trim_end().to_string()
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

/// Render the registered runtime keys.
pub fn execute_runtime_list(registry: &RuntimeRegistry, format: OutputFormat) -> Result<String> {
    let runtimes = registry.list();
    match format {
        OutputFormat::Json => to_json(runtimes),
        OutputFormat::Text => Ok(runtimes.join("\n")),
    }
}

/// Install the toolchain behind `key`.
pub async fn execute_runtime_add(registry: &mut RuntimeRegistry, key: &str) -> Result<String> {
    let rt = registry.get_install(key).await?;
    Ok(format!("Runtime {} is available", rt.version()))
}

#[derive(Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

/// Render the crate version.
pub fn execute_version(format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(VersionInfo {
            name: "toolset",
            version: VERSION,
        }),
        OutputFormat::Text => Ok(format!("toolset {VERSION}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_info_text() {
        let (wd, _stub, _fs) = fixture::workdir();
        let out = temp_env::with_var("GOPROXY", Some("https://proxy.example"), || {
            execute_info(&wd, OutputFormat::Text).unwrap()
        });
        assert!(out.contains("spec:      /proj/.toolset.json"));
        assert!(out.contains("runtimes:  go"));
        assert!(out.contains("  GOPROXY=https://proxy.example"));
    }

    #[test]
    fn test_runtime_list() {
        let (wd, _stub, _fs) = fixture::workdir();
        assert_eq!(execute_runtime_list(wd.registry(), OutputFormat::Text).unwrap(), "go");
        let json = execute_runtime_list(wd.registry(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["data"][0], "go");
    }

    #[test]
    fn test_version() {
        assert_eq!(
            execute_version(OutputFormat::Text).unwrap(),
            format!("toolset {VERSION}")
        );
    }
}

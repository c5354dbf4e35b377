//! Commands acting on locked tools: `list`, `sync`, `run` and `upgrade`.

use super::to_json;
use crate::cli::{CliError, EXIT_OK, OutputFormat};
use crate::workdir::{ToolState, Workdir};
use std::fmt::Write;
use toolset_core::Result;
use toolset_core::spec::Tool;
use tracing::debug;

/// Render the locked tools, optionally restricted to `tags`.
pub fn execute_list(wd: &Workdir, tags: &[String], format: OutputFormat) -> Result<String> {
    let tools: Vec<ToolState> = wd
        .get_tools()?
        .into_iter()
        .filter(|state| tags.is_empty() || state.tool.has_any_tag(tags))
        .collect();

    match format {
        OutputFormat::Json => to_json(tools),
        OutputFormat::Text => Ok(render_tools(&tools)),
    }
}

fn render_tools(tools: &[ToolState]) -> String {
    if tools.is_empty() {
        return "No tools in spec".to_string();
    }
    let mut out = String::new();
    for state in tools {
        let name = state
            .tool
            .alias
            .clone()
            .or_else(|| state.module_info.as_ref().map(|info| info.name.clone()))
            .unwrap_or_else(|| state.tool.module_path().to_string());
        let status = match &state.module_info {
            Some(info) if info.is_installed => "installed",
            Some(_) => "missing",
            None => "no runtime",
        };
        let _ = write!(out, "{name:<20} {:<50} {:<12} {status:<10}", state.tool.module, state.tool.runtime);
        if let Some(last) = state.last_use {
            let _ = write!(out, " last used {}", last.format("%Y-%m-%d %H:%M"));
        }
        if !state.tool.tags.is_empty() {
            let _ = write!(out, " [{}]", state.tool.tags.join(","));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Install every locked tool.
pub async fn execute_sync(wd: &mut Workdir, parallel: usize, tags: &[String]) -> Result<String> {
    wd.sync(parallel, tags).await?;
    let count = wd.lock().tools.filter(tags).len();
    Ok(format!("{count} tool(s) in sync"))
}

/// Run a tool and map its exit status onto ours.
pub async fn execute_run(wd: &mut Workdir, name: &str, args: &[String]) -> std::result::Result<i32, CliError> {
    match wd.run_tool(name, args).await {
        Ok(()) => Ok(EXIT_OK),
        Err(e) => match e.run_exit_code() {
            Some(code) if code >= 0 => {
                debug!(tool = %name, code, "Tool exited unsuccessfully");
                Ok(code)
            }
            _ => Err(e.into()),
        },
    }
}

/// Bump tools matching `tags` to their latest versions and install them.
pub async fn execute_upgrade(wd: &mut Workdir, parallel: usize, tags: &[String]) -> Result<String> {
    let upgrades = wd
        .upgrade(|tool: &Tool| tags.is_empty() || tool.has_any_tag(tags))
        .await?;
    wd.sync(parallel, tags).await?;

    if upgrades.is_empty() {
        return Ok("All tools are up to date".to_string());
    }
    let mut out = String::new();
    for upgrade in &upgrades {
        let _ = writeln!(out, "{} -> {}", upgrade.from, upgrade.tool.module);
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;

    #[tokio::test]
    async fn test_list_text_and_tag_filter() {
        let (mut wd, _stub, _fs) = fixture::workdir();
        assert_eq!(execute_list(&wd, &[], OutputFormat::Text).unwrap(), "No tools in spec");

        wd.add("go", "example.com/cmd/fmt@v1.0.0", Some("f"), &["style".to_string()])
            .await
            .unwrap();
        wd.add("go", "example.com/cmd/vet@v2.0.0", None, &[]).await.unwrap();

        let out = execute_list(&wd, &[], OutputFormat::Text).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('f'));
        assert!(lines[0].contains("missing"));
        assert!(lines[0].ends_with("[style]"));
        assert!(lines[1].starts_with("vet"));

        let out = execute_list(&wd, &["style".to_string()], OutputFormat::Text).unwrap();
        assert_eq!(out.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_list_json_envelope() {
        let (mut wd, _stub, _fs) = fixture::workdir();
        wd.add("go", "example.com/cmd/vet@v2.0.0", None, &[]).await.unwrap();

        let out = execute_list(&wd, &[], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"][0]["tool"]["module"], "example.com/cmd/vet@v2.0.0");
        assert_eq!(value["data"][0]["moduleInfo"]["isInstalled"], false);
    }

    #[tokio::test]
    async fn test_run_propagates_child_exit_code() {
        let (mut wd, stub, _fs) = fixture::workdir();
        wd.add("go", "example.com/cmd/vet@v2.0.0", None, &[]).await.unwrap();

        assert_eq!(execute_run(&mut wd, "vet", &[]).await.unwrap(), EXIT_OK);

        stub.set_exit_code("example.com/cmd/vet", 4);
        assert_eq!(execute_run(&mut wd, "vet", &[]).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_run_unknown_tool_is_config_error() {
        let (mut wd, _stub, _fs) = fixture::workdir();
        let err = execute_run(&mut wd, "nope", &[]).await.unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[tokio::test]
    async fn test_upgrade_reports_changes_and_installs() {
        let (mut wd, stub, _fs) = fixture::workdir();
        wd.add("go", "example.com/cmd/vet@v2.0.0", None, &[]).await.unwrap();

        assert_eq!(
            execute_upgrade(&mut wd, 2, &[]).await.unwrap(),
            "All tools are up to date"
        );

        stub.set_latest("example.com/cmd/vet", "v2.1.0");
        assert_eq!(
            execute_upgrade(&mut wd, 2, &[]).await.unwrap(),
            "example.com/cmd/vet@v2.0.0 -> example.com/cmd/vet@v2.1.0"
        );
        assert_eq!(stub.install_count(), 2);
        assert_eq!(execute_sync(&mut wd, 1, &[]).await.unwrap(), "1 tool(s) in sync");
        assert_eq!(stub.install_count(), 2);
    }
}

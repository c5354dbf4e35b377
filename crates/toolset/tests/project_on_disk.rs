//! `init` and friends against a real project directory.

use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use toolset::Settings;
use toolset::cli::{CliError, EXIT_CLI, OutputFormat, exit_code_for};
use toolset::commands::{CommandContext, info, project, tools};
use toolset::workdir::Workdir;
use toolset_core::fs::{FileSystem, OsFs};
use toolset_tools_github::GitHubConfig;
use toolset_tools_go::GoConfig;

fn context(tmp: &TempDir) -> CommandContext {
    CommandContext {
        fs: Arc::new(OsFs::new()),
        settings: Settings {
            cache_dir: tmp.path().join("cache"),
            spec_dir: tmp.path().join("proj"),
            go: GoConfig::default(),
            github: GitHubConfig::default(),
        },
        cancel: CancellationToken::new(),
    }
}

fn open(ctx: &CommandContext) -> Workdir {
    Workdir::open(
        Arc::clone(&ctx.fs),
        &ctx.settings.spec_dir,
        ctx.settings.registry(Arc::clone(&ctx.fs), ctx.cancel.clone()),
        ctx.cancel.clone(),
    )
    .unwrap()
}

#[test]
fn test_init_writes_documents_once() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);

    let out = project::execute_init(&ctx, None).unwrap();
    assert!(out.starts_with("Initialized toolset in "));
    assert!(tmp.path().join("proj/.toolset.json").is_file());
    assert!(tmp.path().join("proj/.toolset.lock.json").is_file());
    assert!(tmp.path().join("cache/stats.json").is_file());

    let err = CliError::from(project::execute_init(&ctx, None).unwrap_err());
    assert_eq!(exit_code_for(&err), EXIT_CLI);
}

#[test]
fn test_init_explicit_directory() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    let dir = tmp.path().join("elsewhere");

    project::execute_init(&ctx, Some(&dir)).unwrap();
    assert!(ctx.fs.exists(&dir.join(".toolset.json")));
    assert!(!ctx.fs.exists(&tmp.path().join("proj")));
}

#[test]
fn test_fresh_project_lists_nothing() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    project::execute_init(&ctx, None).unwrap();

    let wd = open(&ctx);
    assert_eq!(
        tools::execute_list(&wd, &[], OutputFormat::Text).unwrap(),
        "No tools in spec"
    );

    let json = info::execute_info(&wd, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(
        value["data"]["cacheDir"],
        tmp.path().join("cache").display().to_string()
    );
}

#[tokio::test]
async fn test_include_local_file() {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp);
    project::execute_init(&ctx, None).unwrap();

    let shared = tmp.path().join("shared.json");
    std::fs::write(
        &shared,
        r#"{"tools":[{"runtime":"go","module":"mvdan.cc/gofumpt@v0.7.0"}]}"#,
    )
    .unwrap();

    let mut wd = open(&ctx);
    let source = shared.display().to_string();
    let out = project::execute_include(&mut wd, &source, &["fmt".to_string()])
        .await
        .unwrap();
    assert_eq!(out, format!("Included {source} (1 tool(s))"));

    let reopened = open(&ctx);
    assert_eq!(reopened.spec().includes.len(), 1);
    assert_eq!(reopened.lock().tools.len(), 1);
    assert_eq!(
        reopened.lock().tools.as_slice()[0].tags,
        vec!["fmt".to_string()]
    );
}

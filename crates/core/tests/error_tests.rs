//! Tests for error types

use std::path::Path;
use toolset_core::runtime::RunError;
use toolset_core::{Error, ResultExt};

#[test]
fn test_validation_errors() {
    let error = Error::invalid_format("cli", "expected owner/repo");
    assert_eq!(error.to_string(), "invalid format 'cli': expected owner/repo");

    let error = Error::non_semver("main");
    assert_eq!(error.to_string(), "version 'main' is not a valid semver");

    let error = Error::UnsupportedRuntime("python@3.12".into());
    assert_eq!(error.to_string(), "unsupported runtime: python@3.12");
}

#[test]
fn test_state_errors() {
    let error = Error::spec_exists(Path::new("/proj/.toolset.json"));
    assert_eq!(error.to_string(), "spec already exists: /proj/.toolset.json");

    let error = Error::IncludeCycle("/a.json".into());
    assert_eq!(error.to_string(), "include cycle detected at /a.json");
}

#[test]
fn test_external_errors() {
    let error = Error::network("https://proxy.golang.org/x/@latest", "HTTP 500");
    assert_eq!(
        error.to_string(),
        "request to https://proxy.golang.org/x/@latest failed: HTTP 500"
    );

    let error = Error::archive(Path::new("/tmp/a.zip"), "bad header");
    assert_eq!(error.to_string(), "failed to extract /tmp/a.zip: bad header");
}

#[test]
fn test_context_chain_keeps_kind() {
    let result: toolset_core::Result<()> = Err(Error::ToolNotInstalled("x@v1.0.0".into()));
    let error = result
        .context("run x")
        .with_context(|| "workdir /proj".to_string())
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "workdir /proj: run x: tool 'x@v1.0.0' is not installed"
    );
    assert!(error.is_not_installed());
    assert!(matches!(error.root(), Error::ToolNotInstalled(_)));
}

#[test]
fn test_run_error_exit_code() {
    let error = Error::from(RunError::new(2, "exit status: 2")).context("run golangci-lint");
    assert_eq!(error.run_exit_code(), Some(2));
    assert!(!error.is_not_installed());
    assert_eq!(Error::Cancelled.run_exit_code(), None);
}

#[test]
fn test_join_flattens_singletons() {
    assert!(Error::join(Vec::new()).is_none());

    let single = Error::join(vec![Error::Cancelled]).unwrap();
    assert!(matches!(single, Error::Cancelled));

    let many = Error::join(vec![
        Error::ToolNotFound("a".into()),
        Error::ToolNotFound("b".into()),
    ])
    .unwrap();
    assert_eq!(
        many.to_string(),
        "tool 'a' not found in spec\ntool 'b' not found in spec"
    );
}

//! Command-line surface: argument parsing, exit codes and error rendering.

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use toolset_core::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Install, network or tool failure exit code
pub const EXIT_TOOL: i32 = 3;
/// Exit code after an interrupt
pub const EXIT_SIGINT: i32 = 130;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Bad input or project state (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(toolset::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Install, network or tool execution failure (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(toolset::cli::tool))]
    Tool {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(toolset::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new tool error
    #[must_use]
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Tool { message, .. } => Self::Tool { message, help },
            Self::Other { message, .. } => Self::Other { message, help },
        }
    }

    /// Short code used in the JSON error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Tool { .. } => "tool",
            Self::Other { .. } => "other",
        }
    }
}

/// Convert `toolset_core::Error` to the matching `CliError` category.
///
/// The category follows the innermost error beneath any context wrappers;
/// the message keeps the full chain.
impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        let root = err.root();
        let help = root.help().map(|h| h.to_string());
        let cli = match root {
            Error::InvalidFormat { .. }
            | Error::NonSemver { .. }
            | Error::UnsupportedRuntime(_)
            | Error::UnsupportedSource(_)
            | Error::ToolNotFound(_)
            | Error::RuntimeNotFound(_)
            | Error::SpecExists { .. }
            | Error::IncludeCycle(_)
            | Error::Json { .. } => Self::config(message),
            Error::Io { .. } => Self::other(message),
            _ => Self::tool(message),
        };
        match help {
            Some(help) => cli.with_help(help),
            None => cli,
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Tool { .. } | CliError::Other { .. } => EXIT_TOOL,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
        }));
        match serde_json::to_string(&envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Output format for command results
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output format
    Json,
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Main CLI entry point for toolset.
///
/// Installs and runs the developer tools a project declares in `.toolset.json`.
#[derive(Parser, Debug)]
#[command(name = "toolset")]
#[command(about = "Per-project developer toolchain manager")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit JSON envelope regardless of format.
    #[arg(long, global = true, help = "Emit JSON envelope regardless of format")]
    pub json: bool,

    /// Shared tool cache.
    #[arg(
        long,
        global = true,
        env = "TOOLSET_CACHE_DIR",
        help = "Shared tool cache directory",
        value_name = "DIR"
    )]
    pub cache_dir: Option<PathBuf>,

    /// Project directory holding `.toolset.json`.
    #[arg(
        long,
        global = true,
        env = "TOOLSET_SPEC_DIR",
        help = "Project directory holding .toolset.json",
        value_name = "DIR"
    )]
    pub spec_dir: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create an empty spec and lock.
    #[command(about = "Create an empty spec and lock")]
    Init {
        /// Project directory; defaults to the spec directory.
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Add a tool to the spec.
    #[command(about = "Add a tool to the spec")]
    Add {
        /// Runtime key, e.g. `go`, `go@1.23.4` or `gh`.
        #[arg(required_unless_present = "copy_from")]
        runtime: Option<String>,
        /// Module or repository, optionally with `@version`.
        #[arg(required_unless_present = "copy_from")]
        module: Option<String>,
        /// Stable name linked in the cache root.
        #[arg(long, conflicts_with = "copy_from")]
        alias: Option<String>,
        /// Copy every tool of a remote spec instead.
        #[arg(long, value_name = "SOURCE", conflicts_with_all = ["runtime", "module"])]
        copy_from: Option<String>,
        /// Tags attached to the added tools.
        #[arg(long, short = 't', value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Include a remote spec.
    #[command(about = "Include a remote spec")]
    Include {
        /// File path, `http(s)://`, `git+ssh://` or `git+https://` source.
        source: String,
        /// Tags attached to the included tools.
        #[arg(long, short = 't', value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Remove a tool by alias or program name.
    #[command(about = "Remove a tool by alias or program name", visible_alias = "rm")]
    Remove {
        /// Alias or program name.
        name: String,
    },
    /// List locked tools.
    #[command(about = "List locked tools", visible_alias = "ls")]
    List {
        /// Only tools carrying one of these tags.
        #[arg(long, short = 't', value_delimiter = ',')]
        tags: Vec<String>,
        /// Output format.
        #[arg(
            long = "output",
            short = 'o',
            value_enum,
            default_value_t = OutputFormat::Text
        )]
        output_format: OutputFormat,
    },
    /// Install every locked tool.
    #[command(about = "Install every locked tool")]
    Sync {
        /// Maximum concurrent installs.
        #[arg(long, short = 'p', default_value_t = 4)]
        parallel: usize,
        /// Only tools carrying one of these tags.
        #[arg(long, short = 't', value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Run a tool, installing it on first use.
    #[command(
        about = "Run a tool, installing it on first use",
        visible_alias = "r",
        trailing_var_arg = true
    )]
    Run {
        /// Alias or program name.
        name: String,
        /// Arguments passed to the tool.
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Bump tools to their latest versions, then sync.
    #[command(about = "Bump tools to their latest versions, then sync")]
    Upgrade {
        /// Maximum concurrent installs.
        #[arg(long, short = 'p', default_value_t = 4)]
        parallel: usize,
        /// Only tools carrying one of these tags.
        #[arg(long, short = 't', value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Show locations, environment and cache usage.
    #[command(about = "Show locations, environment and cache usage")]
    Info {
        /// Output format.
        #[arg(
            long = "output",
            short = 'o',
            value_enum,
            default_value_t = OutputFormat::Text
        )]
        output_format: OutputFormat,
    },
    /// Runtime operations.
    #[command(about = "Runtime operations")]
    Runtime {
        /// Runtime subcommand to execute.
        #[command(subcommand)]
        subcommand: RuntimeCommands,
    },
    /// Show version information.
    #[command(about = "Show version information")]
    Version,
}

/// Runtime subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum RuntimeCommands {
    /// List available runtimes.
    #[command(about = "List available runtimes")]
    List,
    /// Install a Go toolchain runtime.
    #[command(about = "Install a Go toolchain runtime")]
    Add {
        /// Runtime key, e.g. `go@1.23.4`.
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolset_core::runtime::RunError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("toolset").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_add_positional() {
        let cli = parse(&["add", "go", "golang.org/x/tools/cmd/goimports", "--alias", "gi"]);
        assert_eq!(
            cli.command,
            Commands::Add {
                runtime: Some("go".into()),
                module: Some("golang.org/x/tools/cmd/goimports".into()),
                alias: Some("gi".into()),
                copy_from: None,
                tags: vec![],
            }
        );
    }

    #[test]
    fn test_add_copy_from_needs_no_positionals() {
        let cli = parse(&["add", "--copy-from", "../shared", "--tags", "lint,ci"]);
        let Commands::Add {
            runtime,
            copy_from,
            tags,
            ..
        } = cli.command
        else {
            panic!("expected add");
        };
        assert!(runtime.is_none());
        assert_eq!(copy_from.as_deref(), Some("../shared"));
        assert_eq!(tags, vec!["lint".to_string(), "ci".to_string()]);
    }

    #[test]
    fn test_add_requires_module() {
        assert!(Cli::try_parse_from(["toolset", "add", "go"]).is_err());
    }

    #[test]
    fn test_run_passes_hyphenated_args() {
        let cli = parse(&["run", "golangci-lint", "run", "--fix", "-v"]);
        assert_eq!(
            cli.command,
            Commands::Run {
                name: "golangci-lint".into(),
                args: vec!["run".into(), "--fix".into(), "-v".into()],
            }
        );
    }

    #[test]
    fn test_global_flags() {
        temp_env::with_vars(
            [("TOOLSET_CACHE_DIR", None::<&str>), ("TOOLSET_SPEC_DIR", None)],
            || {
                let cli = parse(&["sync", "--cache-dir", "/tmp/c", "-p", "8", "--json"]);
                assert!(cli.json);
                assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
                assert!(cli.spec_dir.is_none());
                assert_eq!(
                    cli.command,
                    Commands::Sync {
                        parallel: 8,
                        tags: vec![],
                    }
                );
            },
        );
    }

    #[test]
    fn test_spec_dir_from_env() {
        temp_env::with_var("TOOLSET_SPEC_DIR", Some("/proj"), || {
            let cli = parse(&["list"]);
            assert_eq!(cli.spec_dir, Some(PathBuf::from("/proj")));
        });
    }

    #[test]
    fn test_error_categories() {
        let err = CliError::from(Error::ToolNotFound("x".into()));
        assert_eq!(exit_code_for(&err), EXIT_CLI);
        assert!(matches!(err, CliError::Config { help: Some(_), .. }));

        let err = CliError::from(Error::network("https://x", "boom").context("install y"));
        assert_eq!(exit_code_for(&err), EXIT_TOOL);
        assert_eq!(err.to_string(), "install y: request to https://x failed: boom");

        let err = CliError::from(Error::io(
            io::Error::other("denied"),
            None,
            "write spec",
        ));
        assert!(matches!(err, CliError::Other { .. }));
    }

    #[test]
    fn test_run_error_is_tool_category() {
        let err = CliError::from(Error::Run(RunError::new(7, "exit status: 7")).context("run x"));
        assert_eq!(exit_code_for(&err), EXIT_TOOL);
    }

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_string(&OkEnvelope::new(vec!["go"])).unwrap();
        assert_eq!(json, r#"{"status":"ok","data":["go"]}"#);
    }
}

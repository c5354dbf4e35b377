//! Command implementations behind the CLI.
//!
//! Each `execute_*` function takes an already opened [`Workdir`] (or the
//! pieces it needs) and returns the text to print, so the dispatch in
//! [`execute`] is the only place that touches the real filesystem.

pub mod info;
pub mod project;
pub mod tools;

use crate::cli::{CliError, Cli, Commands, EXIT_OK, OutputFormat, RuntimeCommands};
use crate::settings::Settings;
use crate::workdir::Workdir;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::{FileSystem, OsFs};
use toolset_core::Result;

/// Shared state for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Filesystem every command goes through.
    pub fs: Arc<dyn FileSystem>,
    /// Resolved directories and runtime config.
    pub settings: Settings,
    /// Cancelled on Ctrl-C.
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Resolve settings from the CLI flags against the real filesystem.
    pub fn from_cli(cli: &Cli, cancel: CancellationToken) -> Result<Self> {
        let fs: Arc<dyn FileSystem> = Arc::new(OsFs::new());
        let settings = Settings::resolve(fs.as_ref(), cli.cache_dir.as_deref(), cli.spec_dir.as_deref())?;
        Ok(Self {
            fs,
            settings,
            cancel,
        })
    }

    /// Open the project in the spec directory and discover runtimes.
    pub async fn workdir(&self) -> Result<Workdir> {
        Workdir::load(
            Arc::clone(&self.fs),
            &self.settings.spec_dir,
            self.settings.registry(Arc::clone(&self.fs), self.cancel.clone()),
            self.cancel.clone(),
        )
        .await
    }
}

/// Run the parsed command, returning the process exit code.
pub async fn execute(cli: Cli, cancel: CancellationToken) -> std::result::Result<i32, CliError> {
    let ctx = CommandContext::from_cli(&cli, cancel)?;
    let json = cli.json;
    let format = |requested: OutputFormat| {
        if json { OutputFormat::Json } else { requested }
    };

    let output = match cli.command {
        Commands::Init { dir } => project::execute_init(&ctx, dir.as_deref())?,
        Commands::Add {
            runtime,
            module,
            alias,
            copy_from,
            tags,
        } => {
            let mut wd = ctx.workdir().await?;
            match (copy_from, runtime, module) {
                (Some(source), _, _) => project::execute_copy_from(&mut wd, &source, &tags).await?,
                (None, Some(runtime), Some(module)) => {
                    project::execute_add(&mut wd, &runtime, &module, alias.as_deref(), &tags).await?
                }
                _ => {
                    return Err(CliError::config("add needs <RUNTIME> <MODULE> or --copy-from")
                        .with_help("e.g. toolset add go golang.org/x/tools/cmd/goimports"));
                }
            }
        }
        Commands::Include { source, tags } => {
            let mut wd = ctx.workdir().await?;
            project::execute_include(&mut wd, &source, &tags).await?
        }
        Commands::Remove { name } => {
            let mut wd = ctx.workdir().await?;
            project::execute_remove(&mut wd, &name).await?
        }
        Commands::List { tags, output_format } => {
            let wd = ctx.workdir().await?;
            tools::execute_list(&wd, &tags, format(output_format))?
        }
        Commands::Sync { parallel, tags } => {
            let mut wd = ctx.workdir().await?;
            tools::execute_sync(&mut wd, parallel, &tags).await?
        }
        Commands::Run { name, args } => {
            let mut wd = ctx.workdir().await?;
            return tools::execute_run(&mut wd, &name, &args).await;
        }
        Commands::Upgrade { parallel, tags } => {
            let mut wd = ctx.workdir().await?;
            tools::execute_upgrade(&mut wd, parallel, &tags).await?
        }
        Commands::Info { output_format } => {
            let wd = ctx.workdir().await?;
            info::execute_info(&wd, format(output_format))?
        }
        Commands::Runtime { subcommand } => {
            let mut registry = ctx.settings.registry(Arc::clone(&ctx.fs), ctx.cancel.clone());
            registry.discover().await?;
            match subcommand {
                RuntimeCommands::List => info::execute_runtime_list(&registry, format(OutputFormat::Text))?,
                RuntimeCommands::Add { key } => info::execute_runtime_add(&mut registry, &key).await?,
            }
        }
        Commands::Version => info::execute_version(format(OutputFormat::Text))?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(EXIT_OK)
}

/// Serialize `data` inside the success envelope.
pub(crate) fn to_json<T: serde::Serialize>(data: T) -> Result<String> {
    serde_json::to_string_pretty(&crate::cli::OkEnvelope::new(data))
        .map_err(|e| toolset_core::Error::json(e, std::path::Path::new("<stdout>")))
}

#[cfg(test)]
pub(crate) mod fixture {
    use crate::registry::RuntimeRegistry;
    use crate::runtime::Runtime;
    use crate::runtime::stub::StubRuntime;
    use crate::workdir::Workdir;
    use std::path::Path;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use toolset_core::fs::MemoryFs;
    use toolset_tools_github::GitHubConfig;
    use toolset_tools_go::GoConfig;

    /// A fresh project at `/proj` whose only runtime is a stub keyed `go`.
    pub fn workdir() -> (Workdir, StubRuntime, MemoryFs) {
        let fs = MemoryFs::new();
        let stub = StubRuntime::new("go", Arc::new(fs.clone()), "/cache");
        let mut registry = RuntimeRegistry::new(
            Arc::new(fs.clone()),
            "/cache",
            GoConfig::default(),
            GitHubConfig::default(),
            CancellationToken::new(),
        );
        registry.insert(Runtime::Stub(stub.clone()));
        let wd = Workdir::init(
            Arc::new(fs.clone()),
            Path::new("/proj"),
            registry,
            CancellationToken::new(),
        )
        .unwrap();
        (wd, stub, fs)
    }
}

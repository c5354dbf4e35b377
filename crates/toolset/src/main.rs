//! toolset CLI application

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use tokio_util::sync::CancellationToken;
use toolset::cli::{Cli, EXIT_SIGINT, exit_code_for, render_error};
use toolset::commands;
use toolset::tracing::{TracingConfig, TracingFormat, init_tracing};

#[tokio::main]
async fn main() {
    // NOTE: tracing may be unusable during a panic, so the hook prints directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    let json_mode = cli.json;
    let format = if json_mode {
        TracingFormat::Json
    } else {
        cli.log_format
    };
    if let Err(e) = init_tracing(TracingConfig {
        format,
        level: cli.level.into(),
        ..Default::default()
    }) {
        eprintln!("{e:?}");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling");
            interrupt.cancel();
        }
    });

    let code = match commands::execute(cli, cancel.clone()).await {
        _ if cancel.is_cancelled() => EXIT_SIGINT,
        Ok(code) => code,
        Err(err) => {
            render_error(&err, json_mode);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

//! toolset - per-project developer toolchain manager
//!
//! A project declares the tools it needs in `.toolset.json`; toolset pins
//! them in `.toolset.lock.json`, installs them into a shared cache and runs
//! them on demand.
//!
//! - [`registry`] - runtime keys to installers, with Go toolchain auto-install
//! - [`runtime`] - the closed set of runtime plugins
//! - [`workdir`] - the orchestrator behind every command
//! - [`cli`] / [`commands`] - the `toolset` binary's surface

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing and exit codes.
pub mod cli;
/// Command implementations.
pub mod commands;
pub mod registry;
pub mod runtime;
pub mod settings;
/// Tracing setup for the binary.
pub mod tracing;
pub mod workdir;

pub use registry::RuntimeRegistry;
pub use runtime::Runtime;
pub use settings::Settings;
pub use toolset_core::{Error, Result};
pub use workdir::{SystemInfo, ToolState, Upgrade, Workdir};

//! Core types and utilities for toolset.
//!
//! This crate holds everything the runtime plugins and the workdir
//! orchestrator share:
//!
//! - [`Error`] / [`Result`] - the error taxonomy used across the workspace
//! - [`fs`] - filesystem abstraction with OS and in-memory backends
//! - [`version`] - the `name@version` identity with its `latest` sentinel
//! - [`spec`] - the spec, lock, include and remote documents
//! - [`stats`] - per-project last-use timestamps
//! - [`runtime`] - types every runtime plugin reports ([`runtime::ModuleInfo`], [`runtime::RunError`])
//! - [`http`] - HTTP clients with the shared timeouts and user agent
//! - [`remote`] - fetching remote spec documents over file, HTTP and git
//! - [`archive`], [`env`], [`paths`] - installer utilities

pub mod archive;
pub mod env;
mod error;
pub mod fs;
pub mod http;
pub mod paths;
pub mod remote;
pub mod runtime;
pub mod spec;
pub mod stats;
pub mod version;

pub use error::{Error, Result, ResultExt};

/// Version of the toolset crates, reported by `toolset version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every outgoing HTTP request.
#[must_use]
pub fn user_agent() -> String {
    format!("toolset/{VERSION}")
}

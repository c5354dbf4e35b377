//! Go module runtime for toolset.
//!
//! Installs Go-based tools (`golang.org/x/tools/cmd/goimports`,
//! `github.com/goreleaser/goreleaser/v2`, …) with `go install`, pinning
//! versions through the module proxy or, for private modules, through a
//! scratch `go get`. Also discovers and installs Go toolchains so a tool can
//! declare the compiler version it is built with (`go@1.23.4`).

mod exec;
pub mod modfile;
pub mod module;
pub mod proxy;
mod runtime;
pub mod toolchain;

pub use module::{GoModule, PrivatePatterns, program_name};
pub use proxy::ProxyClient;
pub use runtime::{GoConfig, GoRuntime};
pub use toolchain::{Toolchain, ToolchainSource};

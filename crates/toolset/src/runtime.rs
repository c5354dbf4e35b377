//! The closed set of runtime plugins.
//!
//! Every runtime answers the same installer contract. Dispatch is a plain
//! `match` per operation; adding a runtime means adding a variant.

use toolset_core::Result;
use toolset_core::runtime::ModuleInfo;
use toolset_tools_github::GitHubRuntime;
use toolset_tools_go::GoRuntime;

/// An installer for one tool ecosystem.
#[derive(Debug, Clone)]
pub enum Runtime {
    /// Go modules installed with a specific toolchain.
    Go(GoRuntime),
    /// Prebuilt binaries from GitHub releases.
    GitHub(GitHubRuntime),
    /// In-memory runtime for orchestrator tests.
    #[cfg(test)]
    Stub(stub::StubRuntime),
}

impl Runtime {
    /// Registry key (`go`, `go@1.23.4`, `gh`).
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Go(rt) => rt.version(),
            Self::GitHub(rt) => rt.version(),
            #[cfg(test)]
            Self::Stub(rt) => rt.version(),
        }
    }

    /// Validate `module` against the registry and pin its version.
    pub async fn parse(&self, module: &str) -> Result<String> {
        match self {
            Self::Go(rt) => rt.parse(module).await,
            Self::GitHub(rt) => rt.parse(module).await,
            #[cfg(test)]
            Self::Stub(rt) => rt.parse(module),
        }
    }

    /// Local view of `module`; never touches the network.
    pub fn get_module(&self, module: &str) -> Result<ModuleInfo> {
        match self {
            Self::Go(rt) => rt.get_module(module),
            Self::GitHub(rt) => rt.get_module(module),
            #[cfg(test)]
            Self::Stub(rt) => rt.get_module(module),
        }
    }

    /// Install `module`; a no-op when already installed.
    pub async fn install(&self, module: &str) -> Result<()> {
        match self {
            Self::Go(rt) => rt.install(module).await,
            Self::GitHub(rt) => rt.install(module).await,
            #[cfg(test)]
            Self::Stub(rt) => rt.install(module),
        }
    }

    /// Run the installed binary of `module`.
    pub async fn run(&self, module: &str, args: &[String]) -> Result<()> {
        match self {
            Self::Go(rt) => rt.run(module, args).await,
            Self::GitHub(rt) => rt.run(module, args).await,
            #[cfg(test)]
            Self::Stub(rt) => rt.run(module, args),
        }
    }

    /// Newest upstream module string and whether it differs from `module`.
    pub async fn get_latest(&self, module: &str) -> Result<(String, bool)> {
        match self {
            Self::Go(rt) => rt.get_latest(module).await,
            Self::GitHub(rt) => rt.get_latest(module).await,
            #[cfg(test)]
            Self::Stub(rt) => rt.get_latest(module),
        }
    }

    /// Delete the installed tool.
    pub fn remove(&self, module: &str) -> Result<()> {
        match self {
            Self::Go(rt) => rt.remove(module),
            Self::GitHub(rt) => rt.remove(module),
            #[cfg(test)]
            Self::Stub(rt) => rt.remove(module),
        }
    }
}

//! Error types for toolset operations

use crate::runtime::RunError;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for toolset operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Input does not follow the expected syntax
    #[error("invalid format '{input}': {message}")]
    #[diagnostic(code(toolset::validation::format))]
    InvalidFormat {
        /// The rejected input
        input: String,
        /// What was wrong with it
        message: String,
    },

    /// Version is not a valid semantic version
    #[error("version '{version}' is not a valid semver")]
    #[diagnostic(
        code(toolset::validation::semver),
        help("use a full release tag such as v1.2.3")
    )]
    NonSemver {
        /// The rejected version
        version: String,
    },

    /// Runtime key is not known and cannot be installed
    #[error("unsupported runtime: {0}")]
    #[diagnostic(code(toolset::validation::runtime), help("supported runtimes: go, go@<version>, gh"))]
    UnsupportedRuntime(String),

    /// Current OS/architecture has no matching release asset
    #[error("unsupported platform: {os}/{arch}")]
    #[diagnostic(code(toolset::validation::platform))]
    UnsupportedPlatform {
        /// Operating system
        os: String,
        /// CPU architecture
        arch: String,
    },

    /// Archive extension has no extractor
    #[error("unsupported archive: {}", path.display())]
    #[diagnostic(code(toolset::validation::archive))]
    UnsupportedArchive {
        /// Path of the archive
        path: Box<Path>,
    },

    /// Remote source uses an unknown scheme
    #[error("unsupported source: {0}")]
    #[diagnostic(
        code(toolset::validation::source),
        help("use a file path, http(s)://, git+ssh:// or git+https:// source")
    )]
    UnsupportedSource(String),

    /// No tool in the lock matches the requested name
    #[error("tool '{0}' not found in spec")]
    #[diagnostic(code(toolset::validation::tool), help("run 'toolset list' to see available tools"))]
    ToolNotFound(String),

    /// Runtime key is not registered
    #[error("runtime '{0}' not found")]
    #[diagnostic(code(toolset::state::runtime))]
    RuntimeNotFound(String),

    /// `init` found an existing spec
    #[error("spec already exists: {}", path.display())]
    #[diagnostic(code(toolset::state::spec_exists))]
    SpecExists {
        /// Path of the existing spec
        path: Box<Path>,
    },

    /// Tool binary is missing from the cache
    #[error("tool '{0}' is not installed")]
    #[diagnostic(code(toolset::state::not_installed), help("run 'toolset sync'"))]
    ToolNotInstalled(String),

    /// Include graph revisits a source
    #[error("include cycle detected at {0}")]
    #[diagnostic(code(toolset::state::include_cycle))]
    IncludeCycle(String),

    /// Registry does not know the module
    #[error("unknown module: {0}")]
    #[diagnostic(code(toolset::external::unknown_module))]
    UnknownModule(String),

    /// HTTP request failed or returned a non-success status
    #[error("request to {url} failed: {message}")]
    #[diagnostic(code(toolset::external::network))]
    Network {
        /// Requested URL
        url: String,
        /// Failure description
        message: String,
    },

    /// `git clone` failed
    #[error("git clone of {addr} failed: {message}")]
    #[diagnostic(code(toolset::external::git))]
    GitClone {
        /// Repository address
        addr: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// A helper subprocess (install, env, mod init, get) failed
    #[error("{command} failed: {message}")]
    #[diagnostic(code(toolset::external::process))]
    Process {
        /// Command line that was run
        command: String,
        /// Captured stderr or spawn error
        message: String,
    },

    /// Archive could not be read or unpacked
    #[error("failed to extract {}: {message}", path.display())]
    #[diagnostic(code(toolset::external::archive))]
    Archive {
        /// Archive path
        path: Box<Path>,
        /// Failure description
        message: String,
    },

    /// Tool ran and exited with a non-zero status
    #[error(transparent)]
    #[diagnostic(code(toolset::exec::run))]
    Run(#[from] RunError),

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(toolset::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// JSON document could not be encoded or decoded
    #[error("invalid JSON in {}: {source}", path.display())]
    #[diagnostic(code(toolset::json))]
    Json {
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
        /// Document path or source
        path: Box<Path>,
    },

    /// Operation was cancelled
    #[error("operation cancelled")]
    #[diagnostic(code(toolset::cancelled))]
    Cancelled,

    /// Lower-level error wrapped with a contextual prefix
    #[error("{message}: {source}")]
    #[diagnostic(code(toolset::context))]
    Context {
        /// Context prefix
        message: String,
        /// The wrapped error
        #[source]
        source: Box<Error>,
    },

    /// Several independent failures, e.g. from parallel installs
    #[error("{}", join_errors(.0))]
    #[diagnostic(code(toolset::multiple))]
    Multiple(Vec<Error>),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Create an invalid format error
    pub fn invalid_format(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create a non-semver error
    pub fn non_semver(version: impl Into<String>) -> Self {
        Self::NonSemver {
            version: version.into(),
        }
    }

    /// Create an unsupported archive error
    pub fn unsupported_archive(path: &Path) -> Self {
        Self::UnsupportedArchive { path: path.into() }
    }

    /// Create a spec-exists error
    pub fn spec_exists(path: &Path) -> Self {
        Self::SpecExists { path: path.into() }
    }

    /// Create a network error
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a git clone error
    pub fn git_clone(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GitClone {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Create a subprocess error
    pub fn process(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create an archive extraction error
    pub fn archive(path: &Path, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(PathBuf::into_boxed_path),
            operation: operation.into(),
        }
    }

    /// Create a JSON error for the document at `path`
    pub fn json(source: serde_json::Error, path: &Path) -> Self {
        Self::Json {
            source,
            path: path.into(),
        }
    }

    /// Wrap this error with a contextual prefix
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Combine several errors; a single error is returned unwrapped.
    #[must_use]
    pub fn join(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// The innermost error beneath any [`Error::Context`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether this error reports a missing tool binary.
    #[must_use]
    pub fn is_not_installed(&self) -> bool {
        matches!(self.root(), Self::ToolNotInstalled(_))
    }

    /// Exit code of the tool process, if this error came from running one.
    #[must_use]
    pub fn run_exit_code(&self) -> Option<i32> {
        match self.root() {
            Self::Run(run) => Some(run.exit_code),
            _ => None,
        }
    }
}

/// Result type alias for toolset operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adds contextual prefixes to errors at layer boundaries.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with a fixed message.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Wrap the error, if any, with a lazily built message.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

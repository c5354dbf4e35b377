//! Types shared by every runtime plugin.
//!
//! Each runtime answers questions about a tool through [`ModuleInfo`], reports
//! a failed tool process through [`RunError`], and uses [`Platform`] to pick
//! the artifact matching the host.

use crate::fs::FileSystem;
use crate::version::ModVer;
use crate::{Error, Result};
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A runtime's view of one tool at a point in time. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// Program (binary) name.
    pub name: String,
    /// Resolved module identity.
    pub mod_ver: ModVer,
    /// Directory holding the binary.
    pub bin_dir: PathBuf,
    /// Full path of the binary.
    pub bin_path: PathBuf,
    /// Whether `bin_path` exists.
    pub is_installed: bool,
    /// Whether the module bypasses the public registry.
    pub is_private: bool,
}

impl ModuleInfo {
    /// Build the projection, probing `bin_path` through `fs`.
    #[must_use]
    pub fn probe(
        fs: &dyn FileSystem,
        name: impl Into<String>,
        mod_ver: ModVer,
        bin_dir: PathBuf,
        is_private: bool,
    ) -> Self {
        let name = name.into();
        let bin_path = bin_dir.join(executable_name(&name));
        Self {
            is_installed: fs.exists(&bin_path),
            name,
            mod_ver,
            bin_dir,
            bin_path,
            is_private,
        }
    }
}

/// A tool process exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (exit code {exit_code})")]
pub struct RunError {
    /// Exit code of the child, `-1` when killed by a signal.
    pub exit_code: i32,
    /// Diagnostic from the process layer.
    pub message: String,
}

impl RunError {
    /// Create a run error.
    pub fn new(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }
}

/// Run `bin` with `args`, wiring stdin/stdout/stderr through.
///
/// The child is killed if `cancel` fires. A non-zero exit becomes
/// [`Error::Run`].
pub async fn run_binary<I, S>(
    bin: &Path,
    args: I,
    envs: &[(String, String)],
    cancel: &CancellationToken,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!(bin = %bin.display(), "Running tool");
    let mut child = Command::new(bin)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::process(bin.display().to_string(), e.to_string()))?;

    let status = tokio::select! {
        biased;
        // `kill_on_drop` reaps the child
        () = cancel.cancelled() => return Err(Error::Cancelled),
        status = child.wait() => status
            .map_err(|e| Error::process(bin.display().to_string(), e.to_string()))?,
    };

    if status.success() {
        return Ok(());
    }
    Err(RunError::new(status.code().unwrap_or(-1), status.to_string()).into())
}

/// Name of an executable on the host (`.exe` appended on Windows).
#[must_use]
pub fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// macOS
    Darwin,
    /// Linux
    Linux,
    /// Windows
    Windows,
    /// FreeBSD
    FreeBsd,
}

impl Os {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            "windows" => Some(Self::Windows),
            "freebsd" => Some(Self::FreeBsd),
            _ => None,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::FreeBsd => "freebsd",
        })
    }
}

/// CPU architecture, in Go naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// x86-64
    Amd64,
    /// 64-bit ARM
    Arm64,
    /// 32-bit x86
    I386,
    /// 32-bit ARM
    Arm,
}

impl Arch {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Some(Self::Amd64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            "386" | "x86" | "i386" | "i686" => Some(Self::I386),
            "arm" | "armv6" | "armv7" => Some(Self::Arm),
            _ => None,
        }
    }

    /// Spellings release assets commonly use for this architecture.
    #[must_use]
    pub fn alternates(self) -> &'static [&'static str] {
        match self {
            Self::Amd64 => &["amd64", "x86_64"],
            Self::Arm64 => &["arm64", "aarch64"],
            Self::I386 => &["386", "x86", "i386"],
            Self::Arm => &["armv6", "armv7", "arm"],
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::I386 => "386",
            Self::Arm => "arm",
        })
    }
}

/// Platform identifier combining OS and architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system
    pub os: Os,
    /// CPU architecture
    pub arch: Arch,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The host platform, or [`Error::UnsupportedPlatform`].
    pub fn current() -> Result<Self> {
        let unsupported = || Error::UnsupportedPlatform {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        };
        let os = Os::parse(std::env::consts::OS).ok_or_else(unsupported)?;
        let arch = Arch::parse(std::env::consts::ARCH).ok_or_else(unsupported)?;
        Ok(Self { os, arch })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_probe() {
        let fs = MemoryFs::new();
        let mv = ModVer::parse("golang.org/x/tools/cmd/goimports@v0.28.0").unwrap();
        let dir = PathBuf::from("/cache/go1.23.4/goimports___v0.28.0");

        let info = ModuleInfo::probe(&fs, "goimports", mv.clone(), dir.clone(), false);
        assert!(!info.is_installed);
        assert_eq!(info.bin_path, dir.join(executable_name("goimports")));

        fs.create_dir_all(&dir).unwrap();
        fs.write(&info.bin_path, b"bin").unwrap();
        let info = ModuleInfo::probe(&fs, "goimports", mv, dir, false);
        assert!(info.is_installed);
    }

    #[test]
    fn test_arch_alternates() {
        assert_eq!(Arch::parse("x86_64"), Some(Arch::Amd64));
        assert_eq!(Arch::parse("aarch64"), Some(Arch::Arm64));
        assert_eq!(Arch::Arm64.alternates(), &["arm64", "aarch64"]);
        assert_eq!(Arch::parse("sparc"), None);
    }

    #[test]
    fn test_platform_display() {
        assert_eq!(
            Platform::new(Os::Linux, Arch::Amd64).to_string(),
            "linux-amd64"
        );
        assert_eq!(Os::parse("macos"), Some(Os::Darwin));
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError::new(2, "exit status: 2");
        assert_eq!(err.to_string(), "exit status: 2 (exit code 2)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_binary_exit_code() {
        let cancel = CancellationToken::new();
        let err = run_binary(Path::new("/bin/sh"), ["-c", "exit 7"], &[], &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.run_exit_code(), Some(7));

        run_binary(Path::new("/bin/sh"), ["-c", "exit 0"], &[], &cancel)
            .await
            .unwrap();
    }
}

//! The Go module runtime.
//!
//! Tools are Go packages installed with `go install <pkg>@<version>` into
//! `<cache>/go<goVersion>/<program>___<version>/<program>`.

use crate::exec;
use crate::modfile;
use crate::module::{GoModule, PrivatePatterns};
use crate::proxy::{DEFAULT_PROXY, ProxyClient};
use crate::toolchain::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolset_core::fs::FileSystem;
use toolset_core::runtime::{ModuleInfo, run_binary};
use toolset_core::version::Version;
use toolset_core::{Error, Result, ResultExt, env};
use tracing::{debug, info};

/// Module name of the scratch project used for private resolution.
const SCRATCH_MODULE: &str = "toolset-resolve";

/// Proxy and privacy settings, normally read from the Go environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoConfig {
    /// Module proxy base URL.
    pub proxy: String,
    /// Comma-separated private module patterns.
    pub private: String,
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            proxy: DEFAULT_PROXY.to_string(),
            private: String::new(),
        }
    }
}

impl GoConfig {
    /// Read `GOPROXY` (first HTTP entry) and `GOPRIVATE`, falling back to
    /// `GONOPROXY`.
    #[must_use]
    pub fn from_env() -> Self {
        let proxy = std::env::var("GOPROXY")
            .ok()
            .and_then(|list| {
                list.split([',', '|'])
                    .map(str::trim)
                    .find(|entry| entry.starts_with("http://") || entry.starts_with("https://"))
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| DEFAULT_PROXY.to_string());
        Self {
            proxy,
            private: env::first_set(&["GOPRIVATE", "GONOPROXY"]).unwrap_or_default(),
        }
    }
}

/// Installs and runs Go tools against one toolchain.
#[derive(Debug, Clone)]
pub struct GoRuntime {
    toolchain: Toolchain,
    cache_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    proxy: ProxyClient,
    private: PrivatePatterns,
    cancel: CancellationToken,
}

impl GoRuntime {
    /// Create a runtime for `toolchain` installing into `cache_dir`.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        toolchain: Toolchain,
        cache_dir: impl Into<PathBuf>,
        config: &GoConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            toolchain,
            cache_dir: cache_dir.into(),
            fs,
            proxy: ProxyClient::new(&config.proxy)?,
            private: PrivatePatterns::parse(&config.private),
            cancel,
        })
    }

    /// Registry key: `go` or `go@<ver>`.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.toolchain.key
    }

    /// The toolchain this runtime drives.
    #[must_use]
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// `<cache>/go<goVersion>`
    #[must_use]
    pub fn tools_dir(&self) -> PathBuf {
        self.cache_dir.join(format!("go{}", self.toolchain.version))
    }

    fn bin_dir(&self, module: &GoModule) -> PathBuf {
        self.tools_dir()
            .join(format!("{}___{}", module.program, module.version))
    }

    /// Whether `path` bypasses the proxy.
    #[must_use]
    pub fn is_private(&self, path: &str) -> bool {
        self.private.matches(path)
    }

    /// Validate `module` and pin it to a concrete version.
    pub async fn parse(&self, module: &str) -> Result<String> {
        let parsed = GoModule::parse(module)?;
        let version = self.resolve(&parsed).await?;
        Ok(format!("{}@{version}", parsed.path))
    }

    async fn resolve(&self, module: &GoModule) -> Result<String> {
        if self.is_private(&module.path) {
            return self
                .resolve_private(module)
                .await
                .with_context(|| format!("resolve private module {}", module.path));
        }
        self.proxy
            .resolve(&module.path, &module.version, &self.cancel)
            .await
    }

    /// Resolve through `go get` in a scratch project, bypassing the proxy.
    async fn resolve_private(&self, module: &GoModule) -> Result<String> {
        let scratch = tempfile::Builder::new()
            .prefix("toolset-resolve-")
            .tempdir()
            .map_err(|e| Error::io(e, None, "create scratch project"))?;
        let dir = scratch.path();
        debug!(module = %module.path, dir = %dir.display(), "Resolving private module");

        let target = format!("{}@{}", module.path, module.version);
        let overrides = self.build_cache_overrides();
        self.go(&["mod", "init", SCRATCH_MODULE], Some(dir), &overrides)
            .await?;
        self.go(&["get", target.as_str()], Some(dir), &overrides)
            .await?;

        let go_mod = dir.join("go.mod");
        let content = tokio::fs::read_to_string(&go_mod)
            .await
            .map_err(|e| Error::io(e, Some(go_mod.clone()), "read go.mod"))?;
        let requires = modfile::requires(&content);
        modfile::version_for(&requires, &module.path)
            .map(ToString::to_string)
            .ok_or_else(|| Error::UnknownModule(target))
    }

    /// Local view of `module`.
    pub fn get_module(&self, module: &str) -> Result<ModuleInfo> {
        let parsed = GoModule::parse(module)?;
        Ok(ModuleInfo::probe(
            self.fs.as_ref(),
            parsed.program.clone(),
            parsed.mod_ver(),
            self.bin_dir(&parsed),
            self.is_private(&parsed.path),
        ))
    }

    /// `go install` the module unless its binary is already present.
    pub async fn install(&self, module: &str) -> Result<()> {
        let info = self.get_module(module)?;
        if info.is_installed {
            debug!(%module, "Already installed");
            return Ok(());
        }

        info!(%module, runtime = %self.version(), "Installing Go tool");
        self.fs
            .create_dir_all(&info.bin_dir)
            .map_err(|e| Error::io(e, Some(info.bin_dir.clone()), "create tool directory"))?;

        let gobin = info.bin_dir.display().to_string();
        let mut overrides = vec![("GOBIN", gobin.as_str())];
        let build_cache = self.build_cache_overrides();
        overrides.extend(build_cache.iter().copied());
        let target = info.mod_ver.to_string();
        self.go(&["install", target.as_str()], None, &overrides)
            .await
            .with_context(|| format!("install {target}"))?;

        if !self.fs.exists(&info.bin_path) {
            return Err(Error::process(
                format!("go install {target}"),
                format!("binary {} was not produced", info.bin_path.display()),
            ));
        }
        Ok(())
    }

    /// Run the installed binary.
    pub async fn run(&self, module: &str, args: &[String]) -> Result<()> {
        let info = self.get_module(module)?;
        if !info.is_installed {
            return Err(Error::ToolNotInstalled(info.mod_ver.to_string()));
        }
        run_binary(&info.bin_path, args, &[], &self.cancel).await
    }

    /// Latest upstream version of `module` and whether it differs.
    pub async fn get_latest(&self, module: &str) -> Result<(String, bool)> {
        let parsed = GoModule::parse(module)?;
        let latest = GoModule {
            version: Version::Latest,
            ..parsed.clone()
        };
        let version = self.resolve(&latest).await?;
        let changed = parsed.version != Version::Exact(version.clone());
        Ok((format!("{}@{version}", parsed.path), changed))
    }

    /// Delete the tool's directory.
    pub fn remove(&self, module: &str) -> Result<()> {
        let info = self.get_module(module)?;
        if !info.is_installed {
            return Err(Error::ToolNotInstalled(info.mod_ver.to_string()));
        }
        info!(%module, dir = %info.bin_dir.display(), "Removing Go tool");
        self.fs
            .remove_all(&info.bin_dir)
            .map_err(|e| Error::io(e, Some(info.bin_dir.clone()), "remove tool"))
    }

    fn build_cache_overrides(&self) -> Vec<(&'static str, &str)> {
        self.toolchain
            .build_cache
            .as_deref()
            .and_then(Path::to_str)
            .map(|dir| vec![("GOCACHE", dir)])
            .unwrap_or_default()
    }

    async fn go(&self, args: &[&str], dir: Option<&Path>, overrides: &[(&str, &str)]) -> Result<String> {
        exec::go(&self.toolchain.go_bin, args, dir, overrides, &self.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolset_core::fs::MemoryFs;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime(fs: &MemoryFs, proxy: &str, private: &str) -> GoRuntime {
        GoRuntime::new(
            Arc::new(fs.clone()),
            Toolchain::local(Path::new("/cache"), "1.23.4"),
            "/cache",
            &GoConfig {
                proxy: proxy.to_string(),
                private: private.to_string(),
            },
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_get_module_layout() {
        let fs = MemoryFs::new();
        let rt = runtime(&fs, DEFAULT_PROXY, "corp.example.com");

        let info = rt
            .get_module("golang.org/x/tools/cmd/goimports@v0.28.0")
            .unwrap();
        assert_eq!(info.name, "goimports");
        assert_eq!(
            info.bin_dir,
            PathBuf::from("/cache/go1.23.4/goimports___v0.28.0")
        );
        assert!(!info.is_installed);
        assert!(!info.is_private);

        assert!(rt.get_module("corp.example.com/lint@v1.0.0").unwrap().is_private);
    }

    #[tokio::test]
    async fn test_parse_pins_latest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/golang.org/x/tools/cmd/goimports/@latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/golang.org/x/tools/cmd/@latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/golang.org/x/tools/@latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Version":"v0.28.0"}"#))
            .mount(&server)
            .await;

        let fs = MemoryFs::new();
        let rt = runtime(&fs, &server.uri(), "");
        assert_eq!(
            rt.parse("golang.org/x/tools/cmd/goimports").await.unwrap(),
            "golang.org/x/tools/cmd/goimports@v0.28.0"
        );

        let (latest, changed) = rt
            .get_latest("golang.org/x/tools/cmd/goimports@v0.27.0")
            .await
            .unwrap();
        assert_eq!(latest, "golang.org/x/tools/cmd/goimports@v0.28.0");
        assert!(changed);

        let (_, changed) = rt
            .get_latest("golang.org/x/tools/cmd/goimports@v0.28.0")
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_run_and_remove_require_install() {
        let fs = MemoryFs::new();
        let rt = runtime(&fs, DEFAULT_PROXY, "");
        let module = "mvdan.cc/gofumpt@v0.7.0";

        let err = rt.run(module, &[]).await.unwrap_err();
        assert!(err.is_not_installed());
        assert!(rt.remove(module).unwrap_err().is_not_installed());

        let info = rt.get_module(module).unwrap();
        fs.create_dir_all(&info.bin_dir).unwrap();
        fs.write(&info.bin_path, b"bin").unwrap();
        rt.remove(module).unwrap();
        assert!(!fs.exists(&info.bin_dir));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("GOPROXY", Some("direct")),
                ("GOPRIVATE", None),
                ("GONOPROXY", Some("corp.example.com")),
            ],
            || {
                let cfg = GoConfig::from_env();
                assert_eq!(cfg.proxy, DEFAULT_PROXY);
                assert_eq!(cfg.private, "corp.example.com");
            },
        );
        temp_env::with_var("GOPROXY", Some("https://goproxy.io,direct"), || {
            assert_eq!(GoConfig::from_env().proxy, "https://goproxy.io");
        });
    }
}

//! Go module descriptors and private-module patterns.

use glob::{MatchOptions, Pattern};
use toolset_core::version::{ModVer, Version};
use toolset_core::{Error, Result};

/// A parsed `<module-path>[@<version>]` with its program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    /// Full package path, e.g. `golang.org/x/tools/cmd/goimports`.
    pub path: String,
    /// Requested version.
    pub version: Version,
    /// Name of the binary `go install` produces.
    pub program: String,
}

impl GoModule {
    /// Parse a module string. A missing version means `latest`.
    pub fn parse(s: &str) -> Result<Self> {
        let mod_ver = ModVer::parse(s)?;
        let path = mod_ver.name().trim_end_matches('/').to_string();
        if path.is_empty() || path.starts_with('/') || path.contains(char::is_whitespace) {
            return Err(Error::invalid_format(s, "expected <module-path>[@<version>]"));
        }
        Ok(Self {
            program: program_name(&path).to_string(),
            version: mod_ver.version_kind().clone(),
            path,
        })
    }

    /// Identity of this module.
    #[must_use]
    pub fn mod_ver(&self) -> ModVer {
        match &self.version {
            Version::Latest => ModVer::latest(self.path.clone()),
            Version::Exact(v) => ModVer::new(self.path.clone(), v)
                .unwrap_or_else(|_| ModVer::latest(self.path.clone())),
        }
    }

    /// Copy with a concrete version.
    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Version::Exact(version.into()),
            ..self.clone()
        }
    }
}

/// Binary name `go install` derives from a package path.
///
/// `/cmd/<name>` wins; a trailing major-version element (`v2`, `v3`, …)
/// falls back to the element before it.
#[must_use]
pub fn program_name(path: &str) -> &str {
    if let Some((_, after)) = path.rsplit_once("/cmd/") {
        return after.rsplit('/').next().unwrap_or(after);
    }

    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or(path);
    if is_major_suffix(last)
        && let Some(prev) = segments.next()
    {
        return prev;
    }
    last
}

fn is_major_suffix(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Comma-separated glob patterns selecting modules that bypass the proxy.
///
/// Each pattern is matched against every leading element prefix of a module
/// path, so `corp.example.com` covers `corp.example.com/tools/cmd/lint`.
#[derive(Debug, Clone, Default)]
pub struct PrivatePatterns(Vec<Pattern>);

impl PrivatePatterns {
    /// Parse a `GOPRIVATE`-style list. Invalid globs are ignored.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .filter_map(|p| Pattern::new(p.trim_end_matches('/')).ok())
                .collect(),
        )
    }

    /// Whether no pattern is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `path` matches any pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let prefixes: Vec<&str> = path
            .match_indices('/')
            .map(|(i, _)| &path[..i])
            .chain(std::iter::once(path))
            .collect();
        self.0.iter().any(|pattern| {
            prefixes
                .iter()
                .any(|prefix| pattern.matches_with(prefix, options))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name() {
        assert_eq!(program_name("golang.org/x/tools/cmd/goimports"), "goimports");
        assert_eq!(program_name("github.com/goreleaser/goreleaser/v2"), "goreleaser");
        assert_eq!(program_name("github.com/golangci/golangci-lint/cmd/golangci-lint"), "golangci-lint");
        assert_eq!(program_name("mvdan.cc/gofumpt"), "gofumpt");
        assert_eq!(program_name("github.com/org/vendor"), "vendor");
        assert_eq!(program_name("example.com/tool/v"), "v");
    }

    #[test]
    fn test_parse() {
        let m = GoModule::parse("golang.org/x/tools/cmd/goimports").unwrap();
        assert_eq!(m.program, "goimports");
        assert!(m.version.is_latest());

        let m = GoModule::parse("github.com/goreleaser/goreleaser/v2@v2.4.8").unwrap();
        assert_eq!(m.program, "goreleaser");
        assert_eq!(m.version, Version::Exact("v2.4.8".into()));
        assert_eq!(m.mod_ver().to_string(), "github.com/goreleaser/goreleaser/v2@v2.4.8");

        assert!(GoModule::parse("a@b@c").is_err());
        assert!(GoModule::parse("@v1.0.0").is_err());
    }

    #[test]
    fn test_private_patterns() {
        let patterns = PrivatePatterns::parse("corp.example.com,*.internal.dev/team");
        assert!(patterns.matches("corp.example.com/tools/cmd/lint"));
        assert!(patterns.matches("git.internal.dev/team/gen"));
        assert!(!patterns.matches("git.internal.dev/other/gen"));
        assert!(!patterns.matches("golang.org/x/tools"));
        assert!(!patterns.matches("corp.example.com.evil/x"));
        assert!(PrivatePatterns::parse(" , ").is_empty());
    }
}

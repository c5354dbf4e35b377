//! Module version identity.
//!
//! A [`ModVer`] is the immutable pair `{name, version}` whose canonical string
//! form is `name@version`. The version is either a concrete literal or the
//! [`Version::Latest`] sentinel; the legacy on-disk spelling of the sentinel
//! (`__latest_version__`) only appears at the persistence boundary.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Legacy persisted spelling of the `latest` sentinel.
pub const LATEST_SENTINEL: &str = "__latest_version__";

/// Display spelling of the `latest` sentinel.
pub const LATEST: &str = "latest";

/// A concrete version or the `latest` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// Resolve to the newest upstream version.
    Latest,
    /// A concrete version literal such as `v1.2.3`.
    Exact(String),
}

impl Version {
    /// Parse a user-written version; `latest` and the legacy sentinel map to
    /// [`Version::Latest`]. Empty input is rejected.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Err(Error::invalid_format(s, "version must not be empty")),
            LATEST | LATEST_SENTINEL => Ok(Self::Latest),
            other => Ok(Self::Exact(other.to_string())),
        }
    }

    /// Whether this is the sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Spelling used when persisting.
    #[must_use]
    pub fn as_persisted(&self) -> &str {
        match self {
            Self::Latest => LATEST_SENTINEL,
            Self::Exact(v) => v,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_persisted())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Immutable `{name, version}` identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModVer {
    name: String,
    version: Version,
}

impl ModVer {
    /// Create an identity. An empty version is rejected.
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_format(
                format!("@{version}"),
                "module name must not be empty",
            ));
        }
        Ok(Self {
            version: Version::parse(version)
                .map_err(|_| Error::invalid_format(&name, "version must not be empty"))?,
            name,
        })
    }

    /// Identity pinned to `latest`.
    #[must_use]
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Version::Latest,
        }
    }

    /// Parse `name[@version]`; a missing version means `latest`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('@').collect();
        match parts.as_slice() {
            [name] => Self::new(*name, LATEST),
            [name, version] => Self::new(*name, version),
            _ => Err(Error::invalid_format(s, "expected <name>[@<version>]")),
        }
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version literal, or `latest` for the sentinel.
    #[must_use]
    pub fn version(&self) -> String {
        self.version.to_string()
    }

    /// Structured version.
    #[must_use]
    pub fn version_kind(&self) -> &Version {
        &self.version
    }

    /// Whether the version is the sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version.is_latest()
    }

    /// Copy of this identity with the sentinel version.
    #[must_use]
    pub fn as_latest(&self) -> Self {
        Self::latest(self.name.clone())
    }

    /// Copy of this identity with a different concrete version.
    pub fn with_version(&self, version: &str) -> Result<Self> {
        Self::new(self.name.clone(), version)
    }
}

impl fmt::Display for ModVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl std::str::FromStr for ModVer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

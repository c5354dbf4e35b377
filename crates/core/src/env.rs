//! Environment scrubbing for toolchain subprocesses.
//!
//! Host configuration for the Go toolchain (target OS/arch, compiler flags,
//! search paths) must not leak into tool installs. Everything in
//! [`SCRUBBED`] is removed; the variables in [`PASSTHROUGH`] survive even
//! though they belong to the toolchain. `GOTOOLCHAIN=local` is always set so
//! the toolchain never downloads a different version of itself.

/// Toolchain/build variables removed before spawning the toolchain.
pub const SCRUBBED: &[&str] = &[
    "AR",
    "CC",
    "CGO_CFLAGS",
    "CGO_CPPFLAGS",
    "CGO_CXXFLAGS",
    "CGO_ENABLED",
    "CGO_FFLAGS",
    "CGO_LDFLAGS",
    "CXX",
    "FC",
    "GCCGO",
    "GO111MODULE",
    "GO386",
    "GOAMD64",
    "GOARCH",
    "GOARM",
    "GOARM64",
    "GOBIN",
    "GOENV",
    "GOFLAGS",
    "GOHOSTARCH",
    "GOHOSTOS",
    "GOINSECURE",
    "GOMIPS",
    "GOMIPS64",
    "GOMODCACHE",
    "GOOS",
    "GOPATH",
    "GOPPC64",
    "GORISCV64",
    "GOROOT",
    "GOTMPDIR",
    "GOTOOLCHAIN",
    "GOTOOLDIR",
    "GOVCS",
    "GOWASM",
    "GOWORK",
    "PKG_CONFIG",
];

/// Toolchain variables that pass through untouched.
pub const PASSTHROUGH: &[&str] = &[
    "GOCACHE",
    "GOCACHEPROG",
    "GOEXPERIMENT",
    "GONOPROXY",
    "GONOSUMDB",
    "GOPRIVATE",
    "GOPROXY",
    "GOSUMDB",
    "GOTELEMETRY",
];

/// Whether `key` is removed by [`scrub`].
#[must_use]
pub fn is_scrubbed(key: &str) -> bool {
    SCRUBBED.contains(&key) && !PASSTHROUGH.contains(&key)
}

/// Scrub `vars`, force `GOTOOLCHAIN=local` and apply `overrides` last.
///
/// The result is sorted by key; later entries win on duplicates.
#[must_use]
pub fn scrub<I, K, V>(vars: I, overrides: &[(&str, &str)]) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut env: std::collections::BTreeMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, _)| !is_scrubbed(k))
        .collect();
    env.insert("GOTOOLCHAIN".to_string(), "local".to_string());
    for (k, v) in overrides {
        env.insert((*k).to_string(), (*v).to_string());
    }
    env.into_iter().collect()
}

/// [`scrub`] applied to the current process environment.
#[must_use]
pub fn scrubbed_env(overrides: &[(&str, &str)]) -> Vec<(String, String)> {
    scrub(std::env::vars(), overrides)
}

/// Value of the first set, non-empty variable among `keys`.
#[must_use]
pub fn first_set(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.is_empty())
}

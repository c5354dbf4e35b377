//! Spec and lock documents.
//!
//! The spec (`.toolset.json`) is the user's intent: which tools to install
//! and which remote tool lists to include. The lock (`.toolset.lock.json`)
//! is the resolved closure derived from it: every spec tool plus every tool
//! contributed by a fetched remote, together with the exact remote documents
//! so the closure can be reproduced.
//!
//! ## Tool identity
//!
//! Two tools are the same when their runtime matches and their module path
//! (the part before `@`) matches. Versions do not take part in identity, so
//! an upgrade replaces a tool in place.

use crate::fs::{self, FileSystem};
use crate::remote;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Filename of the spec document.
pub const SPEC_FILE: &str = ".toolset.json";

/// Filename of the lock document.
pub const LOCK_FILE: &str = ".toolset.lock.json";

/// One declared tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// Runtime key selecting the installer (`go`, `go@1.23.4`, `gh`).
    pub runtime: String,
    /// Canonical module string, `path@version`.
    pub module: String,
    /// Optional stable binary name exposed in the cache root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Free-form selectors.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Tool {
    /// Create a tool without alias or tags.
    #[must_use]
    pub fn new(runtime: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            module: module.into(),
            alias: None,
            tags: Vec::new(),
        }
    }

    /// Set the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Module path without the version.
    #[must_use]
    pub fn module_path(&self) -> &str {
        module_path(&self.module)
    }

    /// Stable identifier `runtime:module-path`, used as the stats key.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.runtime, self.module_path())
    }

    /// Identity check: same runtime and same module path.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.runtime == other.runtime && self.module_path() == other.module_path()
    }

    /// Whether any of this tool's tags appear in `tags`.
    #[must_use]
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Append `extra` tags that are not yet present.
    pub fn merge_tags(&mut self, extra: &[String]) {
        merge_tags(&mut self.tags, extra);
    }
}

/// The module path portion of `path@version`.
#[must_use]
pub fn module_path(module: &str) -> &str {
    module.split_once('@').map_or(module, |(path, _)| path)
}

/// Append tags from `extra` that `tags` does not contain yet, preserving order.
pub fn merge_tags(tags: &mut Vec<String>, extra: &[String]) {
    for tag in extra {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
}

/// An ordered set of tools keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tools(Vec<Tool>);

impl Tools {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tool` unless an identity-equal tool exists. Returns whether it was added.
    pub fn add(&mut self, tool: Tool) -> bool {
        if self.find(&tool).is_some() {
            return false;
        }
        self.0.push(tool);
        true
    }

    /// Replace the identity-equal tool in place, or append.
    pub fn upsert(&mut self, tool: Tool) {
        match self.0.iter_mut().find(|t| t.is_same(&tool)) {
            Some(existing) => *existing = tool,
            None => self.0.push(tool),
        }
    }

    /// Remove the identity-equal tool. Returns whether one was removed.
    pub fn remove(&mut self, tool: &Tool) -> bool {
        let before = self.0.len();
        self.0.retain(|t| !t.is_same(tool));
        self.0.len() != before
    }

    /// Identity-equal tool, if present.
    #[must_use]
    pub fn find(&self, tool: &Tool) -> Option<&Tool> {
        self.0.iter().find(|t| t.is_same(tool))
    }

    /// All tools when `tags` is empty; otherwise the tools sharing at least one tag.
    #[must_use]
    pub fn filter(&self, tags: &[String]) -> Self {
        if tags.is_empty() {
            return self.clone();
        }
        Self(
            self.0
                .iter()
                .filter(|t| t.has_any_tag(tags))
                .cloned()
                .collect(),
        )
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Tool> {
        self.0.iter()
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tools as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Tool] {
        &self.0
    }
}

impl FromIterator<Tool> for Tools {
    fn from_iter<I: IntoIterator<Item = Tool>>(iter: I) -> Self {
        let mut tools = Self::new();
        for tool in iter {
            tools.add(tool);
        }
        tools
    }
}

impl IntoIterator for Tools {
    type Item = Tool;
    type IntoIter = std::vec::IntoIter<Tool>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tools {
    type Item = &'a Tool;
    type IntoIter = std::slice::Iter<'a, Tool>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Reference from a spec to a remote spec. Equality is by `src` alone.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct Include {
    /// Source URI (file path, http(s) URL, `git+ssh://`, `git+https://`).
    pub src: String,
    /// Tags attached to every tool the remote contributes.
    pub tags: Vec<String>,
}

impl Include {
    /// Create an include.
    #[must_use]
    pub fn new(src: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            src: src.into(),
            tags,
        }
    }
}

impl PartialEq for Include {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src
    }
}

impl<'de> Deserialize<'de> for Include {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Older specs stored includes as bare source strings.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bare(String),
            Full {
                src: String,
                #[serde(default)]
                tags: Vec<String>,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bare(src) => Self::new(src, Vec::new()),
            Repr::Full { src, tags } => Self::new(src, tags),
        })
    }
}

/// A fetched include preserved in the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSpec {
    /// Source the spec was fetched from, as written in the include.
    #[serde(alias = "Source")]
    pub source: String,
    /// The fetched document.
    #[serde(alias = "Spec")]
    pub spec: Spec,
    /// Tags attached to every tool of `spec` when flattened.
    #[serde(default, alias = "Tags")]
    pub tags: Vec<String>,
}

impl RemoteSpec {
    /// Tools of the embedded spec, each carrying the remote's tags appended to its own.
    #[must_use]
    pub fn tagged_tools(&self) -> Vec<Tool> {
        self.spec
            .tools
            .iter()
            .cloned()
            .map(|mut tool| {
                tool.merge_tags(&self.tags);
                tool
            })
            .collect()
    }
}

/// The user-edited spec document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Deprecated; always cleared on load.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,
    /// Declared tools.
    #[serde(default)]
    pub tools: Tools,
    /// Included remote specs.
    #[serde(default)]
    pub includes: Vec<Include>,
}

impl Spec {
    /// Path of the spec inside `dir`.
    #[must_use]
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(SPEC_FILE)
    }

    /// Add `include` unless one with the same `src` exists. Returns whether it was added.
    pub fn add_include(&mut self, include: Include) -> bool {
        if self.includes.contains(&include) {
            return false;
        }
        self.includes.push(include);
        true
    }

    /// Add `include`, or replace the tags of the existing one with the same `src`.
    /// Returns whether it was added.
    pub fn upsert_include(&mut self, include: Include) -> bool {
        match self.includes.iter_mut().find(|i| **i == include) {
            Some(existing) => {
                existing.tags = include.tags;
                false
            }
            None => {
                self.includes.push(include);
                true
            }
        }
    }

    /// Load the spec from `dir`, clearing the deprecated `dir` field.
    pub fn load(fs: &dyn FileSystem, dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        let mut spec: Self = fs::read_json(fs, &path)
            .map_err(|e| e.context(format!("load spec {}", path.display())))?;
        if !spec.dir.is_empty() {
            warn!(
                path = %path.display(),
                dir = %spec.dir,
                "spec field 'dir' is deprecated and ignored; set TOOLSET_SPEC_DIR instead"
            );
            spec.dir.clear();
        }
        Ok(spec)
    }

    /// Persist the spec into `dir`.
    pub fn save(&self, fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        fs::write_json(fs, &Self::path(dir), self)
    }
}

/// The resolved closure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Spec tools unioned with every remote-contributed tool.
    #[serde(default)]
    pub tools: Tools,
    /// Every fetched remote, in traversal order.
    #[serde(default)]
    pub remotes: Vec<RemoteSpec>,
}

impl Lock {
    /// Path of the lock inside `dir`.
    #[must_use]
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(LOCK_FILE)
    }

    /// Load the lock from `dir`.
    pub fn load(fs: &dyn FileSystem, dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        fs::read_json(fs, &path).map_err(|e| e.context(format!("load lock {}", path.display())))
    }

    /// Persist the lock into `dir`.
    pub fn save(&self, fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        fs::write_json(fs, &Self::path(dir), self)
    }

    /// Insert or replace remotes by `source`, keeping first-seen order.
    ///
    /// Tags of a remote already present are unioned with the incoming ones.
    pub fn add_remotes(&mut self, remotes: impl IntoIterator<Item = RemoteSpec>) {
        for remote in remotes {
            match self.remotes.iter_mut().find(|r| r.source == remote.source) {
                Some(existing) => {
                    let mut tags = std::mem::take(&mut existing.tags);
                    merge_tags(&mut tags, &remote.tags);
                    *existing = RemoteSpec { tags, ..remote };
                }
                None => self.remotes.push(remote),
            }
        }
    }

    /// Rebuild `tools` from `spec` and the cached remotes.
    ///
    /// Remotes no longer reachable from the spec's includes are dropped. The
    /// tags of each remote are recomputed as the union over every include
    /// path reaching it. Spec tools win over remote tools with the same
    /// identity.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_spec(&mut self, fs: &dyn FileSystem, spec: &Spec) {
        let mut reached = self.reachable_tags(fs, spec);
        self.remotes.retain_mut(|r| match reached.remove(&remote::source_key(fs, &r.source)) {
            Some(tags) => {
                r.tags = tags;
                true
            }
            None => false,
        });

        let mut tools = spec.tools.clone();
        for remote in &self.remotes {
            for tool in remote.tagged_tools() {
                tools.add(tool);
            }
        }
        self.tools = tools;
    }

    /// Normalized source key of every reachable remote, with its tags.
    fn reachable_tags(&self, fs: &dyn FileSystem, spec: &Spec) -> HashMap<String, Vec<String>> {
        let mut reached: HashMap<String, Vec<String>> = HashMap::new();
        let mut queue: VecDeque<(String, Vec<String>)> = spec
            .includes
            .iter()
            .map(|i| (i.src.clone(), i.tags.clone()))
            .collect();
        while let Some((src, tags)) = queue.pop_front() {
            let key = remote::source_key(fs, &src);
            let grew = match reached.get_mut(&key) {
                Some(known) => {
                    let before = known.len();
                    merge_tags(known, &tags);
                    known.len() > before
                }
                None => {
                    reached.insert(key.clone(), tags);
                    true
                }
            };
            if !grew {
                continue;
            }
            let Some(remote) = self
                .remotes
                .iter()
                .find(|r| remote::source_key(fs, &r.source) == key)
            else {
                continue;
            };
            let parent = reached.get(&key).cloned().unwrap_or_default();
            for include in &remote.spec.includes {
                let mut nested = include.tags.clone();
                merge_tags(&mut nested, &parent);
                queue.push_back((include.src.clone(), nested));
            }
        }
        reached
    }

    /// Sources of all cached remotes.
    #[must_use]
    pub fn remote_sources(&self) -> BTreeSet<&str> {
        self.remotes.iter().map(|r| r.source.as_str()).collect()
    }
}

/// Whether a spec already exists in `dir`.
#[must_use]
pub fn spec_exists(fs: &dyn FileSystem, dir: &Path) -> bool {
    fs.exists(&Spec::path(dir))
}

/// Fail with [`Error::SpecExists`] when `dir` already holds a spec.
pub fn ensure_no_spec(fs: &dyn FileSystem, dir: &Path) -> Result<()> {
    let path = Spec::path(dir);
    if fs.exists(&path) {
        return Err(Error::spec_exists(&path));
    }
    Ok(())
}

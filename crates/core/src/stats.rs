//! Per-project tool usage statistics (`<cache>/stats.json`).

use crate::fs::{self, FileSystem};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Current stats format version.
pub const STATS_VERSION: &str = "v1";

/// Filename of the stats document inside the cache directory.
pub const STATS_FILE: &str = "stats.json";

/// Last-use timestamps keyed by project root, then tool id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Format version.
    pub version: String,
    /// project-root -> (tool-id -> last use).
    #[serde(default)]
    pub tools_by_workdir: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            version: STATS_VERSION.to_string(),
            tools_by_workdir: BTreeMap::new(),
        }
    }
}

impl Stats {
    /// Path of the stats document inside `cache_dir`.
    #[must_use]
    pub fn path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(STATS_FILE)
    }

    /// Load the stats, creating and persisting an empty document if absent.
    pub fn load_or_create(fs: &dyn FileSystem, cache_dir: &Path) -> Result<Self> {
        let path = Self::path(cache_dir);
        if fs.exists(&path) {
            return fs::read_json(fs, &path);
        }

        debug!(path = %path.display(), "Creating usage stats");
        fs.create_dir_all(cache_dir)
            .map_err(|e| Error::io(e, Some(cache_dir.to_path_buf()), "create cache directory"))?;
        let stats = Self::default();
        stats.save(fs, cache_dir)?;
        Ok(stats)
    }

    /// Persist the stats.
    pub fn save(&self, fs: &dyn FileSystem, cache_dir: &Path) -> Result<()> {
        fs::write_json(fs, &Self::path(cache_dir), self)
    }

    /// Record a use of `tool_id` in `project` at `now`.
    ///
    /// Timestamps per key are strictly increasing: a use recorded at or
    /// before the previous one is moved one microsecond past it.
    pub fn record(&mut self, project: &str, tool_id: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        let tools = self
            .tools_by_workdir
            .entry(project.to_string())
            .or_default();
        let stamp = match tools.get(tool_id) {
            Some(prev) if *prev >= now => *prev + Duration::microseconds(1),
            _ => now,
        };
        tools.insert(tool_id.to_string(), stamp);
        stamp
    }

    /// Last recorded use.
    #[must_use]
    pub fn last_use(&self, project: &str, tool_id: &str) -> Option<DateTime<Utc>> {
        self.tools_by_workdir
            .get(project)
            .and_then(|tools| tools.get(tool_id))
            .copied()
    }

    /// Forget a tool. Empty project entries are dropped.
    pub fn remove(&mut self, project: &str, tool_id: &str) -> bool {
        let Some(tools) = self.tools_by_workdir.get_mut(project) else {
            return false;
        };
        let removed = tools.remove(tool_id).is_some();
        if tools.is_empty() {
            self.tools_by_workdir.remove(project);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    #[test]
    fn test_load_or_create_persists_empty() {
        let fs = MemoryFs::new();
        let cache = Path::new("/cache");
        let stats = Stats::load_or_create(&fs, cache).unwrap();
        assert_eq!(stats, Stats::default());

        let raw = fs.read_to_string(Path::new("/cache/stats.json")).unwrap();
        assert!(raw.contains("\"version\": \"v1\""));
        assert!(raw.contains("\"toolsByWorkdir\": {}"));
    }

    #[test]
    fn test_record_is_strictly_monotonic() {
        let mut stats = Stats::default();
        let now = Utc::now();
        let first = stats.record("/proj", "go:m", now);
        let second = stats.record("/proj", "go:m", now);
        let third = stats.record("/proj", "go:m", now - Duration::seconds(5));
        assert!(first < second);
        assert!(second < third);
        assert_eq!(stats.last_use("/proj", "go:m"), Some(third));
    }

    #[test]
    fn test_round_trip() {
        let fs = MemoryFs::new();
        let cache = Path::new("/cache");
        let mut stats = Stats::load_or_create(&fs, cache).unwrap();
        stats.record("/proj", "go:golang.org/x/tools/cmd/goimports", Utc::now());
        stats.save(&fs, cache).unwrap();
        assert_eq!(Stats::load_or_create(&fs, cache).unwrap(), stats);
    }

    #[test]
    fn test_remove_drops_empty_project() {
        let mut stats = Stats::default();
        stats.record("/proj", "go:m", Utc::now());
        assert!(stats.remove("/proj", "go:m"));
        assert!(!stats.remove("/proj", "go:m"));
        assert!(stats.tools_by_workdir.is_empty());
    }
}

//! Persistent record of the last gravity run, shown by `pyhole status`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::atomic::write_atomic;
use crate::orchestrator::{SourceReport, SourceStatus};

/// Persistent state for pyhole
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GravityState {
    pub last_update: Option<DateTime<Utc>>,
    pub sources: Vec<SourceStats>,
    /// Domains contributed by all usable sources, before deduplication
    pub total_domains: usize,
    /// Distinct domains in the gravity file
    pub unique_domains: usize,
    /// Gravity lines commented out by the whitelist
    pub whitelisted_lines: usize,
    /// Domains in the blacklist hosts file
    pub blacklisted: usize,
}

/// Outcome for a single adlist source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceStats {
    pub url: String,
    pub status: SourceStatus,
    pub domains: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GravityState {
    /// Load state from file; a missing file is an empty state
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {:?}", path))
    }

    /// Save state to file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        write_atomic(path, content.as_bytes())
    }

    /// Record per-source outcomes.
    ///
    /// `counts` holds the domain count of every usable report, in report order.
    pub fn update_sources(&mut self, reports: &[SourceReport], counts: &[usize]) {
        let mut counts = counts.iter().copied();
        self.sources = reports
            .iter()
            .map(|r| SourceStats {
                url: r.source.url.clone(),
                status: r.status,
                domains: if r.is_usable() {
                    counts.next().unwrap_or(0)
                } else {
                    0
                },
                error: r.error.clone(),
            })
            .collect();
        self.total_domains = self.sources.iter().map(|s| s.domains).sum();
    }

    pub fn count(&self, status: SourceStatus) -> usize {
        self.sources.iter().filter(|s| s.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Source;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn report(url: &str, status: SourceStatus) -> SourceReport {
        SourceReport {
            source: Source::new(url, &[]),
            cache_path: PathBuf::from("/tmp/x"),
            status,
            error: (status != SourceStatus::Fresh).then(|| "timed out after 20s".to_string()),
        }
    }

    #[test]
    fn test_update_sources_skips_dropped_in_counts() {
        let reports = vec![
            report("https://a.example/", SourceStatus::Fresh),
            report("https://b.example/", SourceStatus::Dropped),
            report("https://c.example/", SourceStatus::Cached),
        ];
        let mut state = GravityState::default();
        state.update_sources(&reports, &[10, 5]);

        let domains: Vec<usize> = state.sources.iter().map(|s| s.domains).collect();
        assert_eq!(domains, vec![10, 0, 5]);
        assert_eq!(state.total_domains, 15);
        assert_eq!(state.count(SourceStatus::Cached), 1);
        assert_eq!(state.count(SourceStatus::Dropped), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut state = GravityState {
            last_update: Some(Utc::now()),
            unique_domains: 3,
            ..Default::default()
        };
        state.update_sources(&[report("https://a.example/", SourceStatus::Fresh)], &[4]);

        state.save(&path).unwrap();
        let loaded = GravityState::load(&path).unwrap();

        assert_eq!(loaded, state);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"status\": \"fresh\""));
    }

    #[test]
    fn test_load_missing_is_default() {
        let dir = TempDir::new().unwrap();
        let state = GravityState::load(&dir.path().join("state.json")).unwrap();
        assert!(state.last_update.is_none());
        assert!(state.sources.is_empty());
    }

    #[test]
    fn test_load_corrupt_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(GravityState::load(&path).is_err());
    }
}

//! Removal of cache files left behind by sources that are no longer configured.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::orchestrator::is_cache_file_name;

/// Delete every per-source cache file in `cache_dir` that is not in `live`.
///
/// Files not matching the `list.<n>.<host>.domains` pattern are never
/// touched. Returns the removed paths.
pub fn reap(cache_dir: &Path, live: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let live: HashSet<&Path> = live.iter().map(PathBuf::as_path).collect();
    let mut removed = Vec::new();

    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list cache directory {:?}", cache_dir))
        }
    };

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list cache directory {:?}", cache_dir))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_cache_file_name(name) {
            continue;
        }
        let path = entry.path();
        if live.contains(path.as_path()) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed stale cache file {:?}", path);
                removed.push(path);
            }
            Err(e) => warn!("Failed to remove stale cache file {:?}: {}", path, e),
        }
    }

    if !removed.is_empty() {
        info!("Cleaned up {} stale list file(s)", removed.len());
    }
    removed.sort();
    Ok(removed)
}

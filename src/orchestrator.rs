//! Drives the fetcher over every source and decides which files feed gravity.
//!
//! Policy: a fresh non-empty download wins; otherwise the previous cache file
//! for that source is reused; a source with neither is left out of this run.
//! A run therefore never fails because of a single source.

use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::FetchError;
use crate::fetcher::{require_content, SourceFetcher};
use crate::sources::Source;

const CACHE_PREFIX: &str = "list.";
const CACHE_SUFFIX: &str = ".domains";

/// How a source ended up in (or out of) this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Downloaded just now
    Fresh,
    /// Download failed or was empty, previous copy reused
    Cached,
    /// Download failed and no previous copy exists
    Dropped,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceStatus::Fresh => "fresh",
            SourceStatus::Cached => "cached",
            SourceStatus::Dropped => "dropped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub cache_path: PathBuf,
    pub status: SourceStatus,
    pub error: Option<String>,
}

impl SourceReport {
    pub fn is_usable(&self) -> bool {
        self.status != SourceStatus::Dropped
    }
}

/// Deterministic cache file name for the source at `index`.
pub fn cache_file_name(index: usize, source: &Source) -> String {
    format!("{}{}.{}{}", CACHE_PREFIX, index, source.host(), CACHE_SUFFIX)
}

/// Whether `name` follows the `list.<index>.<host>.domains` pattern.
pub fn is_cache_file_name(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix(CACHE_PREFIX)
        .and_then(|rest| rest.strip_suffix(CACHE_SUFFIX))
    else {
        return false;
    };
    match inner.split_once('.') {
        Some((index, host)) => {
            !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) && !host.is_empty()
        }
        None => false,
    }
}

/// Fetch every source into `cache_dir`, falling back to cached copies.
///
/// Reports come back in source order; at most `max_concurrent` downloads run
/// at once and each one writes only its own cache file.
pub async fn spin_up(
    fetcher: &dyn SourceFetcher,
    sources: &[Source],
    cache_dir: &Path,
    max_concurrent: usize,
) -> Vec<SourceReport> {
    let total = sources.len();

    stream::iter(sources.iter().enumerate().map(|(index, source)| {
        let cache_path = cache_dir.join(cache_file_name(index, source));
        async move {
            info!("[{}/{}] Getting {}", index + 1, total, source.url);
            let result = fetcher.fetch_source(source, &cache_path).await;
            classify(source, cache_path, result)
        }
    }))
    .buffered(max_concurrent.max(1))
    .collect()
    .await
}

/// Only the usable (source, cache file) pairs, in source order.
pub fn usable_files(reports: &[SourceReport]) -> Vec<(Source, PathBuf)> {
    reports
        .iter()
        .filter(|r| r.is_usable())
        .map(|r| (r.source.clone(), r.cache_path.clone()))
        .collect()
}

fn classify(
    source: &Source,
    cache_path: PathBuf,
    result: Result<bool, FetchError>,
) -> SourceReport {
    let error = match require_content(result) {
        Ok(()) => {
            info!("  Done: {}", source.url);
            return SourceReport {
                source: source.clone(),
                cache_path,
                status: SourceStatus::Fresh,
                error: None,
            };
        }
        Err(e) => e,
    };

    let status = if cache_path.exists() {
        warn!("  {} ({}), using cached copy", source.url, error);
        SourceStatus::Cached
    } else {
        warn!("  {} ({}), no cached copy, skipping", source.url, error);
        SourceStatus::Dropped
    };

    SourceReport {
        source: source.clone(),
        cache_path,
        status,
        error: Some(error.to_string()),
    }
}

//! Adlist reading: which remote lists feed gravity, and how to ask for them.

use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SourceOverride;

/// Lists used when no adlists file exists yet
pub const DEFAULT_ADLISTS: &[&str] = &[
    "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts",
    "http://mirror1.malwaredomains.com/files/justdomains",
    "http://sysctl.org/cameleon/hosts",
    "https://zeustracker.abuse.ch/blocklist.php?download=domainblocklist",
    "https://s3.amazonaws.com/lists.disconnect.me/simple_tracking.txt",
    "https://s3.amazonaws.com/lists.disconnect.me/simple_ad.txt",
    "https://hosts-file.net/ad_servers.txt",
];

/// One remote blocklist. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub post: BTreeMap<String, String>,
}

impl Source {
    /// Build a source, applying every override whose pattern occurs in the URL.
    pub fn new(url: &str, overrides: &[SourceOverride]) -> Self {
        let mut headers = BTreeMap::new();
        let mut post = BTreeMap::new();
        for rule in overrides.iter().filter(|r| url.contains(&r.url_contains)) {
            debug!("Applying override '{}' to {}", rule.url_contains, url);
            headers.extend(rule.headers.clone());
            post.extend(rule.post.clone());
        }
        Self {
            url: url.to_string(),
            headers,
            post,
        }
    }

    /// Host of the URL, if it parses and has one.
    pub fn url_host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().filter(|h| !h.is_empty()).map(str::to_string))
    }

    /// Host component of the URL, used to name the cache file.
    ///
    /// Falls back to a sanitized copy of the URL when it does not parse.
    pub fn host(&self) -> String {
        self.url_host().unwrap_or_else(|| sanitize(&self.url))
    }
}

/// Parse adlist text: one URL per line, blank and `#` lines ignored.
pub fn parse_sources(content: &str, overrides: &[SourceOverride]) -> Vec<Source> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|url| Source::new(url, overrides))
        .collect()
}

/// Read the adlists file, using [`DEFAULT_ADLISTS`] when it does not exist.
pub fn read_sources(path: &Path, overrides: &[SourceOverride]) -> Result<Vec<Source>> {
    if !path.exists() {
        warn!(
            "Adlists file {:?} not found, using {} built-in lists",
            path,
            DEFAULT_ADLISTS.len()
        );
        return Ok(DEFAULT_ADLISTS
            .iter()
            .map(|url| Source::new(url, overrides))
            .collect());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read adlists file: {:?}", path))?;
    Ok(parse_sources(&content, overrides))
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

//! Error types for pyhole.

use thiserror::Error;

/// Why a single source download did not produce a usable file.
///
/// None of these abort a gravity run: the orchestrator falls back to the
/// cached copy of the source or drops it for this run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP {code} {reason}")]
    Http { code: u16, reason: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("response too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Classify a reqwest error into the fetch taxonomy.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout(timeout_secs);
        }
        if let Some(status) = err.status() {
            return FetchError::Http {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            };
        }
        FetchError::Network(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PyholeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("No usable blocklist sources (every download failed and nothing is cached)")]
    NoUsableSources,

    #[error("Another pyhole run holds the lock: {0}")]
    Locked(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
}

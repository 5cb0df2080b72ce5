//! Configuration management for pyhole.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cmd_abstraction::args_to_strings;
use crate::error::PyholeError;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pyhole/config.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IPv4 sinkhole address returned for blocked domains
    pub ipv4: Option<Ipv4Addr>,

    /// IPv6 sinkhole address returned for blocked domains
    pub ipv6: Option<Ipv6Addr>,

    /// Input lists, cache directory and generated files
    pub paths: PathsConfig,

    /// Download behaviour
    pub fetch: FetchConfig,

    /// Extra headers / POST parameters for sources whose URL contains a substring
    pub source_overrides: Vec<SourceOverride>,

    /// External sort tuning
    pub dedup: DedupConfig,

    /// Whitelist the host of every adlist URL so a list cannot block its own download
    pub protect_sources: bool,

    /// Command used to make the resolver pick up new hosts files
    pub reload: ReloadConfig,

    /// Refuse to touch protected paths unless running as root
    pub require_root: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ipv4: None,
            ipv6: None,
            paths: PathsConfig::default(),
            fetch: FetchConfig::default(),
            source_overrides: default_source_overrides(),
            dedup: DedupConfig::default(),
            protect_sources: true,
            reload: ReloadConfig::default(),
            require_root: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            return Err(PyholeError::Config("fetch.timeout_secs must be greater than 0".into()).into());
        }

        if self.fetch.max_concurrent == 0 {
            return Err(PyholeError::Config("fetch.max_concurrent must be at least 1".into()).into());
        }

        if self.dedup.chunk_lines == 0 {
            return Err(PyholeError::Config("dedup.chunk_lines must be greater than 0".into()).into());
        }

        if self.reload.command.trim().is_empty() {
            return Err(PyholeError::Config("reload.command cannot be empty".into()).into());
        }

        for rule in &self.source_overrides {
            if rule.url_contains.is_empty() {
                return Err(PyholeError::Config(
                    "source_overrides entries need a non-empty url_contains".into(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Ensure at least one sinkhole address is configured.
    ///
    /// Without one the generated hosts file maps nothing anywhere.
    pub fn require_sinkhole(&self) -> Result<()> {
        if self.ipv4.is_none() && self.ipv6.is_none() {
            return Err(PyholeError::Config(
                "no sinkhole address configured (set ipv4 and/or ipv6)".into(),
            )
            .into());
        }
        Ok(())
    }

    /// Configured sinkhole addresses, IPv4 first
    pub fn sinkhole_addresses(&self) -> Vec<String> {
        let mut addrs = Vec::with_capacity(2);
        if let Some(v4) = self.ipv4 {
            addrs.push(v4.to_string());
        }
        if let Some(v6) = self.ipv6 {
            addrs.push(v6.to_string());
        }
        addrs
    }

    /// Save configuration to YAML file atomically
    ///
    /// Uses tempfile + rename pattern to prevent corruption on crash.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).with_context(|| "Failed to serialize config")?;
        crate::atomic::write_atomic(path, content.as_bytes())
            .with_context(|| format!("Failed to persist config file: {:?}", path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Adlist URLs, one per line
    pub adlists: PathBuf,
    /// User whitelist, one domain per line
    pub whitelist: PathBuf,
    /// User blacklist, one domain per line
    pub blacklist: PathBuf,
    /// Per-source download cache, run lock and state file
    pub cache_dir: PathBuf,
    /// Generated gravity hosts file
    pub gravity: PathBuf,
    /// Generated blacklist hosts file
    pub blacklist_hosts: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            adlists: PathBuf::from("/etc/pyhole/adlists.list"),
            whitelist: PathBuf::from("/etc/pyhole/whitelist.txt"),
            blacklist: PathBuf::from("/etc/pyhole/blacklist.txt"),
            cache_dir: PathBuf::from("/var/lib/pyhole"),
            gravity: PathBuf::from("/var/lib/pyhole/gravity.list"),
            blacklist_hosts: PathBuf::from("/var/lib/pyhole/black.list"),
        }
    }
}

impl PathsConfig {
    pub fn lock_file(&self) -> PathBuf {
        self.cache_dir.join("pyhole.lock")
    }

    pub fn state_file(&self) -> PathBuf {
        self.cache_dir.join("state.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Sources downloaded at once (1 = sequential)
    pub max_concurrent: usize,
    /// Maximum body size per source in bytes
    pub max_size: u64,
    /// User-Agent sent unless a source override replaces it
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_concurrent: 1,
            max_size: 64 * 1024 * 1024,
            user_agent: format!("pyhole/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-source request tweaks, selected by substring match on the URL
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SourceOverride {
    pub url_contains: String,
    #[serde(deserialize_with = "deserialize_headers")]
    pub headers: BTreeMap<String, String>,
    /// Form fields; a non-empty map turns the request into a POST
    pub post: BTreeMap<String, String>,
}

/// Deserialize and validate HTTP headers (reject injection attempts)
fn deserialize_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let headers: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;

    for (key, value) in &headers {
        if key.contains('\r') || key.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains newline characters",
                key
            )));
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(serde::de::Error::custom(format!(
                "Invalid header value for '{}': contains newline characters",
                key
            )));
        }
        // RFC 7230 token characters, restricted
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_".contains(c))
        {
            return Err(serde::de::Error::custom(format!(
                "Invalid header name '{}': contains invalid characters",
                key
            )));
        }
    }

    Ok(headers)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Lines sorted in memory before spilling a run to disk
    pub chunk_lines: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            chunk_lines: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            command: "systemctl".to_string(),
            args: args_to_strings(&["reload", "dnsmasq"]),
        }
    }
}

fn default_source_overrides() -> Vec<SourceOverride> {
    vec![
        SourceOverride {
            url_contains: "adblock.mahakala.is".to_string(),
            headers: BTreeMap::from([
                (
                    "User-Agent".to_string(),
                    "Mozilla/5.0 (X11; Linux x86_64; rv:30.0) Gecko/20100101 Firefox/30.0"
                        .to_string(),
                ),
                (
                    "Referer".to_string(),
                    "http://forum.xda-developers.com/".to_string(),
                ),
            ]),
            post: BTreeMap::new(),
        },
        SourceOverride {
            url_contains: "pgl.yoyo.org".to_string(),
            headers: BTreeMap::new(),
            post: BTreeMap::from([
                ("mimetype".to_string(), "plaintext".to_string()),
                ("hostformat".to_string(), "hosts".to_string()),
            ]),
        },
    ]
}

//! # pyhole - DNS blocklist builder for a local resolver
//!
//! Aggregates remote ad/tracker domain lists into a single hosts-format
//! "gravity" file that a local DNS resolver (dnsmasq and friends) serves,
//! mapping every listed domain to a sinkhole address.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        pyhole                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: update, whitelist, blacklist, status       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! │    └── Addresses, paths, fetch limits, source overrides     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Sources + Fetcher (reqwest + rustls)                       │
//! │    └── Per-source headers / POST form, cache fallback       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Normalizer → Dedup (external merge sort) → Hosts           │
//! │    └── One `<addr> <domain>` line per address and domain    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Overlay                                                    │
//! │    ├── Whitelist: comment / uncomment gravity lines         │
//! │    └── Blacklist: separate always-active hosts file         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Reload (CommandExecutor) · Privilege · Lock · State        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use pyhole::cmd_abstraction::RealCommandExecutor;
//! use pyhole::config::Config;
//! use pyhole::fetcher::Fetcher;
//! use pyhole::pipeline::Gravity;
//! use pyhole::privilege::AssumeGranted;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/pyhole/config.yaml")?;
//!     let fetcher = Fetcher::new(&config.fetch)?;
//!     let executor = RealCommandExecutor::new();
//!
//!     let summary = Gravity::new(&config, &executor, &AssumeGranted)
//!         .update(&fetcher, true)
//!         .await?;
//!     println!("{} domains blocked", summary.unique_domains);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`atomic`] - Scratch-then-replace file writes
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - External commands (resolver reload)
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`dedup`] - External merge sort with duplicate removal
//! - [`error`] - Error types
//! - [`fetcher`] - HTTP client for downloading adlists
//! - [`hosts`] - Hosts-format output
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`normalizer`] - Raw list lines to bare domains
//! - [`orchestrator`] - Fetching every source with cache fallback
//! - [`overlay`] - Whitelist / blacklist overlays
//! - [`pipeline`] - The gravity run and list edits
//! - [`privilege`] - Access checks before writing
//! - [`reaper`] - Stale cache file removal
//! - [`sources`] - Adlist parsing and per-source overrides
//! - [`stats`] - State persistence for `status`
//! - [`utils`] - Formatting helpers
//! - [`validation`] - Domain validation

pub mod atomic;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod hosts;
pub mod lock;
pub mod normalizer;
pub mod orchestrator;
pub mod overlay;
pub mod pipeline;
pub mod privilege;
pub mod reaper;
pub mod sources;
pub mod stats;
pub mod utils;
pub mod validation;

pub use cli::{BlacklistAction, Cli, Commands, WhitelistAction};
pub use config::Config;

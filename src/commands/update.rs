//! Update command implementation.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use super::load_config;
use crate::cmd_abstraction::RealCommandExecutor;
use crate::fetcher::Fetcher;
use crate::orchestrator::SourceStatus;
use crate::pipeline::{log_reports, Gravity};
use crate::privilege;
use crate::utils::format_count;

/// Run the update command
pub async fn run(no_reload: bool, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    info!("Updating gravity...");

    let fetcher = Fetcher::new(&config.fetch)?;
    let executor = RealCommandExecutor::new();
    let privilege = privilege::from_config(config.require_root);

    let summary = Gravity::new(&config, &executor, privilege.as_ref())
        .update(&fetcher, !no_reload)
        .await?;

    info!("Sources:");
    log_reports(&summary.reports);

    let count = |status| summary.reports.iter().filter(|r| r.status == status).count();

    println!();
    println!(
        "[OK] {} domains in gravity ({} listed across {} source(s))",
        format_count(summary.unique_domains),
        format_count(summary.total_domains),
        summary.reports.len() - count(SourceStatus::Dropped)
    );
    if count(SourceStatus::Cached) > 0 || count(SourceStatus::Dropped) > 0 {
        println!(
            "     {} source(s) served from cache, {} skipped",
            count(SourceStatus::Cached),
            count(SourceStatus::Dropped)
        );
    }
    if summary.whitelisted_lines > 0 || summary.blacklisted > 0 {
        println!(
            "     {} whitelisted line(s), {} blacklisted domain(s)",
            summary.whitelisted_lines, summary.blacklisted
        );
    }
    if !summary.reaped.is_empty() {
        println!("     {} stale list file(s) removed", summary.reaped.len());
    }

    Ok(())
}

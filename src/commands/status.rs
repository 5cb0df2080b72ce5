//! Status command implementation.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::path::Path;

use super::load_config;
use crate::config::Config;
use crate::orchestrator::SourceStatus;
use crate::overlay::{ListKind, Overlay};
use crate::stats::GravityState;
use crate::utils::{format_count, format_duration_ago, truncate};

/// Run the status command
pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let state = GravityState::load(&config.paths.state_file()).unwrap_or_default();
    print!("{}", render(&config, &state, Utc::now())?);
    Ok(())
}

fn render(config: &Config, state: &GravityState, now: DateTime<Utc>) -> Result<String> {
    let overlay = Overlay::new(config);
    let mut out = String::new();
    let addrs = config.sinkhole_addresses();

    out.push('\n');
    out.push_str(&format!(
        "Sinkhole: {}\n",
        if addrs.is_empty() {
            "NOT CONFIGURED".to_string()
        } else {
            addrs.join(", ")
        }
    ));
    out.push_str(&format!(
        "Gravity: {}\n",
        if config.paths.gravity.exists() {
            format!(
                "{} domains ({})",
                format_count(state.unique_domains),
                config.paths.gravity.display()
            )
        } else {
            "not built yet".to_string()
        }
    ));
    out.push_str(&format!(
        "Whitelist: {} domain(s), {} gravity line(s) commented\n",
        overlay.read(ListKind::Whitelist)?.len(),
        state.whitelisted_lines
    ));
    out.push_str(&format!(
        "Blacklist: {} domain(s)\n",
        overlay.read(ListKind::Blacklist)?.len()
    ));

    match state.last_update {
        Some(last_update) => {
            let local: DateTime<Local> = last_update.into();
            out.push_str(&format!(
                "Last update: {} ({})\n",
                local.format("%Y-%m-%d %H:%M:%S"),
                format_duration_ago(last_update, now)
            ));
        }
        None => out.push_str("Last update: never\n"),
    }

    if !state.sources.is_empty() {
        out.push('\n');
        out.push_str(" SOURCE                                     STATUS     DOMAINS\n");
        out.push_str(" ────────────────────────────────────────── ────────── ──────────\n");
        for source in &state.sources {
            out.push_str(&format!(
                " {:<42} {:<10} {:>10}\n",
                truncate(&source.url, 42),
                source.status.to_string(),
                format_count(source.domains)
            ));
        }
        let problems = state.count(SourceStatus::Cached) + state.count(SourceStatus::Dropped);
        if problems > 0 {
            out.push('\n');
            for source in state.sources.iter().filter(|s| s.error.is_some()) {
                out.push_str(&format!(
                    " {}: {}\n",
                    truncate(&source.url, 42),
                    source.error.as_deref().unwrap_or_default()
                ));
            }
        }
    }
    out.push('\n');

    Ok(out)
}

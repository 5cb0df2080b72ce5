//! CLI command implementations.

pub mod blacklist;
pub mod status;
pub mod update;
pub mod whitelist;

use anyhow::{Context, Result};
use std::path::Path;

use crate::cmd_abstraction::RealCommandExecutor;
use crate::config::Config;
use crate::overlay::{ListKind, Overlay};
use crate::pipeline::{Gravity, ListEdit};
use crate::privilege;
use crate::validation::validate_domains;

/// Load the config file, or defaults when it does not exist
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))
}

/// Shared add/del for both lists
pub(crate) fn edit_list(
    kind: ListKind,
    edit: ListEdit,
    domains: &[String],
    force: bool,
    config_path: &Path,
) -> Result<()> {
    let domains = match edit {
        ListEdit::Add => validate_domains(domains)?,
        // Removal takes whatever is on the list, valid or not
        ListEdit::Remove => domains.iter().map(|d| d.trim().to_string()).collect(),
    };

    let config = load_config(config_path)?;
    let executor = RealCommandExecutor::new();
    let privilege = privilege::from_config(config.require_root);
    let summary =
        Gravity::new(&config, &executor, privilege.as_ref()).edit_list(kind, edit, &domains, force)?;

    let (done, skipped) = match edit {
        ListEdit::Add => ("added to", "already on"),
        ListEdit::Remove => ("removed from", "not on"),
    };
    println!(
        "[OK] {} domain(s) {} the {}",
        summary.change.changed, done, kind
    );
    if summary.change.unchanged > 0 {
        println!("     {} domain(s) {} the {}", summary.change.unchanged, skipped, kind);
    }
    if summary.lines_touched > 0 {
        println!("     {} hosts line(s) updated", summary.lines_touched);
    }
    Ok(())
}

/// Print one list
pub(crate) fn print_list(kind: ListKind, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let entries = Overlay::new(&config).read(kind)?;

    println!();
    println!("{} ({} entries):", capitalize(&kind.to_string()), entries.len());
    println!();
    if entries.is_empty() {
        println!("  (empty)");
    } else {
        for domain in &entries {
            println!("  {}", domain);
        }
    }
    println!();
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

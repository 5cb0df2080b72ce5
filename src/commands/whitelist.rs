//! Whitelist command implementation.

use anyhow::Result;
use std::path::Path;

use super::{edit_list, load_config, print_list};
use crate::cli::WhitelistAction;
use crate::cmd_abstraction::RealCommandExecutor;
use crate::overlay::ListKind;
use crate::pipeline::{Gravity, ListEdit};
use crate::privilege;

/// Run the whitelist command
pub async fn run(action: WhitelistAction, config_path: &Path) -> Result<()> {
    match action {
        WhitelistAction::Add { domains, force } => {
            edit_list(ListKind::Whitelist, ListEdit::Add, &domains, force, config_path)
        }
        WhitelistAction::Del { domains, force } => {
            edit_list(ListKind::Whitelist, ListEdit::Remove, &domains, force, config_path)
        }
        WhitelistAction::List => print_list(ListKind::Whitelist, config_path),
        WhitelistAction::Apply { force } => apply(force, config_path),
    }
}

fn apply(force: bool, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let executor = RealCommandExecutor::new();
    let privilege = privilege::from_config(config.require_root);

    let commented = Gravity::new(&config, &executor, privilege.as_ref()).apply_whitelist(force)?;

    println!("[OK] Whitelist applied ({} gravity line(s) commented)", commented);
    Ok(())
}

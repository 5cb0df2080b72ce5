//! Blacklist command implementation.

use anyhow::Result;
use std::path::Path;

use super::{edit_list, print_list};
use crate::cli::BlacklistAction;
use crate::overlay::ListKind;
use crate::pipeline::ListEdit;

/// Run the blacklist command
pub async fn run(action: BlacklistAction, config_path: &Path) -> Result<()> {
    match action {
        BlacklistAction::Add { domains, force } => {
            edit_list(ListKind::Blacklist, ListEdit::Add, &domains, force, config_path)
        }
        BlacklistAction::Del { domains, force } => {
            edit_list(ListKind::Blacklist, ListEdit::Remove, &domains, force, config_path)
        }
        BlacklistAction::List => print_list(ListKind::Blacklist, config_path),
    }
}

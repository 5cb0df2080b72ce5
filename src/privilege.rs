//! Privilege checks before protected paths are touched.
//!
//! pyhole never elevates itself. Whatever launched it (sudo, a systemd unit
//! running as a dedicated account, a wrapper that re-execs) is expected to
//! have granted access to the config, cache and output directories already.
//! The pipeline asks a [`PrivilegeContext`] to confirm that before it writes.

use anyhow::Result;
use std::path::Path;

use crate::error::PyholeError;

/// Confirms the process may modify the given paths.
pub trait PrivilegeContext: Send + Sync {
    fn ensure_access(&self, paths: &[&Path]) -> Result<()>;
}

/// Trusts the caller to have arranged access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeGranted;

impl PrivilegeContext for AssumeGranted {
    fn ensure_access(&self, _paths: &[&Path]) -> Result<()> {
        Ok(())
    }
}

/// Requires an effective UID of 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireRoot;

impl PrivilegeContext for RequireRoot {
    fn ensure_access(&self, paths: &[&Path]) -> Result<()> {
        // SAFETY: geteuid() has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };

        if euid != 0 {
            let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            return Err(PyholeError::Permission(format!(
                "root privileges are required to modify {}. Please run with sudo.",
                listed.join(", ")
            ))
            .into());
        }
        Ok(())
    }
}

/// Pick the privilege policy from the `require_root` config flag.
pub fn from_config(require_root: bool) -> Box<dyn PrivilegeContext> {
    if require_root {
        Box::new(RequireRoot)
    } else {
        Box::new(AssumeGranted)
    }
}

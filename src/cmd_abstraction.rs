//! Command execution abstraction for testability.
//!
//! The resolver reload (and any other privileged helper) is an external
//! command. Going through this trait lets unit tests inject a mock instead of
//! spawning real processes.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::config::ReloadConfig;

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// The exit code, if available
    pub code: Option<i32>,
}

/// Trait for command execution, allowing dependency injection for testing.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Execute `cmd` with `args` and wait for it to exit.
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Real implementation of CommandExecutor that runs actual system commands.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Makes the DNS resolver re-read the generated hosts files.
pub struct ServiceReloader<'a> {
    executor: &'a dyn CommandExecutor,
    config: ReloadConfig,
}

impl<'a> ServiceReloader<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, config: ReloadConfig) -> Self {
        Self { executor, config }
    }

    /// Run the reload command. Failure is logged and reported, never raised.
    pub fn reload(&self) -> bool {
        info!("Reloading resolver ({})", self.config.command);
        match self.executor.execute(&self.config.command, &self.config.args) {
            Ok(output) if output.success => true,
            Ok(output) => {
                warn!(
                    "Resolver reload exited with {:?}: {}",
                    output.code,
                    output.stderr.trim()
                );
                false
            }
            Err(e) => {
                warn!("Resolver reload failed: {:#}", e);
                false
            }
        }
    }

    /// Reload when something changed or when forced; returns whether a reload succeeded.
    pub fn reload_if(&self, changed: bool, force: bool) -> bool {
        if changed || force {
            self.reload()
        } else {
            info!("Nothing changed, resolver not reloaded");
            false
        }
    }
}

/// Helper function to convert a slice of &str to Vec<String>.
///
/// mockall has issues with lifetimes in `&[&str]`, so the trait takes `&[String]`.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

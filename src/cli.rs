//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "pyhole")]
#[command(author, version, about = "DNS blocklist (gravity) builder for a local resolver")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Quiet mode (for cron/systemd timer)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download adlists and rebuild the gravity hosts file
    Update {
        /// Do not reload the resolver afterwards
        #[arg(long)]
        no_reload: bool,
    },

    /// Manage whitelisted domains (never blocked)
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Manage blacklisted domains (always blocked)
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },

    /// Show the outcome of the last gravity run
    Status,

    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum WhitelistAction {
    /// Add domains to the whitelist and unblock them in gravity
    Add {
        /// Domains to add
        #[arg(required = true)]
        domains: Vec<String>,
        /// Reload the resolver even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Remove domains from the whitelist and block them again
    Del {
        /// Domains to remove
        #[arg(required = true)]
        domains: Vec<String>,
        /// Reload the resolver even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// List whitelisted domains
    List,
    /// Re-apply the whole whitelist to the gravity file
    Apply {
        /// Reload the resolver even if nothing changed
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum BlacklistAction {
    /// Add domains to the blacklist
    Add {
        /// Domains to add
        #[arg(required = true)]
        domains: Vec<String>,
        /// Reload the resolver even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// Remove domains from the blacklist
    Del {
        /// Domains to remove
        #[arg(required = true)]
        domains: Vec<String>,
        /// Reload the resolver even if nothing changed
        #[arg(long)]
        force: bool,
    },
    /// List blacklisted domains
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_help() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_version_command() {
        let cli = Cli::try_parse_from(["pyhole", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_cli_update_command() {
        let cli = Cli::try_parse_from(["pyhole", "update"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { no_reload: false }));

        let cli = Cli::try_parse_from(["pyhole", "update", "--no-reload"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { no_reload: true }));
    }

    #[test]
    fn test_cli_default_config_path() {
        let cli = Cli::try_parse_from(["pyhole", "status"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pyhole", "status", "-q", "--config", "/tmp/p.yaml"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, PathBuf::from("/tmp/p.yaml"));
    }

    #[test]
    fn test_cli_whitelist_add_many() {
        let cli =
            Cli::try_parse_from(["pyhole", "whitelist", "add", "a.com", "b.com", "--force"]).unwrap();
        match cli.command {
            Commands::Whitelist {
                action: WhitelistAction::Add { domains, force },
            } => {
                assert_eq!(domains, vec!["a.com", "b.com"]);
                assert!(force);
            }
            _ => panic!("Expected whitelist add"),
        }
    }

    #[test]
    fn test_cli_add_requires_domain() {
        assert!(Cli::try_parse_from(["pyhole", "whitelist", "add"]).is_err());
        assert!(Cli::try_parse_from(["pyhole", "blacklist", "del"]).is_err());
    }

    #[test]
    fn test_cli_blacklist_has_no_apply() {
        assert!(Cli::try_parse_from(["pyhole", "blacklist", "apply"]).is_err());
        assert!(Cli::try_parse_from(["pyhole", "whitelist", "apply"]).is_ok());
    }
}

//! pyhole - DNS blocklist builder for a local resolver

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pyhole::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Update { no_reload } => pyhole::commands::update::run(no_reload, &cli.config).await,
        Commands::Whitelist { action } => {
            pyhole::commands::whitelist::run(action, &cli.config).await
        }
        Commands::Blacklist { action } => {
            pyhole::commands::blacklist::run(action, &cli.config).await
        }
        Commands::Status => pyhole::commands::status::run(&cli.config).await,
        Commands::Version => {
            println!("pyhole {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

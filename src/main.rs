//! devgrant CLI binary entry point.

use clap::Parser;
use devgrant::cli::{Cli, Commands};
use devgrant::config::DevgrantConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("devgrant=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match DevgrantConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Commands::Login(args) => devgrant::cli::auth::handle_login(config, args).await,
        Commands::Batch(args) => devgrant::cli::auth::handle_batch(config, args).await,
        Commands::Accounts(args) => devgrant::cli::auth::handle_accounts(config, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

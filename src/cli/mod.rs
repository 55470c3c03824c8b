//! CLI entry point for devgrant.

pub mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// devgrant CLI
#[derive(Parser, Debug)]
#[command(name = "devgrant", version, about = "OAuth2 device authorization grant client")]
pub struct Cli {
    /// Config file (defaults to ~/.devgrant/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one device-grant flow, approving in the browser
    Login(LoginArgs),
    /// Run several flows in parallel
    Batch(BatchArgs),
    /// List saved account records
    Accounts(AccountsArgs),
}

/// Arguments for `devgrant login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Skip the chained second-realm exchange
    #[arg(long)]
    pub no_chain: bool,

    /// Results file to append to
    #[arg(long)]
    pub results: Option<PathBuf>,
}

/// Arguments for `devgrant batch`.
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Number of flows to run
    #[arg(short, long, default_value_t = 1)]
    pub count: usize,

    /// Maximum concurrent flows
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Milliseconds between consecutive flow launches
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Skip the chained second-realm exchange
    #[arg(long)]
    pub no_chain: bool,

    /// Results file to append to
    #[arg(long)]
    pub results: Option<PathBuf>,
}

/// Arguments for `devgrant accounts`.
#[derive(Parser, Debug)]
pub struct AccountsArgs {
    /// Results file to read
    #[arg(long)]
    pub results: Option<PathBuf>,
}

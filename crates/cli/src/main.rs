//! Tradepost CLI - session store migrations and configuration checks.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the session table
//! tradepost-cli migrate
//!
//! # Validate storefront configuration and reach the session database
//! tradepost-cli check
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tradepost-cli")]
#[command(author, version, about = "Tradepost storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the session store table
    Migrate,
    /// Validate configuration and database connectivity
    Check {
        /// Skip the database connection
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::session_store().await,
        Commands::Check { offline } => commands::check::config(offline).await,
    }
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Cli, Command};

#[tokio::main]
async fn main() {
    // Load .env file if present, before clap reads env-backed args
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let result = match &cli.command {
        Command::Ingest(args) => commands::ingest::run(args).await,
        Command::Ask(args) => commands::ask::run(args).await,
        Command::Datasets(args) => commands::datasets::run(args).await,
        Command::Kpi(args) => commands::kpi::run(args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

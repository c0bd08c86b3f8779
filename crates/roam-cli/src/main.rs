//! Roam CLI - browse destinations and keep favorites from the command line
//!
//! Favorites made while signed out stay on this device and move into the
//! account on the next sign-in.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::resolve_db_path;
use crate::commands::config::run_config;
use crate::commands::destinations::run_destinations;
use crate::commands::favorites::run_favorites;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_directive = "roam=info"
        .parse()
        .map_err(|error| CliError::Config(format!("Invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => run_config(command, profile),
        Commands::Auth { command } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_auth(command, profile, &db_path).await
        }
        Commands::Destinations { command } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_destinations(command, profile, &db_path).await
        }
        Commands::Favorites { command } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_favorites(command, profile, &db_path).await
        }
    }
}

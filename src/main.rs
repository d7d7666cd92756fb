//! karaq - Browse and edit karaoke playlists from the terminal

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod browse;
mod cli;
mod config;
mod queue;
mod remote;
mod utils;

use cli::{Cli, Commands};
use utils::TuiAwareLayer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "karaq=debug,reqwest=debug"
    } else {
        "karaq=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(TuiAwareLayer::new(
            tracing_subscriber::fmt::layer().with_target(false),
        ))
        .init();

    match cli.command {
        Commands::Auth {
            url,
            username,
            password,
            force,
        } => {
            cli::commands::auth(url, username, password, force).await?;
        }
        Commands::Playlists => {
            cli::commands::playlists().await?;
        }
        Commands::Watch => {
            cli::commands::watch().await?;
        }
        Commands::Browse { left, right } => {
            cli::commands::browse(left, right).await?;
        }
        Commands::Config { init } => {
            cli::commands::config(init)?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}

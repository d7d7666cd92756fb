//! CLI module for karaq

use clap::{Parser, Subcommand};

pub mod auth;
pub mod commands;

pub use auth::AuthManager;

#[derive(Parser, Debug)]
#[command(name = "karaq", about = "Browse and edit karaoke playlists from the terminal")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to a karaoke server and store the session
    Auth {
        /// Karaoke server URL
        #[arg(long, env = "KARAQ_URL")]
        url: Option<String>,

        /// Username
        #[arg(short, long, env = "KARAQ_USER")]
        username: Option<String>,

        /// Password
        #[arg(short, long, env = "KARAQ_PASS")]
        password: Option<String>,

        /// Force re-authentication (ignore stored session)
        #[arg(long)]
        force: bool,
    },

    /// List the server's playlists
    Playlists,

    /// Print server push events as they arrive
    Watch,

    /// Two-pane playlist browser
    Browse {
        /// Playlist for the left side (library, favorites, whitelist,
        /// blacklist, criterias or a playlist id)
        #[arg(long)]
        left: Option<String>,

        /// Playlist for the right side
        #[arg(long)]
        right: Option<String>,
    },

    /// Show the client configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

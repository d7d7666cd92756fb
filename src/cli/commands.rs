//! CLI command handlers

use anyhow::Result;
use clap_complete::generate;
use colored::Colorize;
use std::io;
use std::sync::Arc;
use tracing::warn;

use super::AuthManager;
use crate::browse;
use crate::config::{ClientConfig, SessionState, SideState};
use crate::queue::{PlaylistId, PlaylistKind};
use crate::remote::{self, PushEvent, RemoteGateway};

/// Handle the `auth` command
pub async fn auth(
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    force: bool,
) -> Result<()> {
    println!("{}", "Logging in to karaoke server...".cyan());

    let config = ClientConfig::load()?;
    let session = AuthManager::authenticate(url, username, password, force, &config).await?;

    println!();
    println!("{}", "Authentication successful!".green().bold());
    println!("  Server: {}", session.url);
    println!("  User: {}", session.username);
    println!();
    println!("Session stored securely in system keyring.");

    Ok(())
}

/// Handle the `playlists` command
pub async fn playlists() -> Result<()> {
    let config = ClientConfig::load()?;
    let client = AuthManager::require()?.client(&config)?;

    let playlists = client
        .list_playlists()
        .await
        .map_err(|e| e.into_report("Failed to list playlists"))?;

    if playlists.is_empty() {
        println!("{}", "No playlists on the server.".yellow());
        return Ok(());
    }

    println!("{}", "Playlists:".green().bold());
    for playlist in &playlists {
        let tag = match playlist.kind() {
            PlaylistKind::Current => " [current]".green().to_string(),
            PlaylistKind::Public => " [public]".cyan().to_string(),
            PlaylistKind::Smart => " [smart]".magenta().to_string(),
            _ => String::new(),
        };
        println!(
            "  {}{} - {} songs, {} ({})",
            playlist.name.bold(),
            tag,
            playlist.song_count,
            format_duration(playlist.duration),
            playlist.plaid.dimmed()
        );
    }

    println!();
    println!(
        "Open one with {}.",
        "karaq browse --right <playlist id>".cyan()
    );

    Ok(())
}

/// Handle the `watch` command
pub async fn watch() -> Result<()> {
    let config = ClientConfig::load()?;
    let session = AuthManager::require()?;
    let client = session.client(&config)?;

    let url = client.events_url()?;
    println!("Listening on {} (Ctrl-C to stop)", url.as_str().cyan());
    let (mut events, handle) = remote::events::subscribe(url, Some(session.token.clone()));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => {
                    println!("{}", "Push channel closed.".yellow());
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.abort();
    Ok(())
}

fn print_event(event: &PushEvent) {
    let time = chrono::Local::now().format("%H:%M:%S");
    match event {
        PushEvent::Connected => println!("{} {}", time, "connected".green()),
        PushEvent::PlayingChanged { playlist, plcid } => {
            println!("{} {} {} slot {}", time, "playing".magenta(), playlist, plcid)
        }
        PushEvent::StructureChanged { playlist } => {
            println!("{} {} {}", time, "changed".cyan(), playlist)
        }
        PushEvent::FieldsChanged { entries } => {
            println!("{} {} {} songs", time, "updated".yellow(), entries.len())
        }
        PushEvent::PlaylistsChanged => println!("{} {}", time, "playlists changed".cyan()),
    }
}

/// Handle the `browse` command
pub async fn browse(left: Option<String>, right: Option<String>) -> Result<()> {
    let config = ClientConfig::load()?;
    let session = AuthManager::require()?;
    let client = session.client(&config)?;

    let mut state = SessionState::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable session state: {}", e);
        SessionState::default()
    });
    for (side, requested) in [(&mut state.left, left), (&mut state.right, right)] {
        if let Some(requested) = requested {
            *side = SideState {
                playlist: Some(PlaylistId::parse(&requested)),
                filter: String::new(),
            };
        }
    }

    println!("{}", "Connecting to karaoke server...".cyan());
    let events_url = config
        .live_updates
        .then(|| client.events_url())
        .transpose()?;
    let token = client.token().map(str::to_string);
    let gateway: Arc<dyn RemoteGateway> = Arc::new(client);

    let final_state = browse::run_browser(gateway, &config, &state, events_url, token).await?;

    if let Err(e) = final_state.save() {
        warn!("Failed to save session state: {}", e);
    }

    Ok(())
}

/// Handle the `config` command
pub fn config(init: bool) -> Result<()> {
    let config = ClientConfig::load()?;
    let path = ClientConfig::config_path()?;

    if init {
        config.save()?;
        println!("{} {}", "Wrote".green(), path.display());
    } else {
        println!("{}", path.display().to_string().dimmed());
    }

    println!("  Chunk size:      {}", config.chunk_size);
    println!("  Filter debounce: {} ms", config.filter_debounce_ms);
    println!("  Echo window:     {} ms", config.echo_window_ms);
    println!("  Follow playing:  {}", config.follow_playing);
    println!("  Request timeout: {} s", config.request_timeout_secs);
    println!("  Live updates:    {}", config.live_updates);
    println!("  Tag language:    {}", config.tag_language);

    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = super::Cli::command();
    generate(shell, &mut cmd, "karaq", &mut io::stdout());
}

// Extension trait for Cli to get clap Command
impl super::Cli {
    fn command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }
}

/// Seconds as h:mm:ss or m:ss
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(245), "4:05");
        assert_eq!(format_duration(3 * 3600 + 61), "3:01:01");
    }
}

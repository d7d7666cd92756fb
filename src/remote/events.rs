//! Server push channel (server-sent events)
//!
//! The subscription reconnects with exponential backoff and forwards parsed
//! events into an unbounded channel consumed by the session event loop.

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::queue::entry::{FieldPatch, Plcid};
use crate::queue::playlist::PlaylistId;

/// Attempts before the subscription gives up
const MAX_RETRIES: u32 = 10;

/// Upper bound of the reconnect delay
const MAX_BACKOFF_SECS: u64 = 30;

/// A push notification from the server
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// The (re)connection is established
    Connected,
    PlayingChanged { playlist: PlaylistId, plcid: Plcid },
    /// Membership or order of a playlist changed
    StructureChanged { playlist: PlaylistId },
    /// Flags of some songs changed
    FieldsChanged { entries: Vec<FieldPatch> },
    /// The set of playlists changed
    PlaylistsChanged,
}

#[derive(Deserialize)]
struct PlayingPayload {
    plaid: String,
    plc_id: Plcid,
}

#[derive(Deserialize)]
struct PlaylistPayload {
    plaid: String,
}

#[derive(Deserialize)]
struct SongsPayload {
    #[serde(default)]
    entries: Vec<FieldPatch>,
}

impl PushEvent {
    /// Parse a named event. Unknown names and keepalives yield `None`.
    pub fn parse(name: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        if data.is_empty() || data == "keepalive" {
            return Ok(None);
        }

        let event = match name {
            "playingUpdated" => {
                let payload: PlayingPayload = serde_json::from_str(data)?;
                PushEvent::PlayingChanged {
                    playlist: PlaylistId::Playlist(payload.plaid),
                    plcid: payload.plc_id,
                }
            }
            "playlistContentsUpdated" => {
                let payload: PlaylistPayload = serde_json::from_str(data)?;
                PushEvent::StructureChanged {
                    playlist: PlaylistId::Playlist(payload.plaid),
                }
            }
            "songsUpdated" => {
                let payload: SongsPayload = serde_json::from_str(data)?;
                PushEvent::FieldsChanged {
                    entries: payload.entries,
                }
            }
            "favoritesUpdated" => PushEvent::StructureChanged {
                playlist: PlaylistId::Favorites,
            },
            "whitelistUpdated" => PushEvent::StructureChanged {
                playlist: PlaylistId::Whitelist,
            },
            "blacklistUpdated" => PushEvent::StructureChanged {
                playlist: PlaylistId::Blacklist,
            },
            "blacklistCriteriasUpdated" => PushEvent::StructureChanged {
                playlist: PlaylistId::BlacklistCriteria,
            },
            "playlistsUpdated" => PushEvent::PlaylistsChanged,
            other => {
                debug!("Ignoring unknown push event {}", other);
                return Ok(None);
            }
        };

        Ok(Some(event))
    }
}

/// Subscribe to the push channel. Events stop when the receiver is dropped
/// or the retry budget is exhausted.
pub fn subscribe(url: Url, token: Option<String>) -> (mpsc::UnboundedReceiver<PushEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut retry_count: u32 = 0;

        loop {
            if retry_count > 0 {
                let delay = backoff(retry_count);
                info!(
                    "Reconnecting to push channel in {:?} (attempt #{})",
                    delay,
                    retry_count + 1
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = client.get(url.clone());
            if let Some(token) = &token {
                request = request.header("authorization", token);
            }

            let mut source = match EventSource::new(request) {
                Ok(source) => source,
                Err(e) => {
                    error!("Cannot open push channel: {}", e);
                    return;
                }
            };

            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {
                        info!("Push channel connected to {}", url);
                        retry_count = 0;
                        if tx.send(PushEvent::Connected).is_err() {
                            source.close();
                            return;
                        }
                    }
                    Ok(Event::Message(message)) => {
                        match PushEvent::parse(&message.event, &message.data) {
                            Ok(Some(event)) => {
                                if tx.send(event).is_err() {
                                    source.close();
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Bad {} payload: {} - {}", message.event, e, message.data);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Push channel error: {}", e);
                        source.close();
                        break;
                    }
                }
            }

            retry_count += 1;
            if retry_count > MAX_RETRIES {
                error!("Push channel retries exhausted, live updates stopped");
                return;
            }
        }
    });

    (rx, handle)
}

fn backoff(retry_count: u32) -> Duration {
    let secs = 2u64.saturating_pow(retry_count.saturating_sub(1));
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

//! Karaoke server request and response models

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::queue::entry::Entry;
use crate::queue::mode::ViewMode;
use crate::queue::playlist::{PlaylistId, PlaylistKind, PlaylistRef};
use crate::queue::window::{Locale, Page};

/// Envelope of every command sent to the server
#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest<'a> {
    pub cmd: &'a str,
    pub body: &'a Value,
}

/// A named remote command and its payload
#[derive(Debug, Clone, PartialEq)]
pub struct MutationCommand {
    pub name: &'static str,
    pub payload: Value,
}

impl MutationCommand {
    pub fn new(name: &'static str, payload: Value) -> Self {
        Self { name, payload }
    }
}

/// Window request for one side
#[derive(Debug, Clone, PartialEq)]
pub struct WindowQuery {
    pub playlist: PlaylistId,
    pub from: usize,
    pub size: usize,
    pub mode: ViewMode,
}

impl WindowQuery {
    /// Server command and payload fetching this window
    pub fn command(&self) -> MutationCommand {
        let mut body = json!({
            "filter": self.mode.filter.trim(),
            "from": self.from,
            "size": self.size,
        });

        if let Some(order) = self.mode.order.as_param() {
            body["order"] = json!(order);
        }
        if let Some(facet) = &self.mode.facet {
            body["q"] = json!(facet.as_query());
        }

        let name = match &self.playlist {
            PlaylistId::Library => "getKaras",
            PlaylistId::Favorites => "getFavorites",
            PlaylistId::Whitelist => "getWhitelist",
            PlaylistId::Blacklist => "getBlacklist",
            PlaylistId::BlacklistCriteria => "getCriterias",
            PlaylistId::Playlist(plaid) => {
                body["plaid"] = json!(plaid);
                "getPlaylistContents"
            }
        };

        MutationCommand::new(name, body)
    }
}

/// Paging information of a window response
#[derive(Debug, Clone, Deserialize)]
pub struct WindowInfos {
    pub count: usize,
    pub from: usize,
    pub to: usize,
}

/// Response to any window command
#[derive(Debug, Clone, Deserialize)]
pub struct WindowResponse {
    #[serde(default)]
    pub content: Vec<Entry>,
    pub infos: WindowInfos,
    #[serde(default)]
    pub i18n: Locale,
}

impl From<WindowResponse> for Page {
    fn from(response: WindowResponse) -> Self {
        Page {
            content: response.content,
            count: response.infos.count,
            from: response.infos.from,
            to: response.infos.to,
            locale: response.i18n,
        }
    }
}

/// Playlist metadata (getPlaylists)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub plaid: String,
    pub name: String,
    #[serde(default)]
    pub flag_current: bool,
    #[serde(default)]
    pub flag_public: bool,
    #[serde(default)]
    pub flag_smart: bool,
    #[serde(rename = "karacount", default)]
    pub song_count: u32,
    /// Total duration in seconds
    #[serde(default)]
    pub duration: u64,
}

impl PlaylistSummary {
    pub fn kind(&self) -> PlaylistKind {
        if self.flag_current {
            PlaylistKind::Current
        } else if self.flag_public {
            PlaylistKind::Public
        } else if self.flag_smart {
            PlaylistKind::Smart
        } else {
            PlaylistKind::Standard
        }
    }

    pub fn to_ref(&self) -> PlaylistRef {
        PlaylistRef::playlist(&self.plaid, &self.name, self.kind())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
}

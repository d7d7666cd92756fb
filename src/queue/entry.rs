//! Queue entry model
//!
//! One occurrence of a song inside a playlist. The same song (`kid`) may
//! appear several times in an ordered playlist; each occurrence carries its
//! own slot id (`plcid`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable song identifier
pub type Kid = String;

/// Per-occurrence slot identifier inside an ordered playlist
pub type Plcid = u64;

/// Identity used by selection and mutation paths
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryId {
    /// A slot inside an ordered playlist
    Slot(Plcid),
    /// A song in a list without slots (library, favorites, ...)
    Song(Kid),
}

/// Download state of the media file on the karaoke server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    Missing,
    Planned,
    Downloading,
    #[default]
    Downloaded,
    Failed,
}

/// A single queue item as held in a window store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub kid: Kid,
    #[serde(rename = "plcid", default)]
    pub plcid: Option<Plcid>,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u32>,
    /// Nickname of whoever requested this slot
    #[serde(rename = "nickname", default)]
    pub requested_by: Option<String>,
    #[serde(rename = "created_at", default)]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(rename = "flag_playing", default)]
    pub playing: bool,
    #[serde(rename = "flag_dejavu", default)]
    pub dejavu: bool,
    #[serde(rename = "flag_visible", default = "default_visible")]
    pub visible: bool,
    /// Local selection state, never part of server payloads
    #[serde(skip)]
    pub checked: bool,
    #[serde(rename = "flag_upvoted", default)]
    pub upvoted: bool,
    #[serde(rename = "upvotes", default)]
    pub upvote_count: u32,
    #[serde(rename = "flag_favorites", default)]
    pub favorite: bool,
    #[serde(default)]
    pub download_status: DownloadStatus,
    /// Tag ids, named through the page locale
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_visible() -> bool {
    true
}

impl Entry {
    /// Create a bare entry for a song, mostly useful for fixtures
    pub fn new(kid: impl Into<Kid>, title: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            plcid: None,
            title: title.into(),
            artist: None,
            duration: None,
            requested_by: None,
            added_at: None,
            playing: false,
            dejavu: false,
            visible: true,
            checked: false,
            upvoted: false,
            upvote_count: 0,
            favorite: false,
            download_status: DownloadStatus::default(),
            tags: Vec::new(),
        }
    }

    /// Same as [`Entry::new`] but placed in a playlist slot
    pub fn in_slot(kid: impl Into<Kid>, plcid: Plcid, title: impl Into<String>) -> Self {
        Self {
            plcid: Some(plcid),
            ..Self::new(kid, title)
        }
    }

    pub fn id(&self) -> EntryId {
        match self.plcid {
            Some(plcid) => EntryId::Slot(plcid),
            None => EntryId::Song(self.kid.clone()),
        }
    }

    pub fn matches(&self, id: &EntryId) -> bool {
        match id {
            EntryId::Slot(plcid) => self.plcid == Some(*plcid),
            EntryId::Song(kid) => self.plcid.is_none() && &self.kid == kid,
        }
    }

    /// Apply a field-level delta. Returns true when anything changed.
    pub fn apply(&mut self, patch: &FieldPatch) -> bool {
        let before = self.clone();

        if let Some(playing) = patch.playing {
            self.playing = playing;
        }
        if let Some(dejavu) = patch.dejavu {
            self.dejavu = dejavu;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(upvoted) = patch.upvoted {
            self.upvoted = upvoted;
        }
        if let Some(count) = patch.upvote_count {
            self.upvote_count = count;
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
        if let Some(status) = patch.download_status {
            self.download_status = status;
        }

        *self != before
    }
}

/// Field-level change for one song as carried by a push event.
///
/// Only flags present in the payload are touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub kid: Kid,
    #[serde(rename = "flag_playing", default)]
    pub playing: Option<bool>,
    #[serde(rename = "flag_dejavu", default)]
    pub dejavu: Option<bool>,
    #[serde(rename = "flag_visible", default)]
    pub visible: Option<bool>,
    #[serde(rename = "flag_upvoted", default)]
    pub upvoted: Option<bool>,
    #[serde(rename = "upvotes", default)]
    pub upvote_count: Option<u32>,
    #[serde(rename = "flag_favorites", default)]
    pub favorite: Option<bool>,
    #[serde(default)]
    pub download_status: Option<DownloadStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_prefers_slot() {
        let slot = Entry::in_slot("k1", 7, "Song");
        let song = Entry::new("k1", "Song");

        assert_eq!(slot.id(), EntryId::Slot(7));
        assert_eq!(song.id(), EntryId::Song("k1".into()));
        assert!(!slot.matches(&EntryId::Song("k1".into())));
        assert!(song.matches(&EntryId::Song("k1".into())));
    }

    #[test]
    fn test_apply_only_touches_present_flags() {
        let mut entry = Entry::new("k1", "Song");
        entry.checked = true;
        entry.favorite = true;

        let changed = entry.apply(&FieldPatch {
            kid: "k1".into(),
            upvoted: Some(true),
            upvote_count: Some(3),
            ..Default::default()
        });

        assert!(changed);
        assert!(entry.upvoted);
        assert_eq!(entry.upvote_count, 3);
        assert!(entry.favorite);
        assert!(entry.checked);
    }

    #[test]
    fn test_apply_reports_no_change() {
        let mut entry = Entry::new("k1", "Song");
        let changed = entry.apply(&FieldPatch {
            kid: "k1".into(),
            visible: Some(true),
            ..Default::default()
        });
        assert!(!changed);
    }

    #[test]
    fn test_deserialize_wire_entry() {
        let json = r#"{
            "kid": "abc",
            "plcid": 12,
            "title": "Song",
            "nickname": "bob",
            "flag_playing": true,
            "upvotes": 4,
            "download_status": "DOWNLOADING"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.plcid, Some(12));
        assert_eq!(entry.requested_by.as_deref(), Some("bob"));
        assert!(entry.playing);
        assert!(entry.visible);
        assert!(!entry.checked);
        assert_eq!(entry.upvote_count, 4);
        assert_eq!(entry.download_status, DownloadStatus::Downloading);
    }
}

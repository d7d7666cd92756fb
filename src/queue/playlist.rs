//! Playlist identity shared by both sides

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of anything a side can display
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaylistId {
    Library,
    Favorites,
    Whitelist,
    Blacklist,
    BlacklistCriteria,
    /// A server playlist by its plaid
    Playlist(String),
}

impl PlaylistId {
    /// Parse the short form used on the command line and in session state
    pub fn parse(value: &str) -> Self {
        match value {
            "library" => PlaylistId::Library,
            "favorites" => PlaylistId::Favorites,
            "whitelist" => PlaylistId::Whitelist,
            "blacklist" => PlaylistId::Blacklist,
            "criterias" => PlaylistId::BlacklistCriteria,
            plaid => PlaylistId::Playlist(plaid.to_string()),
        }
    }

    pub fn plaid(&self) -> Option<&str> {
        match self {
            PlaylistId::Playlist(plaid) => Some(plaid),
            _ => None,
        }
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistId::Library => write!(f, "library"),
            PlaylistId::Favorites => write!(f, "favorites"),
            PlaylistId::Whitelist => write!(f, "whitelist"),
            PlaylistId::Blacklist => write!(f, "blacklist"),
            PlaylistId::BlacklistCriteria => write!(f, "criterias"),
            PlaylistId::Playlist(plaid) => write!(f, "{}", plaid),
        }
    }
}

/// Behavioural class of a playlist, drives command dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaylistKind {
    Library,
    Favorites,
    Whitelist,
    /// Generated from the blacklist criteria, read only
    Blacklist,
    BlacklistCriteria,
    /// Ordered playlist currently being sung through
    Current,
    /// Ordered playlist receiving public requests
    Public,
    Standard,
    /// Criteria-driven playlist
    Smart,
}

impl PlaylistKind {
    /// Lists whose entries have slot ids and a server-side order
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            PlaylistKind::Current | PlaylistKind::Public | PlaylistKind::Standard
        )
    }

    /// Lists whose entries are addressed by slot id rather than song id
    pub fn has_slots(&self) -> bool {
        self.is_ordered() || matches!(self, PlaylistKind::Smart)
    }
}

/// A playlist as known to a side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: PlaylistId,
    pub name: String,
    pub kind: PlaylistKind,
}

impl PlaylistRef {
    pub fn builtin(id: PlaylistId) -> Self {
        let (name, kind) = match &id {
            PlaylistId::Library => ("Library", PlaylistKind::Library),
            PlaylistId::Favorites => ("Favorites", PlaylistKind::Favorites),
            PlaylistId::Whitelist => ("Whitelist", PlaylistKind::Whitelist),
            PlaylistId::Blacklist => ("Blacklist", PlaylistKind::Blacklist),
            PlaylistId::BlacklistCriteria => {
                ("Blacklist criterias", PlaylistKind::BlacklistCriteria)
            }
            PlaylistId::Playlist(_) => ("Playlist", PlaylistKind::Standard),
        };
        Self {
            id,
            name: name.to_string(),
            kind,
        }
    }

    pub fn playlist(plaid: impl Into<String>, name: impl Into<String>, kind: PlaylistKind) -> Self {
        Self {
            id: PlaylistId::Playlist(plaid.into()),
            name: name.into(),
            kind,
        }
    }

    /// Built-in lists in the order they are offered to the user
    pub fn builtins() -> Vec<PlaylistRef> {
        [
            PlaylistId::Library,
            PlaylistId::Favorites,
            PlaylistId::Whitelist,
            PlaylistId::Blacklist,
            PlaylistId::BlacklistCriteria,
        ]
        .into_iter()
        .map(PlaylistRef::builtin)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_display() {
        for raw in ["library", "favorites", "whitelist", "blacklist", "criterias", "a1b2"] {
            assert_eq!(PlaylistId::parse(raw).to_string(), raw);
        }
        assert_eq!(PlaylistId::parse("a1b2").plaid(), Some("a1b2"));
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(PlaylistKind::Current.is_ordered());
        assert!(!PlaylistKind::Smart.is_ordered());
        assert!(PlaylistKind::Smart.has_slots());
        assert!(!PlaylistKind::Favorites.has_slots());
    }
}

//! Command dispatch over playlist kinds
//!
//! The remote command name and payload shape depend on both the playlist the
//! songs come from and the playlist they go to. The match below covers every
//! kind pair, so a new kind does not compile until it is routed.

use serde_json::{Value, json};
use thiserror::Error;

use super::entry::{Entry, Kid, Plcid};
use super::playlist::{PlaylistKind, PlaylistRef};
use crate::remote::MutationCommand;

/// Criteria type matching a single song id
const KID_CRITERIA: u32 = 1001;

/// Local refusal to route a mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{0:?} cannot receive songs")]
    ReadOnlyTarget(PlaylistKind),
    #[error("songs cannot be removed from {0:?}")]
    ReadOnlySource(PlaylistKind),
    #[error("{0:?} entries are criteria, not songs")]
    NotSongs(PlaylistKind),
    #[error("source and target are the same playlist")]
    SamePlaylist,
    #[error("{0:?} has no order to change")]
    Unordered(PlaylistKind),
    #[error("nothing selected")]
    Empty,
}

/// How songs reach a target playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddRoute {
    /// Songs by id into an ordered playlist
    AddToPlaylist,
    /// Existing slots copied into another ordered playlist
    CopyAcross,
    SmartCriteria,
    BlacklistCriteria,
    Whitelist,
    Favorites,
}

fn route(source: PlaylistKind, target: PlaylistKind) -> Result<AddRoute, DispatchError> {
    use PlaylistKind::*;

    let route = match (source, target) {
        (_, Library | Blacklist) => return Err(DispatchError::ReadOnlyTarget(target)),
        (BlacklistCriteria, _) => return Err(DispatchError::NotSongs(source)),
        (Library | Favorites | Whitelist | Blacklist, Current | Public | Standard) => {
            AddRoute::AddToPlaylist
        }
        (Current | Public | Standard | Smart, Current | Public | Standard) => AddRoute::CopyAcross,
        (_, Smart) => AddRoute::SmartCriteria,
        (_, BlacklistCriteria) => AddRoute::BlacklistCriteria,
        (_, Whitelist) => AddRoute::Whitelist,
        (_, Favorites) => AddRoute::Favorites,
    };
    Ok(route)
}

fn kids(entries: &[Entry]) -> Result<Vec<Kid>, DispatchError> {
    let mut kids: Vec<Kid> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !kids.contains(&entry.kid) {
            kids.push(entry.kid.clone());
        }
    }
    if kids.is_empty() {
        return Err(DispatchError::Empty);
    }
    Ok(kids)
}

fn plc_ids(entries: &[Entry]) -> Result<Vec<Plcid>, DispatchError> {
    let plc_ids: Vec<Plcid> = entries.iter().filter_map(|entry| entry.plcid).collect();
    if plc_ids.is_empty() {
        return Err(DispatchError::Empty);
    }
    Ok(plc_ids)
}

fn kid_criteria(kids: &[Kid]) -> Value {
    kids.iter()
        .map(|kid| json!({ "type": KID_CRITERIA, "value": kid }))
        .collect()
}

fn plaid(playlist: &PlaylistRef) -> Value {
    json!(playlist.id.plaid())
}

/// Command adding `entries` from `source` to `target`
pub fn add_command(
    source: &PlaylistRef,
    target: &PlaylistRef,
    entries: &[Entry],
) -> Result<MutationCommand, DispatchError> {
    if source.id == target.id {
        return Err(DispatchError::SamePlaylist);
    }

    let command = match route(source.kind, target.kind)? {
        AddRoute::AddToPlaylist => MutationCommand::new(
            "addKaraToPlaylist",
            json!({ "kids": kids(entries)?, "plaid": plaid(target) }),
        ),
        AddRoute::CopyAcross => MutationCommand::new(
            "copyKaraToPlaylist",
            json!({ "plc_ids": plc_ids(entries)?, "plaid": plaid(target) }),
        ),
        AddRoute::SmartCriteria => MutationCommand::new(
            "addCriterias",
            json!({ "criterias": kid_criteria(&kids(entries)?), "plaid": plaid(target) }),
        ),
        AddRoute::BlacklistCriteria => MutationCommand::new(
            "addCriterias",
            json!({ "criterias": kid_criteria(&kids(entries)?) }),
        ),
        AddRoute::Whitelist => {
            MutationCommand::new("addKaraToWhitelist", json!({ "kids": kids(entries)? }))
        }
        AddRoute::Favorites => {
            MutationCommand::new("addFavorites", json!({ "kids": kids(entries)? }))
        }
    };
    Ok(command)
}

/// Command removing `entries` from `source`
pub fn remove_command(
    source: &PlaylistRef,
    entries: &[Entry],
) -> Result<MutationCommand, DispatchError> {
    use PlaylistKind::*;

    let command = match source.kind {
        Current | Public | Standard => MutationCommand::new(
            "deleteKaraFromPlaylist",
            json!({ "plc_ids": plc_ids(entries)? }),
        ),
        Whitelist => {
            MutationCommand::new("deleteKaraFromWhitelist", json!({ "kids": kids(entries)? }))
        }
        Favorites => MutationCommand::new("deleteFavorites", json!({ "kids": kids(entries)? })),
        BlacklistCriteria => MutationCommand::new(
            "removeCriterias",
            json!({ "criterias": kid_criteria(&kids(entries)?) }),
        ),
        Library | Blacklist | Smart => return Err(DispatchError::ReadOnlySource(source.kind)),
    };
    Ok(command)
}

/// Server position for a local move. Positions are 1-based and insert
/// before the slot currently there, hence the extra step when moving down.
pub fn remote_position(old_index: usize, new_index: usize) -> usize {
    if new_index > old_index {
        new_index + 2
    } else {
        new_index + 1
    }
}

/// Command moving one slot to a new position
pub fn reorder_command(
    playlist: &PlaylistRef,
    plcid: Plcid,
    old_index: usize,
    new_index: usize,
) -> Result<MutationCommand, DispatchError> {
    if !playlist.kind.is_ordered() {
        return Err(DispatchError::Unordered(playlist.kind));
    }
    Ok(MutationCommand::new(
        "editPLC",
        json!({ "plc_ids": [plcid], "pos": remote_position(old_index, new_index) }),
    ))
}

/// Command setting or clearing the favorite flag of a song
pub fn favorite_command(kid: &str, favorite: bool) -> MutationCommand {
    let name = if favorite {
        "addFavorites"
    } else {
        "deleteFavorites"
    };
    MutationCommand::new(name, json!({ "kids": [kid] }))
}

/// Command casting or withdrawing an upvote on a slot
pub fn vote_command(plcid: Plcid, upvote: bool) -> MutationCommand {
    MutationCommand::new("votePLC", json!({ "plc_id": plcid, "downvote": !upvote }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::playlist::PlaylistId;

    const ALL_KINDS: [PlaylistKind; 9] = [
        PlaylistKind::Library,
        PlaylistKind::Favorites,
        PlaylistKind::Whitelist,
        PlaylistKind::Blacklist,
        PlaylistKind::BlacklistCriteria,
        PlaylistKind::Current,
        PlaylistKind::Public,
        PlaylistKind::Standard,
        PlaylistKind::Smart,
    ];

    fn list(kind: PlaylistKind, plaid: &str) -> PlaylistRef {
        match kind {
            PlaylistKind::Current
            | PlaylistKind::Public
            | PlaylistKind::Standard
            | PlaylistKind::Smart => PlaylistRef::playlist(plaid, plaid, kind),
            PlaylistKind::Library => PlaylistRef::builtin(PlaylistId::Library),
            PlaylistKind::Favorites => PlaylistRef::builtin(PlaylistId::Favorites),
            PlaylistKind::Whitelist => PlaylistRef::builtin(PlaylistId::Whitelist),
            PlaylistKind::Blacklist => PlaylistRef::builtin(PlaylistId::Blacklist),
            PlaylistKind::BlacklistCriteria => PlaylistRef::builtin(PlaylistId::BlacklistCriteria),
        }
    }

    fn selection() -> Vec<Entry> {
        vec![Entry::in_slot("k1", 10, "A"), Entry::in_slot("k2", 11, "B"), Entry::in_slot("k1", 12, "A")]
    }

    #[test]
    fn test_reorder_position_math() {
        assert_eq!(remote_position(2, 5), 7);
        assert_eq!(remote_position(5, 2), 3);
        assert_eq!(remote_position(3, 3), 4);
    }

    #[test]
    fn test_every_pair_resolves_to_one_outcome() {
        for source in ALL_KINDS {
            for target in ALL_KINDS {
                let outcome = add_command(&list(source, "src"), &list(target, "dst"), &selection());
                match outcome {
                    Ok(command) => assert!(!command.name.is_empty()),
                    Err(DispatchError::ReadOnlyTarget(kind)) => {
                        assert!(matches!(kind, PlaylistKind::Library | PlaylistKind::Blacklist))
                    }
                    Err(DispatchError::NotSongs(kind)) => {
                        assert_eq!(kind, PlaylistKind::BlacklistCriteria)
                    }
                    Err(DispatchError::SamePlaylist) => {
                        assert_eq!(source, target);
                        assert!(!source.has_slots());
                    }
                    Err(e) => panic!("unexpected {:?} for {:?} -> {:?}", e, source, target),
                }
            }
        }
    }

    #[test]
    fn test_library_to_current_adds_by_kid() {
        let command = add_command(
            &list(PlaylistKind::Library, ""),
            &list(PlaylistKind::Current, "cur"),
            &selection(),
        )
        .unwrap();

        assert_eq!(command.name, "addKaraToPlaylist");
        assert_eq!(command.payload, json!({ "kids": ["k1", "k2"], "plaid": "cur" }));
    }

    #[test]
    fn test_playlist_to_playlist_copies_slots() {
        let command = add_command(
            &list(PlaylistKind::Public, "pub"),
            &list(PlaylistKind::Current, "cur"),
            &selection(),
        )
        .unwrap();

        assert_eq!(command.name, "copyKaraToPlaylist");
        assert_eq!(command.payload, json!({ "plc_ids": [10, 11, 12], "plaid": "cur" }));
    }

    #[test]
    fn test_blacklist_criteria_target() {
        let command = add_command(
            &list(PlaylistKind::Library, ""),
            &list(PlaylistKind::BlacklistCriteria, ""),
            &[Entry::new("k9", "Z")],
        )
        .unwrap();

        assert_eq!(command.name, "addCriterias");
        assert_eq!(command.payload, json!({ "criterias": [{ "type": 1001, "value": "k9" }] }));
    }

    #[test]
    fn test_same_playlist_rejected() {
        let current = list(PlaylistKind::Current, "cur");
        assert_eq!(
            add_command(&current, &current, &selection()),
            Err(DispatchError::SamePlaylist)
        );
    }

    #[test]
    fn test_remove_routes() {
        let removal = |kind| remove_command(&list(kind, "p"), &selection()).map(|c| c.name);

        assert_eq!(removal(PlaylistKind::Current), Ok("deleteKaraFromPlaylist"));
        assert_eq!(removal(PlaylistKind::Whitelist), Ok("deleteKaraFromWhitelist"));
        assert_eq!(removal(PlaylistKind::Favorites), Ok("deleteFavorites"));
        assert_eq!(removal(PlaylistKind::BlacklistCriteria), Ok("removeCriterias"));
        assert_eq!(
            removal(PlaylistKind::Library),
            Err(DispatchError::ReadOnlySource(PlaylistKind::Library))
        );
        assert_eq!(
            removal(PlaylistKind::Smart),
            Err(DispatchError::ReadOnlySource(PlaylistKind::Smart))
        );
    }

    #[test]
    fn test_empty_selection_rejected() {
        assert_eq!(
            remove_command(&list(PlaylistKind::Current, "p"), &[Entry::new("k1", "A")]),
            Err(DispatchError::Empty)
        );
    }

    #[test]
    fn test_reorder_requires_ordered_playlist() {
        let smart = list(PlaylistKind::Smart, "s");
        assert_eq!(
            reorder_command(&smart, 1, 0, 1),
            Err(DispatchError::Unordered(PlaylistKind::Smart))
        );

        let command = reorder_command(&list(PlaylistKind::Current, "c"), 4, 2, 5).unwrap();
        assert_eq!(command.payload, json!({ "plc_ids": [4], "pos": 7 }));
    }
}

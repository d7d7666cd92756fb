//! Optimistic local edits
//!
//! Every mutation changes the local window first and returns the remote
//! commands to issue afterwards. Local state is never restored when those
//! commands fail; the next structural refresh reconciles it.

use thiserror::Error;
use tracing::debug;

use super::dispatch::{self, DispatchError};
use super::entry::{Entry, EntryId, Plcid};
use super::playlist::PlaylistRef;
use super::window::WindowStore;
use crate::remote::MutationCommand;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("clear the filter and sort order before reordering")]
    NotNaturalOrder,
    #[error("row {0} is not loaded")]
    NotLoaded(usize),
}

/// Remote work left after a local edit
#[derive(Debug, Clone, Default)]
pub struct MutationPlan {
    /// Commands to issue in order; later ones are skipped once one fails
    pub commands: Vec<MutationCommand>,
    /// Entries removed from the local window
    pub removed: Vec<Entry>,
}

/// Optimistic mutation paths over a window store
pub struct MutationCoordinator;

impl MutationCoordinator {
    /// Flip the local selection of one entry. Returns the new state.
    pub fn toggle_check(store: &mut WindowStore, id: &EntryId) -> Option<bool> {
        let mut state = None;
        store.patch_by_predicate(
            |entry| entry.matches(id),
            |entry| {
                entry.checked = !entry.checked;
                state = Some(entry.checked);
            },
        );
        state
    }

    /// Check or uncheck every loaded entry
    pub fn select_all(store: &mut WindowStore, checked: bool) -> usize {
        store.patch_by_predicate(|_| true, |entry| entry.checked = checked)
    }

    /// Whether rows of this window may be moved at all
    pub fn ensure_reorderable(store: &WindowStore, playlist: &PlaylistRef) -> Result<(), MutationError> {
        if !playlist.kind.is_ordered() {
            return Err(DispatchError::Unordered(playlist.kind).into());
        }
        if !store.mode().is_natural() {
            return Err(MutationError::NotNaturalOrder);
        }
        Ok(())
    }

    /// Move row `old` to row `new` locally only. Returns the moved slot.
    pub fn splice(
        store: &mut WindowStore,
        playlist: &PlaylistRef,
        old: usize,
        new: usize,
    ) -> Result<Plcid, MutationError> {
        Self::ensure_reorderable(store, playlist)?;
        let plcid = store
            .row(old)
            .and_then(|entry| entry.plcid)
            .ok_or(MutationError::NotLoaded(old))?;
        if !store.move_slot(old, new) {
            return Err(MutationError::NotLoaded(new));
        }
        debug!("Moved slot {} from row {} to row {}", plcid, old, new);
        Ok(plcid)
    }

    /// Move row `old` to row `new` locally, returning the remote move command
    pub fn reorder(
        store: &mut WindowStore,
        playlist: &PlaylistRef,
        old: usize,
        new: usize,
    ) -> Result<MutationCommand, MutationError> {
        let plcid = Self::splice(store, playlist, old, new)?;
        Ok(dispatch::reorder_command(playlist, plcid, old, new)?)
    }

    /// Remove entries locally and plan their remote deletion
    pub fn delete(
        store: &mut WindowStore,
        playlist: &PlaylistRef,
        ids: &[EntryId],
    ) -> Result<MutationPlan, MutationError> {
        let entries = Self::collect(store, ids);
        let command = dispatch::remove_command(playlist, &entries)?;
        let removed = store.remove_by_id(ids);

        Ok(MutationPlan {
            commands: vec![command],
            removed,
        })
    }

    /// Copy entries into `target`. The local window is left alone apart from
    /// clearing the selection of what was copied.
    pub fn add_to(
        store: &mut WindowStore,
        source: &PlaylistRef,
        target: &PlaylistRef,
        ids: &[EntryId],
    ) -> Result<MutationPlan, MutationError> {
        let entries = Self::collect(store, ids);
        let command = dispatch::add_command(source, target, &entries)?;
        store.patch_by_predicate(
            |entry| ids.iter().any(|id| entry.matches(id)),
            |entry| entry.checked = false,
        );

        Ok(MutationPlan {
            commands: vec![command],
            removed: Vec::new(),
        })
    }

    /// Move entries into `target`: add there, then remove here
    pub fn transfer(
        store: &mut WindowStore,
        source: &PlaylistRef,
        target: &PlaylistRef,
        ids: &[EntryId],
    ) -> Result<MutationPlan, MutationError> {
        let entries = Self::collect(store, ids);
        let add = dispatch::add_command(source, target, &entries)?;
        let remove = dispatch::remove_command(source, &entries)?;
        let removed = store.remove_by_id(ids);

        Ok(MutationPlan {
            commands: vec![add, remove],
            removed,
        })
    }

    /// Flip the favorite flag on every loaded occurrence of a song
    pub fn toggle_favorite(store: &mut WindowStore, kid: &str) -> Option<MutationCommand> {
        let favorite = !store.loaded().find(|(_, entry)| entry.kid == kid)?.1.favorite;
        store.patch_by_predicate(|entry| entry.kid == kid, |entry| entry.favorite = favorite);
        Some(dispatch::favorite_command(kid, favorite))
    }

    /// Flip the upvote of one slot and adjust its count
    pub fn upvote(store: &mut WindowStore, plcid: Plcid) -> Option<MutationCommand> {
        let row = store.position(&EntryId::Slot(plcid))?;
        let entry = store.row_mut(row)?;

        entry.upvoted = !entry.upvoted;
        entry.upvote_count = if entry.upvoted {
            entry.upvote_count + 1
        } else {
            entry.upvote_count.saturating_sub(1)
        };
        Some(dispatch::vote_command(plcid, entry.upvoted))
    }

    fn collect(store: &WindowStore, ids: &[EntryId]) -> Vec<Entry> {
        store
            .loaded()
            .filter(|(_, entry)| ids.iter().any(|id| entry.matches(id)))
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::mode::ViewMode;
    use crate::queue::playlist::{PlaylistId, PlaylistKind};
    use crate::queue::window::{Locale, Page};
    use serde_json::json;

    fn store(len: usize) -> WindowStore {
        let mut store = WindowStore::default();
        store.replace(
            Page {
                content: (0..len)
                    .map(|i| Entry::in_slot(format!("k{}", i), i as Plcid, format!("Song {}", i)))
                    .collect(),
                count: len,
                from: 0,
                to: len,
                locale: Locale::new(),
            },
            ViewMode::default(),
        );
        store
    }

    fn current() -> PlaylistRef {
        PlaylistRef::playlist("cur", "Current", PlaylistKind::Current)
    }

    fn order(store: &WindowStore) -> Vec<Plcid> {
        store.loaded().filter_map(|(_, e)| e.plcid).collect()
    }

    #[test]
    fn test_toggle_and_select_all_stay_local() {
        let mut store = store(5);

        assert_eq!(MutationCoordinator::toggle_check(&mut store, &EntryId::Slot(3)), Some(true));
        assert_eq!(store.checked_ids(), vec![EntryId::Slot(3)]);
        assert_eq!(MutationCoordinator::toggle_check(&mut store, &EntryId::Slot(3)), Some(false));
        assert_eq!(MutationCoordinator::toggle_check(&mut store, &EntryId::Slot(99)), None);

        assert_eq!(MutationCoordinator::select_all(&mut store, true), 5);
        assert_eq!(store.checked_ids().len(), 5);
    }

    #[test]
    fn test_reorder_down_is_applied_locally_first() {
        let mut store = store(8);
        let command = MutationCoordinator::reorder(&mut store, &current(), 2, 5).unwrap();

        assert_eq!(order(&store), vec![0, 1, 3, 4, 5, 2, 6, 7]);
        assert_eq!(command.name, "editPLC");
        assert_eq!(command.payload, json!({ "plc_ids": [2], "pos": 7 }));
    }

    #[test]
    fn test_reorder_up() {
        let mut store = store(8);
        let command = MutationCoordinator::reorder(&mut store, &current(), 5, 2).unwrap();

        assert_eq!(order(&store), vec![0, 1, 5, 2, 3, 4, 6, 7]);
        assert_eq!(command.payload["pos"], 3);
    }

    #[test]
    fn test_reorder_rejected_when_filtered() {
        let mut store = store(4);
        store.apply(
            Page {
                content: vec![Entry::in_slot("k1", 1, "Song 1")],
                count: 1,
                from: 0,
                to: 1,
                locale: Locale::new(),
            },
            ViewMode::with_filter("song"),
            true,
        );

        assert_eq!(
            MutationCoordinator::reorder(&mut store, &current(), 0, 0),
            Err(MutationError::NotNaturalOrder)
        );
    }

    #[test]
    fn test_rejected_reorder_leaves_store_untouched() {
        let mut store = store(4);
        let smart = PlaylistRef::playlist("s", "Smart", PlaylistKind::Smart);

        assert!(MutationCoordinator::reorder(&mut store, &smart, 0, 3).is_err());
        assert_eq!(order(&store), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_splices_then_one_reorder_match_single_move() {
        let mut stepped = store(8);
        for (old, new) in [(1, 2), (2, 3), (3, 4), (4, 5)] {
            MutationCoordinator::splice(&mut stepped, &current(), old, new).unwrap();
        }
        stepped.move_slot(5, 1);
        let command = MutationCoordinator::reorder(&mut stepped, &current(), 1, 5).unwrap();

        let mut direct = store(8);
        MutationCoordinator::reorder(&mut direct, &current(), 1, 5).unwrap();

        assert_eq!(order(&stepped), order(&direct));
        assert_eq!(command.payload, json!({ "plc_ids": [1], "pos": 7 }));
    }

    #[test]
    fn test_delete_removes_optimistically() {
        let mut store = store(6);
        let plan =
            MutationCoordinator::delete(&mut store, &current(), &[EntryId::Slot(1), EntryId::Slot(4)])
                .unwrap();

        assert_eq!(order(&store), vec![0, 2, 3, 5]);
        assert_eq!(store.count(), 4);
        assert_eq!(plan.removed.len(), 2);
        assert_eq!(plan.commands[0].payload, json!({ "plc_ids": [1, 4] }));
    }

    #[test]
    fn test_rejected_delete_keeps_entries() {
        let mut store = store(3);
        let library = PlaylistRef::builtin(PlaylistId::Library);

        assert!(MutationCoordinator::delete(&mut store, &library, &[EntryId::Slot(1)]).is_err());
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_transfer_adds_then_removes() {
        let mut store = store(4);
        let public = PlaylistRef::playlist("pub", "Public", PlaylistKind::Public);

        let plan =
            MutationCoordinator::transfer(&mut store, &public, &current(), &[EntryId::Slot(2)])
                .unwrap();

        let names: Vec<_> = plan.commands.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["copyKaraToPlaylist", "deleteKaraFromPlaylist"]);
        assert_eq!(order(&store), vec![0, 1, 3]);
    }

    #[test]
    fn test_add_to_keeps_rows_and_clears_selection() {
        let mut store = store(3);
        MutationCoordinator::select_all(&mut store, true);

        let plan = MutationCoordinator::add_to(
            &mut store,
            &current(),
            &PlaylistRef::builtin(PlaylistId::Favorites),
            &[EntryId::Slot(0), EntryId::Slot(1)],
        )
        .unwrap();

        assert_eq!(plan.commands[0].name, "addFavorites");
        assert!(plan.removed.is_empty());
        assert_eq!(store.count(), 3);
        assert_eq!(store.checked_ids(), vec![EntryId::Slot(2)]);
    }

    #[test]
    fn test_favorite_and_vote_flip_flags() {
        let mut store = store(3);

        let command = MutationCoordinator::toggle_favorite(&mut store, "k1").unwrap();
        assert_eq!(command.name, "addFavorites");
        assert!(store.row(1).unwrap().favorite);

        let command = MutationCoordinator::upvote(&mut store, 2).unwrap();
        assert_eq!(command.payload, json!({ "plc_id": 2, "downvote": false }));
        assert_eq!(store.row(2).unwrap().upvote_count, 1);

        MutationCoordinator::upvote(&mut store, 2).unwrap();
        assert_eq!(store.row(2).unwrap().upvote_count, 0);

        assert!(MutationCoordinator::toggle_favorite(&mut store, "nope").is_none());
    }
}

//! Left and right panes, kept on distinct playlists

use tracing::info;

use super::fetch::FetchPlan;
use super::pane::Pane;
use super::playlist::{PlaylistId, PlaylistRef};
use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug)]
pub struct DualSideCoordinator {
    left: Pane,
    right: Pane,
}

impl DualSideCoordinator {
    /// Both panes start unmounted. A right side asking for the left side's
    /// playlist falls back to another list.
    pub fn new(left: PlaylistRef, right: PlaylistRef, config: &ClientConfig) -> Self {
        let right = if right.id == left.id {
            Self::fallback_for(&left)
        } else {
            right
        };

        Self {
            left: Pane::new(left, config),
            right: Pane::new(right, config),
        }
    }

    fn fallback_for(taken: &PlaylistRef) -> PlaylistRef {
        if taken.id == PlaylistId::Library {
            PlaylistRef::builtin(PlaylistId::Favorites)
        } else {
            PlaylistRef::builtin(PlaylistId::Library)
        }
    }

    pub fn pane(&self, side: Side) -> &Pane {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn pane_mut(&mut self, side: Side) -> &mut Pane {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn playlist(&self, side: Side) -> &PlaylistRef {
        self.pane(side).playlist()
    }

    pub fn opposite_playlist(&self, side: Side) -> &PlaylistRef {
        self.pane(side.opposite()).playlist()
    }

    /// Sides currently showing `id`
    pub fn sides_showing(&self, id: &PlaylistId) -> Vec<Side> {
        Side::BOTH
            .into_iter()
            .filter(|side| &self.playlist(*side).id == id)
            .collect()
    }

    pub fn mount_all(&mut self) -> Vec<(Side, FetchPlan)> {
        Side::BOTH
            .into_iter()
            .filter_map(|side| self.pane_mut(side).mount().map(|plan| (side, plan)))
            .collect()
    }

    /// Point `side` at `playlist`. Choosing what the opposite side shows
    /// swaps the two sides.
    pub fn set_playlist(&mut self, side: Side, playlist: PlaylistRef) -> Vec<(Side, FetchPlan)> {
        if self.playlist(side).id == playlist.id {
            return Vec::new();
        }

        let mut plans = Vec::new();
        if self.opposite_playlist(side).id == playlist.id {
            let previous = self.playlist(side).clone();
            info!(
                "Swapping sides: {} <-> {}",
                previous.id,
                self.opposite_playlist(side).id
            );
            if let Some(plan) = self.pane_mut(side.opposite()).switch_playlist(previous) {
                plans.push((side.opposite(), plan));
            }
        }

        if let Some(plan) = self.pane_mut(side).switch_playlist(playlist) {
            plans.push((side, plan));
        }
        plans
    }

    /// Refresh a playlist reference (renamed, kind changed) on the sides
    /// showing it, without refetching
    pub fn update_ref(&mut self, playlist: &PlaylistRef) {
        for side in self.sides_showing(&playlist.id) {
            self.pane_mut(side).set_playlist_ref(playlist.clone());
        }
    }
}

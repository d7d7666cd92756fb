//! One side of the browser: a playlist, its window and its cursor

use std::ops::Range;
use std::time::Instant;
use tracing::debug;

use super::cursor::{ScrollReport, ScrollTracker};
use super::entry::{FieldPatch, Plcid};
use super::fetch::{FetchCompletion, FetchCoordinator, FetchOutcome, FetchPlan, FetchTrigger, Ticket};
use super::mode::{Facet, SortOrder, ViewMode};
use super::playlist::PlaylistRef;
use super::window::{Page, WindowStore};
use crate::config::{ClientConfig, SideState};
use crate::remote::{RemoteError, WindowQuery};

#[derive(Debug)]
pub struct Pane {
    playlist: PlaylistRef,
    store: WindowStore,
    fetch: FetchCoordinator,
    cursor: ScrollTracker,
    /// Mode the store is fetched under
    mode: ViewMode,
    /// Filter text as typed, committed to `mode` once it settles
    filter_input: String,
    /// Rows the widget last reported visible
    visible: Range<usize>,
}

impl Pane {
    pub fn new(playlist: PlaylistRef, config: &ClientConfig) -> Self {
        Self {
            playlist,
            store: WindowStore::default(),
            fetch: FetchCoordinator::new(config.chunk_size),
            cursor: ScrollTracker::new(config.echo_window(), config.follow_playing),
            mode: ViewMode::default(),
            filter_input: String::new(),
            visible: 0..0,
        }
    }

    /// Take over a filter from a previous session. Only before mounting.
    pub fn restore_filter(&mut self, filter: &str) {
        debug_assert!(!self.store.is_initialized());
        self.filter_input = filter.to_string();
        self.mode.filter = filter.to_string();
    }

    pub fn playlist(&self) -> &PlaylistRef {
        &self.playlist
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WindowStore {
        &mut self.store
    }

    pub fn cursor(&self) -> &ScrollTracker {
        &self.cursor
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn filter_input(&self) -> &str {
        &self.filter_input
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_fetching()
    }

    pub fn state(&self) -> SideState {
        SideState {
            playlist: Some(self.playlist.id.clone()),
            filter: self.mode.filter.clone(),
        }
    }

    /// Window request for a plan issued by this pane
    pub fn query(&self, plan: &FetchPlan) -> WindowQuery {
        WindowQuery {
            playlist: self.playlist.id.clone(),
            from: plan.from,
            size: plan.size,
            mode: plan.mode.clone(),
        }
    }

    pub fn mount(&mut self) -> Option<FetchPlan> {
        self.trigger(FetchTrigger::Mount)
    }

    /// Show another playlist, discarding the current window
    pub fn switch_playlist(&mut self, playlist: PlaylistRef) -> Option<FetchPlan> {
        debug!("Switching pane from {} to {}", self.playlist.id, playlist.id);
        self.playlist = playlist;
        self.store.clear(self.mode.clone());
        self.cursor.reset();
        self.trigger(FetchTrigger::PlaylistSwitch)
    }

    /// Same playlist, new name or kind
    pub fn set_playlist_ref(&mut self, playlist: PlaylistRef) {
        debug_assert_eq!(playlist.id, self.playlist.id);
        self.playlist = playlist;
    }

    /// Record a keystroke in the filter box. Returns whether it differs from
    /// the committed filter, i.e. whether a debounced commit is needed.
    pub fn set_filter_input(&mut self, text: &str) -> bool {
        self.filter_input = text.to_string();
        self.filter_input != self.mode.filter
    }

    /// Commit the typed filter once typing settled
    pub fn commit_filter(&mut self) -> Option<FetchPlan> {
        if self.filter_input == self.mode.filter {
            return None;
        }
        self.mode.filter = self.filter_input.clone();
        self.trigger(FetchTrigger::ModeChanged)
    }

    pub fn set_order(&mut self, order: SortOrder) -> Option<FetchPlan> {
        if self.mode.order == order {
            return None;
        }
        self.mode.order = order;
        self.trigger(FetchTrigger::ModeChanged)
    }

    pub fn set_facet(&mut self, facet: Option<Facet>) -> Option<FetchPlan> {
        if self.mode.facet == facet {
            return None;
        }
        self.mode.facet = facet;
        self.trigger(FetchTrigger::ModeChanged)
    }

    /// Structural change of the displayed playlist
    pub fn invalidate(&mut self) -> Option<FetchPlan> {
        self.trigger(FetchTrigger::Invalidated)
    }

    /// The widget shows a new row range; fetch the first hole in it
    pub fn visible_range_changed(&mut self, range: Range<usize>) -> Option<FetchPlan> {
        self.visible = range;
        self.ensure_visible_loaded()
    }

    fn ensure_visible_loaded(&mut self) -> Option<FetchPlan> {
        if !self.store.is_initialized() {
            return None;
        }
        let row = self.store.first_unloaded(self.visible.clone())?;
        self.trigger(FetchTrigger::Prefetch { row })
    }

    fn trigger(&mut self, trigger: FetchTrigger) -> Option<FetchPlan> {
        self.fetch.trigger(trigger, &self.store, &self.mode)
    }

    /// Resolve a fetch issued by this pane
    pub fn complete_fetch(
        &mut self,
        ticket: Ticket,
        result: Result<Page, RemoteError>,
    ) -> FetchCompletion {
        let mut completion = self.fetch.complete(ticket, result, &mut self.store, &self.mode);

        if completion.next.is_none() && matches!(completion.outcome, FetchOutcome::Applied) {
            completion.next = self.ensure_visible_loaded();
        }
        completion
    }

    /// Now-playing push for this pane's playlist. Returns a row to scroll to.
    pub fn on_playing_changed(&mut self, plcid: Plcid, now: Instant) -> Option<usize> {
        self.cursor.on_playing_changed(&mut self.store, plcid, now)
    }

    pub fn on_fields_changed(&mut self, patches: &[FieldPatch]) -> usize {
        self.store.patch_fields(patches)
    }

    pub fn on_user_scroll(&mut self, row: usize, now: Instant) -> ScrollReport {
        self.cursor.on_user_scroll(row, now)
    }

    pub fn go_to_playing(&mut self, now: Instant) -> Option<usize> {
        self.cursor.go_to_playing(&self.store, now)
    }

    pub fn begin_drag(&mut self) {
        self.cursor.begin_drag();
    }

    pub fn end_drag(&mut self, now: Instant) -> Option<usize> {
        self.cursor.end_drag(&mut self.store, now)
    }

    pub fn tick(&mut self, now: Instant) {
        self.cursor.expire(now);
    }
}

//! Session driver
//!
//! Owns both panes and the gateway handle. Coordinator decisions become
//! spawned gateway calls whose results come back as [`EngineEvent`]s, which
//! the host feeds into [`QueueSession::handle`] one at a time.

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cursor::ScrollReport;
use super::entry::{EntryId, Plcid};
use super::fetch::{FetchOutcome, FetchPlan, Ticket};
use super::mode::{Facet, SortOrder};
use super::mutation::{MutationCoordinator, MutationError, MutationPlan};
use super::notice::{Notice, Notifier};
use super::pane::Pane;
use super::playlist::{PlaylistId, PlaylistKind, PlaylistRef};
use super::sides::{DualSideCoordinator, Side};
use super::window::Page;
use crate::config::{ClientConfig, SessionState, SideState};
use crate::remote::{MutationCommand, PlaylistSummary, PushEvent, RemoteError, RemoteGateway};
use crate::utils::debounce::Debouncer;

/// Results and notifications consumed by the session loop
#[derive(Debug)]
pub enum EngineEvent {
    FetchDone {
        side: Side,
        ticket: Ticket,
        result: Result<Page, RemoteError>,
    },
    MutationDone {
        action: String,
        result: Result<(), RemoteError>,
    },
    /// Filter typing on a side went quiet
    FilterSettled { side: Side },
    Push(PushEvent),
    PlaylistsLoaded(Result<Vec<PlaylistSummary>, RemoteError>),
}

/// Remote commands of one user action, issued in order
#[derive(Debug)]
struct MutationBatch {
    action: String,
    commands: Vec<MutationCommand>,
}

/// A row held by a move in progress
#[derive(Debug, Clone, Copy)]
struct Grab {
    side: Side,
    plcid: Plcid,
    /// Row the slot occupied when grabbed
    origin: usize,
    /// Row the slot is previewed at
    row: usize,
}

/// Instruction for the list widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollCommand {
    pub side: Side,
    pub row: usize,
}

pub struct QueueSession {
    gateway: Arc<dyn RemoteGateway>,
    sides: DualSideCoordinator,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    mutations: mpsc::UnboundedSender<MutationBatch>,
    grab: Option<Grab>,
    notifier: Notifier,
    left_filter: Debouncer<EngineEvent>,
    right_filter: Debouncer<EngineEvent>,
    /// Built-in lists followed by the server playlists
    playlists: Vec<PlaylistRef>,
    connected_once: bool,
}

impl QueueSession {
    /// Load the playlist list, restore both sides and mount them
    pub async fn start(
        gateway: Arc<dyn RemoteGateway>,
        config: &ClientConfig,
        state: &SessionState,
        notifier: Notifier,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>), RemoteError> {
        let summaries = gateway.list_playlists().await?;
        let playlists = known_playlists(&summaries);

        let left = resolve(&playlists, &state.left)
            .unwrap_or_else(|| PlaylistRef::builtin(PlaylistId::Library));
        let right = resolve(&playlists, &state.right)
            .or_else(|| {
                playlists
                    .iter()
                    .find(|playlist| playlist.kind == PlaylistKind::Current)
                    .cloned()
            })
            .unwrap_or_else(|| PlaylistRef::builtin(PlaylistId::Favorites));

        let mut sides = DualSideCoordinator::new(left, right, config);
        for (side, saved) in [(Side::Left, &state.left), (Side::Right, &state.right)] {
            if saved.playlist.as_ref() == Some(&sides.playlist(side).id) {
                sides.pane_mut(side).restore_filter(&saved.filter);
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (mutations, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_mutations(Arc::clone(&gateway), queue, events_tx.clone()));

        let mut session = Self {
            gateway,
            sides,
            mutations,
            grab: None,
            left_filter: Debouncer::new(config.filter_debounce(), events_tx.clone()),
            right_filter: Debouncer::new(config.filter_debounce(), events_tx.clone()),
            events_tx,
            notifier,
            playlists,
            connected_once: false,
        };

        info!(
            "Session started: {} | {}",
            session.sides.playlist(Side::Left).name,
            session.sides.playlist(Side::Right).name
        );
        for (side, plan) in session.sides.mount_all() {
            session.spawn_fetch(side, plan);
        }

        Ok((session, events_rx))
    }

    /// Sender for events produced outside the session, e.g. the push channel
    pub fn events(&self) -> mpsc::UnboundedSender<EngineEvent> {
        self.events_tx.clone()
    }

    pub fn pane(&self, side: Side) -> &Pane {
        self.sides.pane(side)
    }

    pub fn playlists(&self) -> &[PlaylistRef] {
        &self.playlists
    }

    pub fn session_state(&self) -> SessionState {
        SessionState {
            left: self.pane(Side::Left).state(),
            right: self.pane(Side::Right).state(),
        }
    }

    /// Apply one event. Returns the scrolls the widget has to perform.
    pub fn handle(&mut self, event: EngineEvent, now: Instant) -> Vec<ScrollCommand> {
        match event {
            EngineEvent::FetchDone {
                side,
                ticket,
                result,
            } => {
                self.on_fetch_done(side, ticket, result);
                Vec::new()
            }
            EngineEvent::MutationDone { action, result } => {
                match result {
                    Ok(()) => debug!("{} acknowledged", action),
                    Err(e) => self.notifier.remote_failure(&action, &e),
                }
                Vec::new()
            }
            EngineEvent::FilterSettled { side } => {
                if let Some(plan) = self.sides.pane_mut(side).commit_filter() {
                    self.spawn_fetch(side, plan);
                }
                Vec::new()
            }
            EngineEvent::Push(event) => self.on_push(event, now),
            EngineEvent::PlaylistsLoaded(Ok(summaries)) => {
                self.on_playlists_loaded(&summaries);
                Vec::new()
            }
            EngineEvent::PlaylistsLoaded(Err(e)) => {
                self.notifier.remote_failure("Loading playlists", &e);
                Vec::new()
            }
        }
    }

    fn on_fetch_done(&mut self, side: Side, ticket: Ticket, result: Result<Page, RemoteError>) {
        let pane = self.sides.pane_mut(side);
        let completion = pane.complete_fetch(ticket, result);

        if let FetchOutcome::Failed(e) = &completion.outcome {
            let action = format!("Loading {}", pane.playlist().name);
            self.notifier.remote_failure(&action, e);
        }
        if let Some(plan) = completion.next {
            self.spawn_fetch(side, plan);
        }
    }

    fn on_push(&mut self, event: PushEvent, now: Instant) -> Vec<ScrollCommand> {
        let mut scrolls = Vec::new();

        match event {
            PushEvent::Connected if !self.connected_once => {
                self.connected_once = true;
            }
            PushEvent::Connected => {
                info!("Push channel reconnected, refreshing both sides");
                for side in Side::BOTH {
                    self.invalidate(side);
                }
                self.spawn_list_playlists();
            }
            PushEvent::PlayingChanged { playlist, plcid } => {
                for side in self.sides.sides_showing(&playlist) {
                    if let Some(row) = self.sides.pane_mut(side).on_playing_changed(plcid, now) {
                        scrolls.push(ScrollCommand { side, row });
                    }
                }
            }
            PushEvent::StructureChanged { playlist } => {
                for side in self.sides.sides_showing(&playlist) {
                    self.invalidate(side);
                }
            }
            PushEvent::FieldsChanged { entries } => {
                let patched: usize = Side::BOTH
                    .into_iter()
                    .map(|side| self.sides.pane_mut(side).on_fields_changed(&entries))
                    .sum();
                debug!("Patched {} loaded rows from {} field updates", patched, entries.len());
            }
            PushEvent::PlaylistsChanged => self.spawn_list_playlists(),
        }

        scrolls
    }

    fn on_playlists_loaded(&mut self, summaries: &[PlaylistSummary]) {
        self.playlists = known_playlists(summaries);

        for side in Side::BOTH {
            let shown = self.sides.playlist(side).id.clone();
            match self.playlists.iter().find(|playlist| playlist.id == shown) {
                Some(playlist) => {
                    let playlist = playlist.clone();
                    self.sides.update_ref(&playlist);
                }
                None => {
                    let name = self.sides.playlist(side).name.clone();
                    self.notifier
                        .notify(Notice::info(format!("Playlist {} was removed", name)));
                    let fallback = self.fallback(side);
                    self.switch_playlist(side, fallback);
                }
            }
        }
    }

    /// A list for `side` that the opposite side isn't showing
    fn fallback(&self, side: Side) -> PlaylistRef {
        let opposite = &self.sides.opposite_playlist(side).id;
        let id = if *opposite == PlaylistId::Library {
            PlaylistId::Favorites
        } else {
            PlaylistId::Library
        };
        PlaylistRef::builtin(id)
    }

    fn invalidate(&mut self, side: Side) {
        if let Some(plan) = self.sides.pane_mut(side).invalidate() {
            self.spawn_fetch(side, plan);
        }
    }

    pub fn switch_playlist(&mut self, side: Side, playlist: PlaylistRef) {
        for (side, plan) in self.sides.set_playlist(side, playlist) {
            self.spawn_fetch(side, plan);
        }
    }

    /// Widget reports a new visible row range
    pub fn on_visible_range(&mut self, side: Side, range: Range<usize>) {
        if let Some(plan) = self.sides.pane_mut(side).visible_range_changed(range) {
            self.spawn_fetch(side, plan);
        }
    }

    pub fn on_user_scroll(&mut self, side: Side, row: usize, now: Instant) -> ScrollReport {
        self.sides.pane_mut(side).on_user_scroll(row, now)
    }

    pub fn go_to_playing(&mut self, side: Side, now: Instant) -> Option<ScrollCommand> {
        let row = self.sides.pane_mut(side).go_to_playing(now)?;
        Some(ScrollCommand { side, row })
    }

    /// Side and row of the entry held by a move in progress
    pub fn grabbed(&self) -> Option<(Side, usize)> {
        self.grab.map(|grab| (grab.side, grab.row))
    }

    /// Pick up the entry at `row` for moving. Playing updates are held back
    /// until it is dropped.
    pub fn grab(&mut self, side: Side, row: usize) -> bool {
        if self.grab.is_some() {
            return false;
        }
        let pane = self.sides.pane(side);
        if let Err(e) = MutationCoordinator::ensure_reorderable(pane.store(), pane.playlist()) {
            return self.reject(e);
        }
        let Some(plcid) = pane.store().row(row).and_then(|entry| entry.plcid) else {
            return false;
        };

        self.sides.pane_mut(side).begin_drag();
        self.grab = Some(Grab {
            side,
            plcid,
            origin: row,
            row,
        });
        true
    }

    /// Preview the held entry at `target`. Nothing is sent yet.
    pub fn move_grabbed(&mut self, target: usize) -> bool {
        let Some(grab) = self.grab else {
            return false;
        };
        if target == grab.row {
            return false;
        }
        let pane = self.sides.pane_mut(grab.side);
        let playlist = pane.playlist().clone();

        match MutationCoordinator::splice(pane.store_mut(), &playlist, grab.row, target) {
            Ok(_) => {
                self.grab = Some(Grab { row: target, ..grab });
                true
            }
            Err(e) => {
                debug!("Cannot move held entry to row {}: {}", target, e);
                false
            }
        }
    }

    /// Drop the held entry, sending a single move from where it was
    /// grabbed to where it was dropped
    pub fn drop_grabbed(&mut self, now: Instant) -> Option<ScrollCommand> {
        let grab = self.grab.take()?;
        let pane = self.sides.pane_mut(grab.side);
        let playlist = pane.playlist().clone();
        let row = pane.store().position(&EntryId::Slot(grab.plcid));

        if row != Some(grab.row) {
            self.notifier.notify(Notice::info(format!(
                "{} changed while moving, move cancelled",
                playlist.name
            )));
        } else if grab.row != grab.origin {
            let store = pane.store_mut();
            store.move_slot(grab.row, grab.origin);
            match MutationCoordinator::reorder(store, &playlist, grab.origin, grab.row) {
                Ok(command) => {
                    self.queue_mutation(format!("Moving in {}", playlist.name), vec![command])
                }
                Err(e) => {
                    self.reject(e);
                }
            }
        }

        let row = self.sides.pane_mut(grab.side).end_drag(now)?;
        Some(ScrollCommand {
            side: grab.side,
            row,
        })
    }

    pub fn tick(&mut self, now: Instant) {
        for side in Side::BOTH {
            self.sides.pane_mut(side).tick(now);
        }
    }

    /// Filter keystroke; the refetch waits until typing settles
    pub fn set_filter(&mut self, side: Side, text: &str) {
        let changed = self.sides.pane_mut(side).set_filter_input(text);
        let debouncer = match side {
            Side::Left => &mut self.left_filter,
            Side::Right => &mut self.right_filter,
        };

        if changed {
            debouncer.trigger(EngineEvent::FilterSettled { side });
        } else {
            debouncer.cancel();
        }
    }

    pub fn set_order(&mut self, side: Side, order: SortOrder) {
        if let Some(plan) = self.sides.pane_mut(side).set_order(order) {
            self.spawn_fetch(side, plan);
        }
    }

    pub fn set_facet(&mut self, side: Side, facet: Option<Facet>) {
        if let Some(plan) = self.sides.pane_mut(side).set_facet(facet) {
            self.spawn_fetch(side, plan);
        }
    }

    /// Checked entries of a side, or the entry at `row` when none are
    pub fn selection(&self, side: Side, row: Option<usize>) -> Vec<EntryId> {
        let store = self.pane(side).store();
        let checked = store.checked_ids();
        if !checked.is_empty() {
            return checked;
        }
        row.and_then(|row| store.row(row))
            .map(|entry| vec![entry.id()])
            .unwrap_or_default()
    }

    pub fn toggle_check(&mut self, side: Side, row: usize) -> Option<bool> {
        let store = self.sides.pane_mut(side).store_mut();
        let id = store.row(row)?.id();
        MutationCoordinator::toggle_check(store, &id)
    }

    pub fn select_all(&mut self, side: Side, checked: bool) -> usize {
        MutationCoordinator::select_all(self.sides.pane_mut(side).store_mut(), checked)
    }

    pub fn delete(&mut self, side: Side, ids: &[EntryId]) -> bool {
        let pane = self.sides.pane_mut(side);
        let playlist = pane.playlist().clone();

        let result = MutationCoordinator::delete(pane.store_mut(), &playlist, ids);
        self.run_plan(format!("Removing from {}", playlist.name), result)
    }

    /// Copy entries to the opposite side's playlist
    pub fn add_to_opposite(&mut self, side: Side, ids: &[EntryId]) -> bool {
        let target = self.sides.opposite_playlist(side).clone();
        let pane = self.sides.pane_mut(side);
        let source = pane.playlist().clone();

        let result = MutationCoordinator::add_to(pane.store_mut(), &source, &target, ids);
        self.run_plan(format!("Adding to {}", target.name), result)
    }

    /// Move entries to the opposite side's playlist
    pub fn transfer_to_opposite(&mut self, side: Side, ids: &[EntryId]) -> bool {
        let target = self.sides.opposite_playlist(side).clone();
        let pane = self.sides.pane_mut(side);
        let source = pane.playlist().clone();

        let result = MutationCoordinator::transfer(pane.store_mut(), &source, &target, ids);
        self.run_plan(format!("Moving to {}", target.name), result)
    }

    /// Flip the favorite flag of the song at `row`, on both sides
    pub fn toggle_favorite(&mut self, side: Side, row: usize) -> bool {
        let Some(kid) = self.pane(side).store().row(row).map(|entry| entry.kid.clone()) else {
            return false;
        };
        let Some(command) =
            MutationCoordinator::toggle_favorite(self.sides.pane_mut(side).store_mut(), &kid)
        else {
            return false;
        };

        let favorite = self
            .pane(side)
            .store()
            .row(row)
            .is_some_and(|entry| entry.favorite);
        self.sides
            .pane_mut(side.opposite())
            .store_mut()
            .patch_by_predicate(|entry| entry.kid == kid, |entry| entry.favorite = favorite);

        self.queue_mutation("Updating favorites".to_string(), vec![command]);
        true
    }

    pub fn upvote(&mut self, side: Side, row: usize) -> bool {
        let store = self.sides.pane_mut(side).store_mut();
        let Some(plcid) = store.row(row).and_then(|entry| entry.plcid) else {
            return false;
        };
        let Some(command) = MutationCoordinator::upvote(store, plcid) else {
            return false;
        };

        self.queue_mutation("Voting".to_string(), vec![command]);
        true
    }

    fn run_plan(&mut self, action: String, result: Result<MutationPlan, MutationError>) -> bool {
        match result {
            Ok(plan) => {
                debug!("{}: {} rows removed locally", action, plan.removed.len());
                self.queue_mutation(action, plan.commands);
                true
            }
            Err(e) => self.reject(e),
        }
    }

    fn reject(&self, error: MutationError) -> bool {
        self.notifier.notify(Notice::error(error.to_string()));
        false
    }

    fn spawn_fetch(&self, side: Side, plan: FetchPlan) {
        let query = self.pane(side).query(&plan);
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = gateway.fetch_window(&query).await;
            let _ = tx.send(EngineEvent::FetchDone {
                side,
                ticket: plan.ticket,
                result,
            });
        });
    }

    fn queue_mutation(&self, action: String, commands: Vec<MutationCommand>) {
        if self.mutations.send(MutationBatch { action, commands }).is_err() {
            warn!("Mutation queue stopped, dropping commands");
        }
    }

    fn spawn_list_playlists(&self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = gateway.list_playlists().await;
            let _ = tx.send(EngineEvent::PlaylistsLoaded(result));
        });
    }
}

/// Issue queued commands one at a time, in submission order. Within a
/// batch, the first failure skips the remaining commands.
async fn run_mutations(
    gateway: Arc<dyn RemoteGateway>,
    mut queue: mpsc::UnboundedReceiver<MutationBatch>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    while let Some(MutationBatch { action, commands }) = queue.recv().await {
        let mut result = Ok(());
        for command in &commands {
            debug!("Issuing {}", command.name);
            if let Err(e) = gateway.mutate(command).await {
                result = Err(e);
                break;
            }
        }
        if events.send(EngineEvent::MutationDone { action, result }).is_err() {
            break;
        }
    }
    debug!("Mutation queue closed");
}

fn known_playlists(summaries: &[PlaylistSummary]) -> Vec<PlaylistRef> {
    PlaylistRef::builtins()
        .into_iter()
        .chain(summaries.iter().map(PlaylistSummary::to_ref))
        .collect()
}

fn resolve(playlists: &[PlaylistRef], saved: &SideState) -> Option<PlaylistRef> {
    let id = saved.playlist.as_ref()?;
    playlists.iter().find(|playlist| &playlist.id == id).cloned()
}

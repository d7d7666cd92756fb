//! Single-flight fetch coordination for one window store
//!
//! At most one fetch per store is in flight. Triggers arriving meanwhile are
//! coalesced into a single pending trigger that is planned the moment the
//! in-flight fetch resolves, so responses are applied in issue order.

use tracing::debug;

use super::mode::ViewMode;
use super::window::{Page, WindowStore};
use crate::remote::RemoteError;

/// Smallest and largest accepted chunk sizes
pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 400;

pub type Ticket = u64;

/// Why a fetch is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Mount,
    PlaylistSwitch,
    ModeChanged,
    /// Structural push event for the displayed playlist
    Invalidated,
    /// The widget needs this row
    Prefetch { row: usize },
}

impl FetchTrigger {
    /// Reset-class triggers refetch from row 0 and replace the store
    pub fn is_reset(&self) -> bool {
        !matches!(self, FetchTrigger::Prefetch { .. })
    }
}

/// A fetch to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub ticket: Ticket,
    pub from: usize,
    pub size: usize,
    /// Replace the store instead of merging into it
    pub reset: bool,
    pub mode: ViewMode,
}

/// What happened to a resolved fetch
#[derive(Debug)]
pub enum FetchOutcome {
    Applied,
    /// A newer reset-class trigger arrived while in flight
    Superseded,
    /// Not the in-flight ticket
    Stale,
    Failed(RemoteError),
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub outcome: FetchOutcome,
    /// Pending trigger turned into the next fetch
    pub next: Option<FetchPlan>,
}

#[derive(Debug)]
enum FetchState {
    Idle,
    Fetching {
        ticket: Ticket,
        reset: bool,
        mode: ViewMode,
    },
}

#[derive(Debug)]
pub struct FetchCoordinator {
    chunk_size: usize,
    state: FetchState,
    pending: Option<FetchTrigger>,
    next_ticket: Ticket,
}

impl FetchCoordinator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE),
            state: FetchState::Idle,
            pending: None,
            next_ticket: 1,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Aligned chunk start for a row
    pub fn chunk_start(&self, row: usize) -> usize {
        (row / self.chunk_size) * self.chunk_size
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self.state, FetchState::Fetching { .. })
    }

    pub fn pending(&self) -> Option<FetchTrigger> {
        self.pending
    }

    /// Handle a trigger. Returns the fetch to issue, if any.
    pub fn trigger(
        &mut self,
        trigger: FetchTrigger,
        store: &WindowStore,
        mode: &ViewMode,
    ) -> Option<FetchPlan> {
        if self.is_fetching() {
            self.coalesce(trigger);
            debug!("Fetch in flight, pending trigger now {:?}", self.pending);
            return None;
        }
        self.plan(trigger, store, mode)
    }

    /// Resolve the in-flight fetch, applying its page when still current
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Result<Page, RemoteError>,
        store: &mut WindowStore,
        mode: &ViewMode,
    ) -> FetchCompletion {
        let (reset, fetched_mode) = match &self.state {
            FetchState::Fetching {
                ticket: current,
                reset,
                mode,
            } if *current == ticket => (*reset, mode.clone()),
            _ => {
                debug!("Discarding stale fetch response {}", ticket);
                return FetchCompletion {
                    outcome: FetchOutcome::Stale,
                    next: None,
                };
            }
        };
        self.state = FetchState::Idle;

        let superseded = self.pending.is_some_and(|pending| pending.is_reset());
        let outcome = match result {
            Ok(_) if superseded => {
                debug!("Fetch {} superseded by {:?}", ticket, self.pending);
                FetchOutcome::Superseded
            }
            Ok(page) => {
                store.apply(page, fetched_mode, reset);
                FetchOutcome::Applied
            }
            Err(e) => FetchOutcome::Failed(e),
        };

        let next = self
            .pending
            .take()
            .and_then(|trigger| self.plan(trigger, store, mode));

        FetchCompletion { outcome, next }
    }

    fn coalesce(&mut self, trigger: FetchTrigger) {
        self.pending = Some(match self.pending.take() {
            Some(previous) if previous.is_reset() && !trigger.is_reset() => previous,
            _ => trigger,
        });
    }

    fn plan(
        &mut self,
        trigger: FetchTrigger,
        store: &WindowStore,
        mode: &ViewMode,
    ) -> Option<FetchPlan> {
        // A store still holding rows of another mode cannot take a merge
        let mergeable = store.is_initialized() && store.mode() == mode;
        let (from, size, reset) = match trigger {
            FetchTrigger::Prefetch { row } if mergeable => {
                if row >= store.count() || store.is_loaded(row) {
                    return None;
                }
                let from = self.chunk_start(row);
                let size = self.chunk_size.min(store.count() - from);
                (from, size, false)
            }
            _ => (0, self.chunk_size, true),
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.state = FetchState::Fetching {
            ticket,
            reset,
            mode: mode.clone(),
        };

        debug!(
            "Planned fetch {} for {:?}: rows {}..{} (reset: {})",
            ticket,
            trigger,
            from,
            from + size,
            reset
        );

        Some(FetchPlan {
            ticket,
            from,
            size,
            reset,
            mode: mode.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::entry::Entry;
    use crate::queue::window::Locale;

    fn page(from: usize, len: usize, count: usize) -> Page {
        Page {
            content: (from..from + len)
                .map(|i| Entry::in_slot(format!("k{}", i), i as u64, "Song"))
                .collect(),
            count,
            from,
            to: from + len,
            locale: Locale::new(),
        }
    }

    fn loaded_store(len: usize, count: usize) -> WindowStore {
        let mut store = WindowStore::default();
        store.replace(page(0, len, count), ViewMode::default());
        store
    }

    #[test]
    fn test_chunk_size_is_clamped() {
        assert_eq!(FetchCoordinator::new(10).chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(FetchCoordinator::new(5000).chunk_size(), MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_prefetch_scenario_plans_aligned_chunk() {
        let store = loaded_store(400, 1000);
        let mut fetch = FetchCoordinator::new(400);

        let plan = fetch
            .trigger(FetchTrigger::Prefetch { row: 650 }, &store, &ViewMode::default())
            .unwrap();

        assert_eq!(plan.from, 600);
        assert_eq!(plan.size, 400);
        assert_eq!(plan.from + plan.size, 1000);
        assert!(!plan.reset);
    }

    #[test]
    fn test_prefetch_size_bounded_by_count() {
        let store = loaded_store(100, 250);
        let mut fetch = FetchCoordinator::new(100);

        let plan = fetch
            .trigger(FetchTrigger::Prefetch { row: 230 }, &store, &ViewMode::default())
            .unwrap();

        assert_eq!((plan.from, plan.size), (200, 50));
    }

    #[test]
    fn test_prefetch_of_loaded_or_out_of_range_row_is_noop() {
        let store = loaded_store(400, 1000);
        let mut fetch = FetchCoordinator::new(400);
        let mode = ViewMode::default();

        assert!(fetch.trigger(FetchTrigger::Prefetch { row: 10 }, &store, &mode).is_none());
        assert!(fetch.trigger(FetchTrigger::Prefetch { row: 1000 }, &store, &mode).is_none());
        assert!(!fetch.is_fetching());
    }

    #[test]
    fn test_prefetch_before_first_load_resets() {
        let store = WindowStore::default();
        let mut fetch = FetchCoordinator::new(200);

        let plan = fetch
            .trigger(FetchTrigger::Prefetch { row: 900 }, &store, &ViewMode::default())
            .unwrap();

        assert_eq!(plan.from, 0);
        assert!(plan.reset);
    }

    #[test]
    fn test_prefetch_under_new_mode_resets() {
        let store = loaded_store(100, 1000);
        let mut fetch = FetchCoordinator::new(100);

        let plan = fetch
            .trigger(FetchTrigger::Prefetch { row: 530 }, &store, &ViewMode::with_filter("queen"))
            .unwrap();

        assert_eq!((plan.from, plan.size), (0, 100));
        assert!(plan.reset);
        assert_eq!(plan.mode.filter, "queen");
    }

    #[test]
    fn test_single_flight_coalesces_triggers() {
        let mut store = WindowStore::default();
        let mode = ViewMode::default();
        let mut fetch = FetchCoordinator::new(100);

        let first = fetch.trigger(FetchTrigger::Mount, &store, &mode).unwrap();
        for _ in 0..25 {
            assert!(fetch.trigger(FetchTrigger::Invalidated, &store, &mode).is_none());
        }

        let done = fetch.complete(first.ticket, Ok(page(0, 100, 300)), &mut store, &mode);
        assert!(matches!(done.outcome, FetchOutcome::Superseded));
        let second = done.next.expect("one follow-up fetch");

        let done = fetch.complete(second.ticket, Ok(page(0, 100, 300)), &mut store, &mode);
        assert!(matches!(done.outcome, FetchOutcome::Applied));
        assert!(done.next.is_none());
        assert!(!fetch.is_fetching());
    }

    #[test]
    fn test_pending_prefetch_still_applies_in_flight_page() {
        let mut store = WindowStore::default();
        let mode = ViewMode::default();
        let mut fetch = FetchCoordinator::new(100);

        let first = fetch.trigger(FetchTrigger::Mount, &store, &mode).unwrap();
        fetch.trigger(FetchTrigger::Prefetch { row: 150 }, &store, &mode);
        fetch.trigger(FetchTrigger::Prefetch { row: 250 }, &store, &mode);

        let done = fetch.complete(first.ticket, Ok(page(0, 100, 300)), &mut store, &mode);
        assert!(matches!(done.outcome, FetchOutcome::Applied));
        assert_eq!(store.len(), 100);

        let next = done.next.unwrap();
        assert_eq!((next.from, next.reset), (200, false));
    }

    #[test]
    fn test_reset_pending_not_downgraded_by_prefetch() {
        let store = WindowStore::default();
        let mode = ViewMode::default();
        let mut fetch = FetchCoordinator::new(100);

        fetch.trigger(FetchTrigger::Mount, &store, &mode);
        fetch.trigger(FetchTrigger::ModeChanged, &store, &mode);
        fetch.trigger(FetchTrigger::Prefetch { row: 10 }, &store, &mode);

        assert_eq!(fetch.pending(), Some(FetchTrigger::ModeChanged));
    }

    #[test]
    fn test_failure_keeps_last_good_state() {
        let mut store = loaded_store(100, 300);
        let mode = ViewMode::default();
        let mut fetch = FetchCoordinator::new(100);

        let plan = fetch
            .trigger(FetchTrigger::Prefetch { row: 120 }, &store, &mode)
            .unwrap();
        let done = fetch.complete(
            plan.ticket,
            Err(RemoteError::Transport("connection reset".into())),
            &mut store,
            &mode,
        );

        assert!(matches!(done.outcome, FetchOutcome::Failed(_)));
        assert!(done.next.is_none());
        assert_eq!(store.len(), 100);
        assert_eq!(store.count(), 300);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut store = WindowStore::default();
        let mode = ViewMode::default();
        let mut fetch = FetchCoordinator::new(100);

        let plan = fetch.trigger(FetchTrigger::Mount, &store, &mode).unwrap();
        let done = fetch.complete(plan.ticket + 7, Ok(page(0, 10, 10)), &mut store, &mode);

        assert!(matches!(done.outcome, FetchOutcome::Stale));
        assert!(fetch.is_fetching());
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_page_applied_under_mode_it_was_fetched_with() {
        let mut store = WindowStore::default();
        let mut fetch = FetchCoordinator::new(100);
        let issued = ViewMode::with_filter("queen");

        let plan = fetch.trigger(FetchTrigger::ModeChanged, &store, &issued).unwrap();
        fetch.complete(plan.ticket, Ok(page(0, 5, 5)), &mut store, &ViewMode::default());

        assert_eq!(store.mode().filter, "queen");
    }
}

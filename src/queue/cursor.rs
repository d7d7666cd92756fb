//! Playback cursor and scroll follow tracking
//!
//! Programmatic scrolls are echoed back by the list widget as ordinary
//! scroll reports. Reports arriving within the echo window after a
//! programmatic scroll are therefore not treated as user input.

use std::time::{Duration, Instant};
use tracing::debug;

use super::entry::{EntryId, Plcid};
use super::window::WindowStore;

pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_millis(500);
pub const MAX_ECHO_WINDOW: Duration = Duration::from_millis(1000);

/// Pending programmatic scroll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollIntent {
    pub target_index: usize,
    pub follow_playing: bool,
    pub suppress_echo: bool,
    pub issued_at: Instant,
}

/// How a widget scroll report was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollReport {
    /// Caused by our own scroll command
    Echo,
    /// The user scrolled
    Manual,
}

#[derive(Debug)]
pub struct ScrollTracker {
    follow_playing: bool,
    echo_window: Duration,
    intent: Option<ScrollIntent>,
    last_programmatic: Option<Instant>,
    /// Drag latch: playing updates are held back while set
    stop_update: bool,
    deferred: Option<Plcid>,
    playing: Option<Plcid>,
}

impl ScrollTracker {
    pub fn new(echo_window: Duration, follow_playing: bool) -> Self {
        Self {
            follow_playing,
            echo_window: echo_window.min(MAX_ECHO_WINDOW),
            intent: None,
            last_programmatic: None,
            stop_update: false,
            deferred: None,
            playing: None,
        }
    }

    pub fn follow_playing(&self) -> bool {
        self.follow_playing
    }

    pub fn intent(&self) -> Option<&ScrollIntent> {
        self.intent.as_ref()
    }

    pub fn playing(&self) -> Option<Plcid> {
        self.playing
    }

    pub fn is_dragging(&self) -> bool {
        self.stop_update
    }

    /// A "now playing" push for the displayed playlist.
    ///
    /// Returns the row to scroll to when following.
    pub fn on_playing_changed(
        &mut self,
        store: &mut WindowStore,
        plcid: Plcid,
        now: Instant,
    ) -> Option<usize> {
        if self.stop_update {
            debug!("Deferring playing update {} until drag ends", plcid);
            self.deferred = Some(plcid);
            return None;
        }
        self.apply_playing(store, plcid, now)
    }

    fn apply_playing(&mut self, store: &mut WindowStore, plcid: Plcid, now: Instant) -> Option<usize> {
        store.patch_by_predicate(
            |entry| entry.playing && entry.plcid != Some(plcid),
            |entry| {
                entry.playing = false;
                entry.dejavu = true;
            },
        );
        store.patch_by_predicate(
            |entry| entry.plcid == Some(plcid),
            |entry| entry.playing = true,
        );
        self.playing = Some(plcid);

        if !self.follow_playing {
            return None;
        }
        let row = store.position(&EntryId::Slot(plcid))?;
        Some(self.scroll_to(row, now))
    }

    /// Re-enable follow mode and scroll to the playing entry if loaded
    pub fn go_to_playing(&mut self, store: &WindowStore, now: Instant) -> Option<usize> {
        self.follow_playing = true;

        let row = self
            .playing
            .and_then(|plcid| store.position(&EntryId::Slot(plcid)))
            .or_else(|| store.loaded().find(|(_, entry)| entry.playing).map(|(row, _)| row))?;
        Some(self.scroll_to(row, now))
    }

    fn scroll_to(&mut self, row: usize, now: Instant) -> usize {
        self.intent = Some(ScrollIntent {
            target_index: row,
            follow_playing: self.follow_playing,
            suppress_echo: true,
            issued_at: now,
        });
        self.last_programmatic = Some(now);
        row
    }

    /// The widget reports it is now showing `row` at the top
    pub fn on_user_scroll(&mut self, row: usize, now: Instant) -> ScrollReport {
        let suppress = self.intent.as_ref().is_none_or(|intent| intent.suppress_echo);
        let within_window = self
            .last_programmatic
            .is_some_and(|at| now.saturating_duration_since(at) < self.echo_window);

        if suppress && within_window {
            if self.intent.as_ref().is_some_and(|intent| intent.target_index == row) {
                self.intent = None;
            }
            return ScrollReport::Echo;
        }

        if self.follow_playing {
            debug!("Manual scroll to row {}, follow mode off", row);
        }
        self.intent = None;
        self.last_programmatic = None;
        self.follow_playing = false;
        ScrollReport::Manual
    }

    /// Drop an intent whose echo window has elapsed
    pub fn expire(&mut self, now: Instant) {
        if self
            .intent
            .as_ref()
            .is_some_and(|intent| now.saturating_duration_since(intent.issued_at) >= self.echo_window)
        {
            self.intent = None;
        }
    }

    /// Hold back playing updates while the user drags an entry
    pub fn begin_drag(&mut self) {
        self.stop_update = true;
    }

    /// Release the drag latch, applying the last held-back playing update
    pub fn end_drag(&mut self, store: &mut WindowStore, now: Instant) -> Option<usize> {
        self.stop_update = false;
        let plcid = self.deferred.take()?;
        self.apply_playing(store, plcid, now)
    }

    /// Forget everything tied to the current playlist
    pub fn reset(&mut self) {
        self.intent = None;
        self.last_programmatic = None;
        self.deferred = None;
        self.playing = None;
    }
}

//! TUI-aware logging
//!
//! While the TUI owns the terminal, writing to stderr would corrupt the
//! display. Events are then captured into a small in-memory ring that the
//! browser shows in its log strip instead.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::field::{Field, Visit};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Lines kept while the TUI is active
const RING_CAPACITY: usize = 200;

/// Global flag to indicate whether TUI mode is active
static TUI_MODE: AtomicBool = AtomicBool::new(false);

static LOG_RING: Mutex<VecDeque<String>> = Mutex::new(VecDeque::new());

/// Set TUI mode on or off
pub fn set_tui_mode(enabled: bool) {
    TUI_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if TUI mode is active
pub fn is_tui_mode() -> bool {
    TUI_MODE.load(Ordering::SeqCst)
}

/// The newest `n` captured lines, oldest first
pub fn recent_lines(n: usize) -> Vec<String> {
    let Ok(ring) = LOG_RING.lock() else {
        return Vec::new();
    };
    ring.iter().skip(ring.len().saturating_sub(n)).cloned().collect()
}

fn capture(line: String) {
    if let Ok(mut ring) = LOG_RING.lock() {
        if ring.len() == RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(line);
    }
}

/// Collects the message and fields of an event into one line
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}

/// Forwards to `inner` normally, captures into the ring in TUI mode
pub struct TuiAwareLayer<L> {
    inner: L,
}

impl<L> TuiAwareLayer<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<S, L> Layer<S> for TuiAwareLayer<L>
where
    S: tracing::Subscriber,
    L: Layer<S>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_event(event, ctx);
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        capture(format!(
            "{:>5} {}{}",
            event.metadata().level().to_string(),
            visitor.message,
            visitor.fields
        ));
    }

    fn on_enter(&self, id: &tracing::span::Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_enter(id, ctx);
        }
    }

    fn on_exit(&self, id: &tracing::span::Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_exit(id, ctx);
        }
    }
}

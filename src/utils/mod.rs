//! Utility functions

pub mod debounce;
pub mod tui_log;

pub use tui_log::{TuiAwareLayer, set_tui_mode};

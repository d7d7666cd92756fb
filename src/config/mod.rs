//! Client configuration and session state

pub mod client;
pub mod session;

pub use client::ClientConfig;
pub use session::{SessionState, SideState};

//! Karaoke server client module

pub mod client;
pub mod error;
pub mod events;
pub mod gateway;
pub mod models;

pub use client::KaraokeClient;
pub use error::RemoteError;
pub use events::PushEvent;
pub use gateway::RemoteGateway;
pub use models::*;

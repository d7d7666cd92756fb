//! Seam between the queue engine and the karaoke server

use async_trait::async_trait;

use super::error::RemoteError;
use super::models::{MutationCommand, PlaylistSummary, WindowQuery};
use crate::queue::window::Page;

/// Request/response façade over the karaoke server
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch one window of a playlist
    async fn fetch_window(&self, query: &WindowQuery) -> Result<Page, RemoteError>;

    /// Issue a mutation command and wait for its acknowledgement
    async fn mutate(&self, command: &MutationCommand) -> Result<(), RemoteError>;

    /// All server playlists the session can see
    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, RemoteError>;
}

//! Karaoke server HTTP client

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{ErrorBody, RemoteError};
use super::gateway::RemoteGateway;
use super::models::*;
use crate::queue::window::Page;

/// Header carrying the session token
const AUTH_HEADER: &str = "authorization";

/// HTTP client for the karaoke server command API
#[derive(Clone)]
pub struct KaraokeClient {
    base_url: Url,
    token: Option<String>,
    http_client: Client,
}

impl KaraokeClient {
    /// Create a new client. `token` may be omitted for the login call.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .with_context(|| format!("Invalid server URL: {}", base_url))?;

        let http_client = Client::builder()
            .user_agent(concat!("karaq/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url,
            token,
            http_client,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// URL of the server push channel
    pub fn events_url(&self) -> Result<Url, RemoteError> {
        self.endpoint("api/events")
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::Transport(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTH_HEADER, token),
            None => request,
        }
    }

    /// Exchange credentials for a session token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, RemoteError> {
        let url = self.endpoint("api/auth/login")?;
        debug!("Logging in as {} at {}", username, url);

        let response = self
            .http_client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        Self::decode(Self::check_response(response).await?).await
    }

    /// Run a command and decode its response body
    pub async fn command<T: DeserializeOwned>(
        &self,
        cmd: &str,
        body: &Value,
    ) -> Result<T, RemoteError> {
        let response = self.send_command(cmd, body).await?;
        Self::decode(response).await
    }

    async fn send_command(&self, cmd: &str, body: &Value) -> Result<Response, RemoteError> {
        let url = self.endpoint("api/command")?;
        debug!("Sending command {}: {}", cmd, body);

        let response = self
            .authorize(self.http_client.post(url))
            .json(&CommandRequest { cmd, body })
            .send()
            .await?;

        Self::check_response(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        response
            .json()
            .await
            .map_err(|e| RemoteError::Transport(format!("undecodable response: {}", e)))
    }

    /// Map non-success statuses onto the error taxonomy
    async fn check_response(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.ok();
        let error = RemoteError::from_status(status.as_u16(), body);
        debug!("Command failed with {}: {}", status, error);
        Err(error)
    }
}

#[async_trait]
impl RemoteGateway for KaraokeClient {
    async fn fetch_window(&self, query: &WindowQuery) -> Result<Page, RemoteError> {
        let command = query.command();
        let response: WindowResponse = self.command(command.name, &command.payload).await?;

        debug!(
            "Fetched {} rows of {} ({}..{} of {})",
            response.content.len(),
            query.playlist,
            response.infos.from,
            response.infos.to,
            response.infos.count
        );
        Ok(response.into())
    }

    async fn mutate(&self, command: &MutationCommand) -> Result<(), RemoteError> {
        self.send_command(command.name, &command.payload).await?;
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, RemoteError> {
        let playlists: Vec<PlaylistSummary> = self.command("getPlaylists", &json!({})).await?;
        debug!("Found {} playlists", playlists.len());
        Ok(playlists)
    }
}

//! Keyring-based session storage for the karaoke server

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use keyring::Entry;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::remote::KaraokeClient;

const KEYRING_SERVICE: &str = "karaq";

/// Server location and session token
#[derive(Debug, Clone)]
pub struct ServerSession {
    pub url: String,
    pub username: String,
    pub token: String,
}

impl ServerSession {
    /// HTTP client carrying this session's token
    pub fn client(&self, config: &ClientConfig) -> Result<KaraokeClient> {
        KaraokeClient::new(&self.url, Some(self.token.clone()), config.request_timeout())
    }
}

/// Manages session storage
pub struct AuthManager;

impl AuthManager {
    /// Log in to the karaoke server
    ///
    /// Reuses the session from the keyring unless `force` is set, otherwise
    /// prompts for missing values and stores the token the server returns.
    pub async fn authenticate(
        url: Option<String>,
        username: Option<String>,
        password: Option<String>,
        force: bool,
        config: &ClientConfig,
    ) -> Result<ServerSession> {
        if !force {
            if let Ok(session) = Self::load() {
                info!("Found existing session in keyring");
                return Ok(session);
            }
        } else {
            debug!("Force flag set, ignoring stored session");
        }

        let url = match url {
            Some(url) => url,
            None => Input::new()
                .with_prompt("Karaoke server URL")
                .interact_text()
                .context("Failed to read URL")?,
        };

        let username = match username {
            Some(username) => username,
            None => Input::new()
                .with_prompt("Username")
                .interact_text()
                .context("Failed to read username")?,
        };

        let password = match password {
            Some(password) => password,
            None => Password::new()
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?,
        };

        let url = url.trim_end_matches('/').to_string();
        let client = KaraokeClient::new(&url, None, config.request_timeout())?;
        let login = client
            .login(&username, &password)
            .await
            .context("Failed to log in")?;

        let session = ServerSession {
            url,
            username: login.username.unwrap_or(username),
            token: login.token,
        };

        Self::store(&session)?;
        info!("Session stored in keyring");

        Ok(session)
    }

    /// Load the session from the keyring
    pub fn load() -> Result<ServerSession> {
        let url = Self::get_entry("url")?
            .get_password()
            .context("No server URL in keyring")?;

        let username = Self::get_entry("username")?
            .get_password()
            .context("No username in keyring")?;

        let token = Self::get_entry("token")?
            .get_password()
            .context("No session token in keyring")?;

        Ok(ServerSession {
            url,
            username,
            token,
        })
    }

    /// Load the session, pointing at `karaq auth` when there is none
    pub fn require() -> Result<ServerSession> {
        Self::load()
            .map_err(|_| anyhow::anyhow!("No session found. Run 'karaq auth' first to log in."))
    }

    /// Store the session in the keyring
    pub fn store(session: &ServerSession) -> Result<()> {
        Self::get_entry("url")?
            .set_password(&session.url)
            .context("Failed to store URL in keyring")?;

        Self::get_entry("username")?
            .set_password(&session.username)
            .context("Failed to store username in keyring")?;

        Self::get_entry("token")?
            .set_password(&session.token)
            .context("Failed to store token in keyring")?;

        debug!("Session stored in keyring");
        Ok(())
    }

    fn get_entry(key: &str) -> Result<Entry> {
        let entry_key = format!("server:{}", key);
        Entry::new(KEYRING_SERVICE, &entry_key).context("Failed to access keyring")
    }
}

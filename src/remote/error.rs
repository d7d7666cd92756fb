//! Remote failure taxonomy

use serde::Deserialize;
use thiserror::Error;

/// Error body returned by the karaoke server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Every way a remote call can fail. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server rejected the payload, message is shown verbatim
    #[error("{message}")]
    Validation { code: String, message: String },

    /// Session expired or insufficient rights
    #[error("not authorized ({0})")]
    Authorization(String),

    /// Entity referenced by the request no longer exists
    #[error("not found ({0})")]
    NotFound(String),

    /// Network failure, timeout, server crash or undecodable response
    #[error("network error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Classify a non-success HTTP status and its (optional) error body
    pub fn from_status(status: u16, body: Option<ErrorBody>) -> Self {
        let body = body.unwrap_or_default();
        let code = if body.code.is_empty() {
            format!("HTTP_{}", status)
        } else {
            body.code
        };

        match status {
            400 | 409 | 422 => RemoteError::Validation {
                message: body.message.unwrap_or_else(|| code.clone()),
                code,
            },
            401 | 403 => RemoteError::Authorization(code),
            404 | 410 => RemoteError::NotFound(code),
            _ => RemoteError::Transport(match body.message {
                Some(message) => format!("{} ({})", message, code),
                None => code,
            }),
        }
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, RemoteError::Authorization(_))
    }

    /// Application-level error for `action`, pointing at `karaq auth` when
    /// the server rejected the stored session
    pub fn into_report(self, action: &str) -> anyhow::Error {
        if self.is_authorization() {
            anyhow::anyhow!(
                "{}: the server rejected the stored session. Run 'karaq auth --force' to log in again.",
                action
            )
        } else {
            anyhow::Error::new(self).context(action.to_string())
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let body = || {
            Some(ErrorBody {
                code: "PL_ADD_SONG_ERROR".into(),
                message: Some("Song already in playlist".into()),
            })
        };

        assert_eq!(
            RemoteError::from_status(400, body()),
            RemoteError::Validation {
                code: "PL_ADD_SONG_ERROR".into(),
                message: "Song already in playlist".into(),
            }
        );
        assert!(RemoteError::from_status(401, None).is_authorization());
        assert!(matches!(RemoteError::from_status(404, body()), RemoteError::NotFound(_)));
        assert!(matches!(RemoteError::from_status(502, None), RemoteError::Transport(_)));
    }

    #[test]
    fn test_report_hints_at_login_for_rejected_session() {
        let report = RemoteError::from_status(401, None).into_report("Failed to list playlists");
        assert!(report.to_string().contains("karaq auth --force"));

        let report = RemoteError::Transport("timed out".into()).into_report("Failed to list playlists");
        assert_eq!(report.to_string(), "Failed to list playlists");
        assert_eq!(report.root_cause().to_string(), "network error: timed out");
    }

    #[test]
    fn test_validation_without_message_uses_code() {
        let err = RemoteError::from_status(422, None);
        assert_eq!(err.to_string(), "HTTP_422");
    }
}

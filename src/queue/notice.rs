//! Transient user-visible notifications

use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::remote::RemoteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the status line
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: Instant,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            at: Instant::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            at: Instant::now(),
        }
    }

    /// Turn a remote failure into one notification
    pub fn from_remote(action: &str, error: &RemoteError) -> Self {
        let message = match error {
            RemoteError::Validation { message, .. } => format!("{}: {}", action, message),
            RemoteError::Authorization(_) => {
                format!("{}: session expired, run `karaq auth --force`", action)
            }
            RemoteError::NotFound(_) => format!("{}: no longer exists on the server", action),
            RemoteError::Transport(detail) => format!("{}: {}", action, detail),
        };
        Self::error(message)
    }
}

/// Sending half of the notice channel
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Error => warn!("{}", notice.message),
        }
        let _ = self.tx.send(notice);
    }

    pub fn remote_failure(&self, action: &str, error: &RemoteError) {
        self.notify(Notice::from_remote(action, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let notice = Notice::from_remote(
            "Add to playlist",
            &RemoteError::Validation {
                code: "PL_ADD_SONG_ERROR".into(),
                message: "Song is blacklisted".into(),
            },
        );
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Add to playlist: Song is blacklisted");
    }

    #[test]
    fn test_notifier_delivers() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.notify(Notice::info("hello"));
        assert_eq!(rx.try_recv().unwrap().message, "hello");
    }
}

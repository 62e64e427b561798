//! Unified error handling for kvsync.

use crate::config::ConfigError;

/// HTTP status the remote uses for a missing map or entry.
const STATUS_NOT_FOUND: u16 = 404;
/// HTTP status the remote uses when a map already exists.
const STATUS_CONFLICT: u16 = 409;

/// Errors raised while talking to the remote store or driving a reconcile.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote answered with a non-success status.
    #[error("remote returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode remote response: {0}")]
    Decode(String),

    #[error("invalid desired state: {0}")]
    Validation(#[from] kvsync_engine::Error),

    #[error("current state is incomplete: listing stopped after {pages} pages")]
    IncompleteSnapshot { pages: usize },

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Raw HTTP status, when the remote sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(STATUS_NOT_FOUND)
    }

    pub fn is_already_exists(&self) -> bool {
        self.status() == Some(STATUS_CONFLICT)
    }

    /// Whether this error came from the remote call itself rather than
    /// from local validation or configuration.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::Remote { .. } | Error::Timeout(_) | Error::Transport(_) | Error::Decode(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

/// Result type alias for kvsync operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the unread store
//!
//! Provides error handling for:
//! - Read-model transport and status failures
//! - Response decoding
//! - Store lifecycle

use wave_model::WaveId;

/// Unread store and read-model errors
#[derive(Debug, thiserror::Error)]
pub enum UnreadError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not decode
    #[error("invalid response: {0}")]
    Decode(String),

    /// Base URL cannot carry API paths
    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    /// Store was shut down
    #[error("unread store for wave {0} is shut down")]
    ShutDown(WaveId),
}

impl UnreadError {
    /// Check if retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if the server rejected the request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}

impl From<reqwest::Error> for UnreadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

//! Error types for navigation
//!
//! Provides error handling for:
//! - Navigator state machine transitions
//! - Read-model failures surfaced while choosing the next topic

use crate::state::NavState;
use wave_unread::UnreadError;

/// Navigation errors
#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    /// Transition not allowed by the state machine
    #[error("illegal navigator transition: {from:?} -> {to:?}")]
    IllegalTransition { from: NavState, to: NavState },

    /// Read model failed
    #[error("unread error: {0}")]
    Unread(#[from] UnreadError),
}

impl NavigatorError {
    /// Check if invoking the navigator again may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IllegalTransition { .. } => false,
            Self::Unread(e) => e.is_retryable(),
        }
    }
}

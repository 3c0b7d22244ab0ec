//! Navigator state machine
//!
//! Two states. `Idle -> Navigating` when a navigation starts and
//! `Navigating -> Idle` when it ends, whatever the outcome. Everything else
//! is rejected.

use crate::error::NavigatorError;

/// Navigator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NavState {
    /// Ready for the next invocation
    #[default]
    Idle,
    /// A navigation is in progress
    Navigating,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: NavState) -> &'static [NavState] {
    match from {
        NavState::Idle => &[NavState::Navigating],
        NavState::Navigating => &[NavState::Idle],
    }
}

/// Validate a state transition
///
/// # Errors
/// `NavigatorError::IllegalTransition` if `to` is not reachable from `from`.
pub fn validate_transition(from: NavState, to: NavState) -> Result<(), NavigatorError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(NavigatorError::IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_alternation_is_allowed() {
        assert!(validate_transition(NavState::Idle, NavState::Navigating).is_ok());
        assert!(validate_transition(NavState::Navigating, NavState::Idle).is_ok());
        assert!(validate_transition(NavState::Idle, NavState::Idle).is_err());
        assert!(validate_transition(NavState::Navigating, NavState::Navigating).is_err());
    }
}

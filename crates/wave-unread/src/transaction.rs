//! Optimistic transactions
//!
//! A transaction snapshots the state, applies a tentative change and is then
//! either committed or reverted. Reverting restores every field from the
//! snapshot except the version, which keeps advancing so observers can tell
//! the rollback apart from the state before the change.

use crate::state::Versioned;

/// Outcome of [`Transaction::revert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revert {
    /// The snapshot was restored
    Restored,
    /// Another transition landed after this one; nothing was restored
    Superseded,
}

/// Pending optimistic change
#[derive(Debug)]
#[must_use = "an optimistic transaction must be committed or reverted"]
pub struct Transaction<T> {
    snapshot: T,
    applied: Option<u64>,
}

impl<T: Clone + Versioned> Transaction<T> {
    /// Capture the current state
    pub fn snapshot(current: &T) -> Self {
        Self {
            snapshot: current.clone(),
            applied: None,
        }
    }

    /// Apply the tentative change and bump the version
    pub fn apply<F>(&mut self, state: &mut T, change: F)
    where
        F: FnOnce(&mut T),
    {
        change(state);
        state.bump();
        self.applied = Some(state.version());
    }

    /// State captured before the change
    #[inline]
    #[must_use]
    pub fn original(&self) -> &T {
        &self.snapshot
    }

    /// Version the tentative change produced, if applied
    #[inline]
    #[must_use]
    pub fn applied_version(&self) -> Option<u64> {
        self.applied
    }

    /// Keep the tentative change
    pub fn commit(self) {}

    /// Roll back to the snapshot
    ///
    /// Only restores when `state` is still the one this transaction produced;
    /// a later transition may carry server data the snapshot predates.
    pub fn revert(self, state: &mut T) -> Revert {
        if self.applied.is_some_and(|v| v != state.version()) {
            return Revert::Superseded;
        }
        let version = state.version();
        *state = self.snapshot;
        state.set_version(version + 1);
        Revert::Restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UnreadState;
    use wave_model::{BlipId, UnreadSnapshot};

    fn state() -> UnreadState {
        let mut state = UnreadState::new("w1");
        state.snapshot = UnreadSnapshot::new(["b1", "b2"], 3, 1);
        state
    }

    #[test]
    fn revert_restores_everything_but_version() {
        let mut current = state();
        let before = current.clone();
        let mut tx = Transaction::snapshot(&current);
        tx.apply(&mut current, |s| {
            s.snapshot.remove(&"b1".into());
            s.snapshot.read_count += 1;
        });
        assert_eq!(current.version, 1);
        assert_eq!(tx.revert(&mut current), Revert::Restored);
        assert!(current.same_content(&before));
        assert_eq!(current.version, 2);
    }

    #[test]
    fn revert_after_another_transition_is_superseded() {
        let mut current = state();
        let mut tx = Transaction::snapshot(&current);
        tx.apply(&mut current, |s| {
            s.snapshot.remove(&"b1".into());
        });
        current.snapshot = UnreadSnapshot::new(["b9"], 5, 4);
        current.bump();

        assert_eq!(tx.revert(&mut current), Revert::Superseded);
        assert_eq!(current.unread_ids(), vec![BlipId::from("b9")]);
    }

    #[test]
    fn commit_keeps_change() {
        let mut current = state();
        let mut tx = Transaction::snapshot(&current);
        tx.apply(&mut current, |s| {
            s.snapshot.remove(&"b2".into());
        });
        assert_eq!(tx.applied_version(), Some(1));
        assert_eq!(tx.original().unread_count(), 2);
        tx.commit();
        assert_eq!(current.unread_count(), 1);
    }
}

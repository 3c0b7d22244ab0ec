//! Bus errors

/// Signal bus errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Subscriber fell behind and missed signals
    #[error("subscriber lagged, {0} signals dropped")]
    Lagged(u64),

    /// Every sender is gone
    #[error("signal bus closed")]
    Closed,
}

impl BusError {
    /// Check if the subscription can keep receiving
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lagged(_))
    }
}

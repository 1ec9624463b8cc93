use std::time::Duration;

/// The rate or capacity handed to a [`RateLimit`](crate::RateLimit) or a
/// controller mutator is unusable.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum InvalidConfiguration {
    /// The rate must be a finite number greater than zero.
    #[error("rate must be a finite positive number of tokens per second, got {0}")]
    InvalidRate(f64),
    /// The capacity must be a finite, non-negative number.
    #[error("capacity must be a finite non-negative number of tokens, got {0}")]
    InvalidCapacity(f64),
}

/// Errors surfaced by reservations and waits.
///
/// None of these are retried by the controller; they always reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request is negative or larger than the total capacity, so it can
    /// never be granted.
    #[error("capacity is {capacity} tokens, requesting {requested} tokens is invalid")]
    InvalidAmount { requested: f64, capacity: f64 },
    /// The start time is not a finite instant, or the wait budget is NaN.
    #[error("start time {start} and wait budget {wait_budget} must be usable instants")]
    InvalidTime { start: f64, wait_budget: f64 },
    /// The tokens will not be available within the caller's wait budget.
    #[error("tokens are not ready within the wait budget; {required_wait:?} of waiting is needed")]
    NotReady { required_wait: Duration },
    /// The cancellation signal fired before the wait completed. The claim was
    /// rolled back before this was returned.
    #[error("wait was cancelled")]
    Cancelled,
}

impl Error {
    /// The suggested duration to wait before retrying, if the error is
    /// [`Error::NotReady`].
    pub fn earliest_retry_after(&self) -> Option<Duration> {
        match self {
            Error::NotReady { required_wait } => Some(*required_wait),
            _ => None,
        }
    }
}

/// Converts fractional seconds into a [`Duration`], clamping negative values
/// to zero and saturating values that cannot be represented.
pub(crate) fn saturating_duration(secs: f64) -> Duration {
    if secs <= 0.0 || secs.is_nan() {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

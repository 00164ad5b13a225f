use std::time::Duration;

/// Error type for this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SluiceError {
    /// Configuration rejected: capacity below 1 or not finite.
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(f64),

    /// Configuration rejected: period not positive or not finite.
    #[error("seconds must be positive and non-zero, got {0}")]
    InvalidPeriod(f64),

    /// Requested amount exceeds the bucket's capacity. Raised before
    /// any state mutation or suspension; waiting could never help.
    #[error("cannot acquire more than the bucket's capacity: {capacity}")]
    AmountExceedsCapacity {
        /// The amount that was requested.
        amount: f64,
        /// The bucket's configured capacity.
        capacity: f64,
    },

    /// Requested amount is negative. Raised before any state mutation
    /// or suspension.
    #[error("cannot acquire less than 0 amount with amount: {amount}")]
    NegativeAmount {
        /// The amount that was requested.
        amount: f64,
    },

    /// The deadline elapsed before admission. Recoverable: the caller
    /// may retry, drop the work, or queue it elsewhere. No partial
    /// state change occurred for the timed-out acquisition.
    #[error("acquire timed out after {timeout:?} for amount={amount}")]
    AcquireTimeout {
        /// The amount that was requested.
        amount: f64,
        /// The timeout that was requested.
        timeout: Duration,
    },

    /// The bucket was shut down; waiters were released and subsequent
    /// acquires fail fast instead of hanging.
    #[error("bucket has been shut down")]
    ShutDown,
}

use std::time::Duration;

/// What the dispatcher does with a file whose upload failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop dispatching and report the failure to the caller
    Stop,
    /// Log the failure and move on to the next file
    #[default]
    Skip,
    /// Retry the same file with exponential backoff, then skip it
    Retry {
        /// Total attempts, including the first one
        max_attempts: u32,
        /// Delay before the first retry
        initial_backoff: Duration,
        /// Upper bound for the delay between retries
        max_backoff: Duration,
    },
}

impl FailurePolicy {
    /// Attempts made for a single file under this policy
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        match self {
            Self::Stop | Self::Skip => 1,
            Self::Retry { max_attempts, .. } => *max_attempts,
        }
    }

    /// Delay before retry number `retry` (starting at 1), doubling each time
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        match self {
            Self::Stop | Self::Skip => Duration::ZERO,
            Self::Retry {
                initial_backoff,
                max_backoff,
                ..
            } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                initial_backoff.saturating_mul(factor).min(*max_backoff)
            }
        }
    }
}

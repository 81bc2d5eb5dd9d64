//! Error types for the scheduler module

use std::fmt;

use crate::storage::StorageError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Working window bounds are unusable
    InvalidWindow {
        start_hour: u32,
        end_hour: u32,
    },

    /// Target emissions per window must be positive
    InvalidTarget {
        target: u32,
    },

    /// Jitter factor must lie in [0, 1)
    InvalidJitter {
        factor: f64,
    },

    /// Initial stats violate a counter invariant
    InvalidStatsSeed {
        field: String,
        reason: String,
    },

    /// The lead store could not be read during a tick
    FetchFailed {
        reason: String,
        recoverable: bool,
    },

    /// Emission work panicked inside a tick
    EmissionPanicked {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWindow {
                start_hour,
                end_hour,
            } => {
                write!(
                    f,
                    "Invalid working window {:02}:00-{:02}:00. Need 0 <= start < end <= 24",
                    start_hour, end_hour
                )
            }
            Self::InvalidTarget { target } => {
                write!(
                    f,
                    "Invalid target emission count {}. Must be at least 1",
                    target
                )
            }
            Self::InvalidJitter { factor } => {
                write!(f, "Invalid jitter factor {}. Must be in [0, 1)", factor)
            }
            Self::InvalidStatsSeed { field, reason } => {
                write!(f, "Invalid stats seed '{}': {}", field, reason)
            }
            Self::FetchFailed { reason, .. } => {
                write!(f, "Failed to fetch leads: {}", reason)
            }
            Self::EmissionPanicked { reason } => {
                write!(f, "Emission panicked: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<StorageError> for SchedulerError {
    fn from(err: StorageError) -> Self {
        Self::FetchFailed {
            recoverable: err.is_recoverable(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create an invalid window error
    pub fn invalid_window(start_hour: u32, end_hour: u32) -> Self {
        Self::InvalidWindow {
            start_hour,
            end_hour,
        }
    }

    /// Create an invalid stats seed error
    pub fn invalid_seed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStatsSeed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    ///
    /// Configuration errors never are; a failed tick is retried on the next one.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::FetchFailed { recoverable, .. } => *recoverable,
            Self::EmissionPanicked { .. } => true,
            _ => false,
        }
    }
}

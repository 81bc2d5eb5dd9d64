//! Unified error handling for the leadpulse crate
//!
//! Domain errors stay in their modules ([`StorageError`], [`SchedulerError`],
//! [`ServerError`]). [`Error`] wraps them where failures are reported: HTTP
//! responses, the emission loop log and the event stream encoder all classify
//! through [`LeadPulseErrorTrait`].

use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;
pub use crate::server::ServerError;
pub use crate::storage::StorageError;

/// Common interface for leadpulse error types
pub trait LeadPulseErrorTrait: std::error::Error {
    /// Whether the failed operation may succeed if retried
    fn is_recoverable(&self) -> bool;

    /// Classification used for logging and HTTP mapping
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Lead store failures, including reads inside a tick
    Storage,
    /// Emission loop failures
    Scheduler,
    Server,
    /// Malformed input or payloads
    Validation,
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Scheduler => "scheduler",
            Self::Server => "server",
            Self::Validation => "validation",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the leadpulse crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LeadPulseErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Server(_) | Self::Json(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(StorageError::Validation(_)) => ErrorCategory::Validation,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Scheduler(SchedulerError::FetchFailed { .. }) => ErrorCategory::Storage,
            Self::Scheduler(
                SchedulerError::InvalidWindow { .. }
                | SchedulerError::InvalidTarget { .. }
                | SchedulerError::InvalidJitter { .. }
                | SchedulerError::InvalidStatsSeed { .. },
            ) => ErrorCategory::Config,
            Self::Scheduler(SchedulerError::EmissionPanicked { .. }) => ErrorCategory::Scheduler,
            Self::Server(ServerError::Config(_)) => ErrorCategory::Config,
            Self::Server(_) => ErrorCategory::Server,
            Self::Json(_) => ErrorCategory::Validation,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let err: Error = StorageError::not_found("abc").into();
        assert_eq!(err.category(), ErrorCategory::Storage);

        let err: Error = StorageError::validation("name is required").into();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err: Error = SchedulerError::invalid_window(10, 8).into();
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.category().as_str(), "config");

        let err: Error = SchedulerError::EmissionPanicked {
            reason: "boom".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Scheduler);
    }

    #[test]
    fn test_fetch_failure_is_a_recoverable_storage_error() {
        let err: Error = SchedulerError::from(StorageError::Unavailable("down".into())).into();
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_is_recoverable() {
        let err: Error = StorageError::LockPoisoned.into();
        assert!(!err.is_recoverable());

        let err: Error = ServerError::Bind("0.0.0.0:3000: in use".into()).into();
        assert_eq!(err.category(), ErrorCategory::Server);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_json_error_is_validation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}

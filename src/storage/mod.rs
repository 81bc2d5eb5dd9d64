//! Lead persistence
//!
//! The emission core only ever reads through [`LeadRepository::fetch_all`];
//! the remaining operations back the CRUD endpoints and the import/sync
//! commands.
//!
//! # Backends
//!
//! - [`SqliteLeadRepository`] - file-backed store used by the service
//! - [`InMemoryLeadRepository`] - volatile store for tests, with failure injection
//!
//! [`import`] turns CSV exports into leads and copies whole stores.

pub mod import;
pub mod repository;

use thiserror::Error;

pub use import::{parse_leads_csv, sync_stores, ImportReport};
pub use repository::{
    create_memory_repository, create_sqlite_repository, InMemoryLeadRepository, LeadRepository,
    SharedLeadRepository, SqliteLeadRepository,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by lead stores
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure while preparing the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No lead with the given id
    #[error("lead not found: {id}")]
    NotFound { id: String },

    /// Rejected input
    #[error("invalid lead: {0}")]
    Validation(String),

    /// A stored row could not be decoded
    #[error("corrupt lead record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Store temporarily unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Io(_) | Self::Unavailable(_)
        )
    }
}

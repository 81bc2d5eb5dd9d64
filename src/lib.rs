//! leadpulse - live lead feed for a real-estate sales dashboard
//!
//! Replays stored leads to connected dashboards on a randomized cadence
//! that follows a daily working window, stamping each one with a rotating
//! acquisition channel and keeping a set of dashboard counters moving.
//!
//! # Architecture
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Lead records, enums and listing queries
//! - [`storage`] - Lead stores (SQLite, in-memory), CSV import and sync
//! - [`scheduler`] - Working-hours pacing, source rotation, stats and the emission loop
//! - [`broadcast`] - Fan-out of lead events to observers
//! - [`server`] - HTTP API, SSE stream and server lifecycle
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use leadpulse::config::Config;
//! use leadpulse::server::DashboardServer;
//! use leadpulse::storage::create_sqlite_repository;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let repository = create_sqlite_repository(&config.database.sqlite_path)?;
//!     let server = DashboardServer::new(&config, repository)?;
//!     server
//!         .start_with_shutdown(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::broadcast::{BroadcastHub, EventPublisher, LeadEvent};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, LeadPulseErrorTrait, Result};
    pub use crate::models::{Lead, LeadQuery, LeadSource, LeadStatus, Priority, PropertyType};
    pub use crate::scheduler::{
        EmissionScheduler, SchedulerContext, StatsSnapshot, TickOutcome, WorkingHoursPolicy,
    };
    pub use crate::server::DashboardServer;
    pub use crate::storage::{LeadRepository, SharedLeadRepository, StorageError};
}

// Direct re-exports for convenience
pub use models::{Lead, LeadSource};

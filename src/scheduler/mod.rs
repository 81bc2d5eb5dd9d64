//! Lead emission scheduling
//!
//! A single perpetual loop paces lead emissions across a daily working
//! window. Operators toggle emission on and off through [`SchedulerContext`];
//! the loop itself never stops until shutdown.
//!
//! # Overview
//!
//! ```text
//!  control endpoints ──toggle──▶ SchedulerContext ◀── tick ── EmissionScheduler
//!                                 │ rotation                    │      │
//!                                 │ stats                fetch_all   publish
//!                                 ▼                             ▼      ▼
//!                           StatsSnapshot               LeadRepository  EventPublisher
//! ```
//!
//! # Modules
//!
//! - [`window`] - working-hours delay policy with jitter
//! - [`rotation`] - round-robin source stamping
//! - [`stats`] - dashboard counters with bounded drift
//! - [`context`] - enabled flag plus serialized emission state
//! - [`emitter`] - the tick and the loop around it
//! - [`error`] - scheduler error types

pub mod context;
pub mod emitter;
pub mod error;
pub mod rotation;
pub mod stats;
pub mod window;

pub use context::{Emission, SchedulerContext};
pub use emitter::{EmissionScheduler, TickOutcome};
pub use error::{SchedulerError, SchedulerResult};
pub use rotation::{SourceRotation, ROTATION_ORDER};
pub use stats::{StatsAggregator, StatsSeed, StatsSnapshot};
pub use window::WorkingHoursPolicy;

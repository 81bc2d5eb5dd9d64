//! Dashboard HTTP server
//!
//! Serves lead CRUD, the emission toggle and the live event stream, and
//! runs the emission loop alongside the listener.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Dashboard Server              │
//! │                                          │
//! │  ┌────────────────────────────────────┐  │
//! │  │            REST API                │  │
//! │  │  GET/POST    /api/leads            │  │
//! │  │  GET/PUT/DEL /api/leads/{id}       │  │
//! │  │  POST        /api/start-fetching   │  │
//! │  │  POST        /api/stop-fetching    │  │
//! │  │  GET         /api/fetching-status  │  │
//! │  │  GET         /api/stats            │  │
//! │  │  GET         /api/health           │  │
//! │  └────────────────────────────────────┘  │
//! │  ┌────────────────────────────────────┐  │
//! │  │   SSE  /api/events                 │  │
//! │  │   newLead · updateStats · lagged   │  │
//! │  └────────────────────────────────────┘  │
//! │  ┌────────────────────────────────────┐  │
//! │  │   Emission loop (background task)  │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use leadpulse::config::Config;
//! use leadpulse::server::DashboardServer;
//! use leadpulse::storage::create_sqlite_repository;
//!
//! let config = Config::load(None)?;
//! let repository = create_sqlite_repository(&config.database.sqlite_path)?;
//! let server = DashboardServer::new(&config, repository)?;
//! server.start_with_shutdown(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

pub mod api;
pub mod config;
#[allow(clippy::module_inception)]
pub mod server;

pub use api::create_router;
pub use config::{ConfigError, ServerConfig};
pub use server::{AppState, DashboardServer, ServerError, ServerInfo};

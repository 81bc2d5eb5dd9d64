//! Dashboard server implementation
//!
//! Owns the shared state, builds the router and runs the emission loop next
//! to the HTTP listener until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::broadcast::BroadcastHub;
use crate::config::Config;
use crate::scheduler::{EmissionScheduler, SchedulerContext, WorkingHoursPolicy};
use crate::storage::SharedLeadRepository;

use super::api::create_router;
use super::config::ServerConfig;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: SharedLeadRepository,

    /// Enabled flag, rotation and stats
    pub context: Arc<SchedulerContext>,

    /// Observer fan-out
    pub hub: Arc<BroadcastHub>,

    /// Server start time
    pub start_time: Instant,

    pub config: ServerConfig,
}

impl AppState {
    /// State for a router without a running emission loop
    pub fn new(
        repository: SharedLeadRepository,
        context: Arc<SchedulerContext>,
        hub: Arc<BroadcastHub>,
        config: ServerConfig,
    ) -> Self {
        Self {
            repository,
            context,
            hub,
            start_time: Instant::now(),
            config,
        }
    }
}

// ============================================================================
// Dashboard Server
// ============================================================================

/// HTTP front end plus the emission loop it controls
pub struct DashboardServer {
    config: ServerConfig,
    policy: WorkingHoursPolicy,
    rng_seed: Option<u64>,
    state: AppState,
}

impl DashboardServer {
    /// Create a server from validated configuration
    pub fn new(config: &Config, repository: SharedLeadRepository) -> Result<Self, ServerError> {
        config
            .server
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let policy = config
            .emission
            .policy()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let context = Arc::new(
            SchedulerContext::new(
                config.stats.clone(),
                config.emission.rng_seed,
                config.emission.start_enabled,
            )
            .map_err(|e| ServerError::Init(e.to_string()))?,
        );

        let hub = Arc::new(BroadcastHub::new(config.emission.event_channel_capacity));

        let state = AppState::new(repository, context, hub, config.server.clone());

        Ok(Self {
            config: config.server.clone(),
            policy,
            rng_seed: config.emission.rng_seed,
            state,
        })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(cors_layer(&self.config.allowed_origins));
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Emission loop wired to this server's state
    pub fn scheduler(&self) -> EmissionScheduler {
        EmissionScheduler::new(
            self.state.context.clone(),
            self.state.repository.clone(),
            self.state.hub.clone(),
            self.policy,
        )
        .with_rng_seed(self.rng_seed)
    }

    /// Serve until `shutdown_signal` resolves, then stop the emission loop
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))?;

        tracing::info!("Starting dashboard server on {}", addr);

        let (stop_tx, stop_rx) = watch::channel(false);
        let emitter = Arc::new(self.scheduler()).spawn(stop_rx);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal.await;
                tracing::info!("Shutdown signal received");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        let _ = stop_tx.send(true);
        if let Err(e) = emitter.await {
            tracing::error!(error = %e, "emission loop task failed");
        }

        served?;
        tracing::info!("Dashboard server shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
            window: (self.policy.start_hour(), self.policy.end_hour()),
            start_enabled: self.state.context.is_enabled(),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
    pub window: (u32, u32),
    pub start_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "LeadPulse Dashboard\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Working Window: {:02}:00-{:02}:00\n\
             Emission: {}\n\
             CORS: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.window.0,
            self.window.1,
            if self.start_enabled { "enabled" } else { "disabled" },
            if self.cors_enabled { "enabled" } else { "disabled" },
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    Config(String),

    /// Initialization error
    Init(String),

    /// Failed to bind to address
    Bind(String),

    /// Server error
    Serve(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Init(msg) => write!(f, "Initialization error: {}", msg),
            Self::Bind(msg) => write!(f, "Failed to bind: {}", msg),
            Self::Serve(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================

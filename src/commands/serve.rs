use anyhow::{Context, Result};
use std::path::PathBuf;

use leadpulse::config::Config;
use leadpulse::server::config::parse_bind_address;
use leadpulse::server::DashboardServer;
use leadpulse::storage::create_sqlite_repository;

/// Overrides taken from the `serve` command line
#[derive(Debug, Default)]
pub struct ServeParams {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub db: Option<PathBuf>,
    pub start_enabled: bool,
}

/// Start the dashboard server and the emission loop
pub async fn serve(params: ServeParams) -> Result<()> {
    let mut config = Config::load(params.config.as_deref())?;

    if let Some(bind) = params.bind {
        config.server.bind_address = parse_bind_address(&bind)?;
    }
    if let Some(db) = params.db {
        config.database.sqlite_path = db;
    }
    if params.start_enabled {
        config.emission.start_enabled = true;
    }
    config.validate()?;

    if let Err(e) = leadpulse::metrics::init_metrics() {
        tracing::warn!("Metrics initialization failed: {}", e);
    }

    let repository = create_sqlite_repository(&config.database.sqlite_path).with_context(|| {
        format!(
            "Failed to open lead store at {}",
            config.database.sqlite_path.display()
        )
    })?;

    let available = repository
        .count()
        .await
        .context("Failed to count leads at startup")?;
    tracing::info!(
        leads = available,
        "system ready with {} potential leads",
        available
    );
    if available == 0 {
        tracing::warn!("lead store is empty, ticks will skip emission until leads are imported");
    }

    let server = DashboardServer::new(&config, repository).context("Failed to create server")?;

    println!("{}", server.info().display());
    println!();
    println!("API Endpoints:");
    println!("  GET    /api/leads              - List leads (page, limit, search, priority, source)");
    println!("  POST   /api/leads              - Create a lead");
    println!("  GET    /api/leads/{{id}}         - Get a lead");
    println!("  PUT    /api/leads/{{id}}         - Update a lead");
    println!("  DELETE /api/leads/{{id}}         - Delete a lead");
    println!("  GET    /api/test-db            - Database self-test");
    println!("  POST   /api/start-fetching     - Enable emission");
    println!("  POST   /api/stop-fetching      - Disable emission");
    println!("  GET    /api/fetching-status    - Emission state");
    println!("  GET    /api/events             - Live lead stream (SSE)");
    println!("  GET    /api/stats              - Dashboard counters");
    println!("  GET    /api/health             - Health check");
    println!("  GET    /metrics                - Prometheus metrics endpoint");
    println!();
    println!(
        "Dashboard server listening on http://{}",
        config.server.bind_address
    );
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to wait for Ctrl+C: {}", e);
            }
        })
        .await?;

    println!("Dashboard server stopped.");
    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadpulse::config::{Config, LoggingConfig};

mod commands;

const DEFAULT_DB_PATH: &str = "data/leads.db";

#[derive(Parser)]
#[command(
    name = "leadpulse",
    version,
    about = "Live lead feed for a real-estate sales dashboard",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides [logging] format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard server and the emission loop
    Serve {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address (host:port or port)
        #[arg(short, long)]
        bind: Option<String>,

        /// SQLite lead store path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Emit from boot without waiting for start-fetching
        #[arg(long, default_value = "false")]
        start_enabled: bool,
    },

    /// Replace the stored leads with a CSV export (name, mobile, address, city)
    Import {
        /// CSV file with a header row
        csv: PathBuf,

        /// SQLite lead store path
        #[arg(long, default_value = DEFAULT_DB_PATH)]
        db: PathBuf,
    },

    /// Copy every lead from one store into another
    Sync {
        /// Store to read from
        source: PathBuf,

        /// Store whose leads are replaced
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = logging_config(&cli);
    let format = cli.log_format.as_deref().unwrap_or(&logging.format);
    setup_tracing(format, &logging.level, cli.verbose)?;

    match cli.command {
        Commands::Serve {
            config,
            bind,
            db,
            start_enabled,
        } => {
            tracing::info!(
                config = ?config,
                bind = ?bind,
                db = ?db,
                start_enabled = %start_enabled,
                "Starting serve command"
            );
            commands::serve(commands::ServeParams {
                config,
                bind,
                db,
                start_enabled,
            })
            .await?;
        }

        Commands::Import { csv, db } => {
            tracing::info!(
                csv = %csv.display(),
                db = %db.display(),
                "Starting import command"
            );
            commands::import(&csv, db).await?;
        }

        Commands::Sync { source, target } => {
            tracing::info!(
                source = %source.display(),
                target = %target.display(),
                "Starting sync command"
            );
            commands::sync(&source, &target).await?;
        }
    }

    Ok(())
}

/// Logging section of the config `serve` will load; defaults when it cannot be read
/// (the command itself reports the load error once tracing is up)
fn logging_config(cli: &Cli) -> LoggingConfig {
    let path = match &cli.command {
        Commands::Serve { config, .. } => config.as_deref(),
        _ => None,
    };
    Config::load(path)
        .map(|config| config.logging)
        .unwrap_or_default()
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("leadpulse=debug,tower_http=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new(format!("leadpulse={level},warn"))
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        "text" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        other => anyhow::bail!("Unknown log format '{other}', expected text or json"),
    }

    Ok(())
}

//! Configuration management for leadpulse
//!
//! Configuration comes from a TOML file, from `LEADPULSE_*` environment
//! variables, or from defaults, and is checked by [`Config::validate`]
//! before the service starts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::broadcast::DEFAULT_CHANNEL_CAPACITY;
use crate::scheduler::{SchedulerResult, StatsSeed, WorkingHoursPolicy};
use crate::server::config::parse_bind_address;
use crate::server::ServerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Emission loop pacing and initial state
    pub emission: EmissionConfig,

    /// Initial dashboard counter values
    pub stats: StatsSeed,

    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/leads.db"),
        }
    }
}

/// Emission loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    /// First hour of the working window (inclusive)
    pub work_start_hour: u32,

    /// End of the working window (exclusive, 24 = midnight)
    pub work_end_hour: u32,

    /// Average emissions spread across one window
    pub target_emissions_per_window: u32,

    /// Relative spread of the in-window delay
    pub jitter_factor: f64,

    /// Emit from boot without waiting for `start-fetching`
    pub start_enabled: bool,

    /// Fixed RNG seed for reproducible runs
    pub rng_seed: Option<u64>,

    /// Per-observer event buffer
    pub event_channel_capacity: usize,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            work_start_hour: 6,
            work_end_hour: 24,
            target_emissions_per_window: 100,
            jitter_factor: 0.2,
            start_enabled: false,
            rng_seed: None,
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl EmissionConfig {
    /// Build the validated interval policy
    pub fn policy(&self) -> SchedulerResult<WorkingHoursPolicy> {
        WorkingHoursPolicy::new(
            self.work_start_hour,
            self.work_end_hour,
            self.target_emissions_per_window,
            self.jitter_factor,
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}")),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `LEADPULSE_*` variables (and `PORT`)
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(bind) = std::env::var("LEADPULSE_BIND") {
            self.server.bind_address = parse_bind_address(&bind)?;
        } else if let Some(port) = env_parse::<u16>("PORT")? {
            self.server.bind_address.set_port(port);
        }

        if let Ok(path) = std::env::var("LEADPULSE_SQLITE_PATH") {
            self.database.sqlite_path = PathBuf::from(path);
        }

        if let Some(hour) = env_parse("LEADPULSE_WORK_START_HOUR")? {
            self.emission.work_start_hour = hour;
        }
        if let Some(hour) = env_parse("LEADPULSE_WORK_END_HOUR")? {
            self.emission.work_end_hour = hour;
        }
        if let Some(target) = env_parse("LEADPULSE_TARGET_EMISSIONS")? {
            self.emission.target_emissions_per_window = target;
        }
        if let Some(jitter) = env_parse("LEADPULSE_JITTER_FACTOR")? {
            self.emission.jitter_factor = jitter;
        }
        if let Some(enabled) = env_parse("LEADPULSE_START_ENABLED")? {
            self.emission.start_enabled = enabled;
        }
        if let Some(seed) = env_parse("LEADPULSE_RNG_SEED")? {
            self.emission.rng_seed = Some(seed);
        }

        if let Ok(level) = std::env::var("LEADPULSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LEADPULSE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// File if given, otherwise defaults; environment overrides either
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("Invalid [server] section")?;

        self.emission.policy().context("Invalid [emission] section")?;

        if self.emission.event_channel_capacity == 0 {
            anyhow::bail!("event_channel_capacity must be greater than 0");
        }

        self.stats.validate().context("Invalid [stats] section")?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        if self.database.sqlite_path.as_os_str().is_empty() {
            anyhow::bail!("database.sqlite_path must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.database.sqlite_path, PathBuf::from("data/leads.db"));
        assert!(!config.emission.start_enabled);
        assert_eq!(config.stats.total_data_points, 152_000);
    }

    #[test]
    fn test_invalid_window() {
        let mut config = Config::default();
        config.emission.work_start_hour = 20;
        config.emission.work_end_hour = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stats_seed() {
        let mut config = Config::default();
        config.stats.active_crawlers = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [emission]
            work_start_hour = 9
            work_end_hour = 18
            start_enabled = true

            [stats]
            active_crawlers = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.emission.work_start_hour, 9);
        assert_eq!(config.emission.target_emissions_per_window, 100);
        assert!(config.emission.start_enabled);
        assert_eq!(config.stats.active_crawlers, 10);
        assert_eq!(config.stats.high_priority_crawlers, 4);
        assert!(config.validate().is_ok());

        let policy = config.emission.policy().unwrap();
        assert_eq!(policy.window_ms(), 9 * 3_600_000);
    }
}

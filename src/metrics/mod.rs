//! Prometheus metrics for the emission loop and the observer channel
//!
//! Call `init_metrics()` at startup. If registration fails, every recording
//! function below becomes a no-op.

use prometheus::{
    register_counter_vec, register_gauge, register_int_counter, CounterVec, Encoder, Gauge,
    IntCounter, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

struct EmissionMetrics {
    ticks: CounterVec,
    emissions: CounterVec,
    events_published: IntCounter,
    observers: Gauge,
    fetching: Gauge,
}

static EMISSION_METRICS: OnceLock<EmissionMetrics> = OnceLock::new();

static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

/// Tick outcome labels
pub const OUTCOME_IDLE: &str = "idle";
pub const OUTCOME_EMPTY: &str = "empty";
pub const OUTCOME_EMITTED: &str = "emitted";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_PANICKED: &str = "panicked";

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default registry
///
/// Safe to call more than once; later calls return `Ok(())`.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = EmissionMetrics {
        ticks: register_counter_vec!(
            "leadpulse_ticks_total",
            "Emission loop ticks by outcome",
            &["outcome"]
        )?,
        emissions: register_counter_vec!(
            "leadpulse_emissions_total",
            "Leads emitted by rotated source",
            &["source"]
        )?,
        events_published: register_int_counter!(
            "leadpulse_events_published_total",
            "Events handed to the broadcast channel"
        )?,
        observers: register_gauge!(
            "leadpulse_observers",
            "Currently connected event observers"
        )?,
        fetching: register_gauge!(
            "leadpulse_fetching",
            "1 when emission is enabled, 0 otherwise"
        )?,
    };

    EMISSION_METRICS
        .set(metrics)
        .map_err(|_| "Emission metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

pub fn metrics_initialized() -> bool {
    EMISSION_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Count one loop tick under the given outcome label
pub fn record_tick(outcome: &str) {
    if let Some(m) = EMISSION_METRICS.get() {
        m.ticks.with_label_values(&[outcome]).inc();
    }
}

/// Count one emitted lead and the two events it produced
pub fn record_emission(source: &str) {
    let Some(m) = EMISSION_METRICS.get() else {
        return;
    };

    m.emissions.with_label_values(&[source]).inc();
    m.events_published.inc_by(2);
}

pub fn set_observers(count: usize) {
    if let Some(m) = EMISSION_METRICS.get() {
        m.observers.set(count as f64);
    }
}

pub fn set_fetching(enabled: bool) {
    if let Some(m) = EMISSION_METRICS.get() {
        m.fetching.set(if enabled { 1.0 } else { 0.0 });
    }
}

// ============================================================================
// Tests
// ============================================================================

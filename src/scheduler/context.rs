//! Shared state of the emission loop
//!
//! The enabled flag is an atomic so the control endpoints never wait on the
//! loop. Rotation, stats and the lead picker sit behind one mutex so a pick,
//! its source and its stats update are always taken together.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::error::SchedulerResult;
use super::rotation::SourceRotation;
use super::stats::{StatsAggregator, StatsSeed, StatsSnapshot};
use crate::models::{Lead, LeadSource};

/// Seed offset so the picker and the stats drift use distinct streams
const PICK_STREAM_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

struct EmissionState {
    rotation: SourceRotation,
    stats: StatsAggregator,
    picker: ChaCha8Rng,
}

/// Result of one emission step, ready to publish
#[derive(Debug, Clone)]
pub struct Emission {
    /// Picked lead carrying the rotated source
    pub lead: Lead,
    pub source: LeadSource,
    pub stats: StatsSnapshot,
}

/// Enabled flag plus the serialized emission state
pub struct SchedulerContext {
    enabled: AtomicBool,
    emission: Mutex<EmissionState>,
    ticks: AtomicU64,
    emissions: AtomicU64,
}

impl SchedulerContext {
    /// Context starting in the given enabled state
    ///
    /// With `rng_seed` set, picks and stats drift are reproducible.
    pub fn new(seed: StatsSeed, rng_seed: Option<u64>, start_enabled: bool) -> SchedulerResult<Self> {
        let stats = StatsAggregator::new(seed, rng_seed)?;
        let picker = match rng_seed {
            Some(value) => ChaCha8Rng::seed_from_u64(value ^ PICK_STREAM_OFFSET),
            None => ChaCha8Rng::from_entropy(),
        };

        crate::metrics::set_fetching(start_enabled);
        Ok(Self {
            enabled: AtomicBool::new(start_enabled),
            emission: Mutex::new(EmissionState {
                rotation: SourceRotation::new(),
                stats,
                picker,
            }),
            ticks: AtomicU64::new(0),
            emissions: AtomicU64::new(0),
        })
    }

    // ========================================================================
    // Toggle
    // ========================================================================

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Set the flag, returning the previous value
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        crate::metrics::set_fetching(enabled);
        previous
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Pick one lead uniformly, stamp it with the next source and count it
    ///
    /// Returns `None` for an empty slice without advancing rotation or stats.
    pub async fn prepare_emission(&self, leads: &[Lead]) -> Option<Emission> {
        if leads.is_empty() {
            return None;
        }

        let mut state = self.emission.lock().await;
        let index = state.picker.gen_range(0..leads.len());
        let source = state.rotation.next_source();
        let stats = state.stats.record_emission();
        drop(state);

        self.emissions.fetch_add(1, Ordering::Relaxed);
        Some(Emission {
            lead: leads[index].with_source(source),
            source,
            stats,
        })
    }

    /// Current dashboard counters without mutating them
    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        self.emission.lock().await.stats.snapshot()
    }

    /// Source the next emission will carry
    pub async fn next_source_preview(&self) -> LeadSource {
        self.emission.lock().await.rotation.peek()
    }

    pub(crate) fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Ticks run so far, enabled or not
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn emission_count(&self) -> u64 {
        self.emissions.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("enabled", &self.is_enabled())
            .field("ticks", &self.tick_count())
            .field("emissions", &self.emission_count())
            .finish_non_exhaustive()
    }
}

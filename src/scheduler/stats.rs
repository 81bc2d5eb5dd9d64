//! Dashboard statistics aggregator
//!
//! Counters start from configured seed values and drift pseudo-randomly on
//! every emission. The crawler counts are clamped inside every mutation:
//! `active_crawlers` in `[8, 15]` and `high_priority_crawlers` in
//! `[3, active_crawlers]`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

pub const MIN_ACTIVE_CRAWLERS: u32 = 8;
pub const MAX_ACTIVE_CRAWLERS: u32 = 15;
pub const MIN_HIGH_PRIORITY_CRAWLERS: u32 = 3;

/// Chance that the conversion rate drifts on an emission
pub const CONVERSION_DRIFT_PROBABILITY: f64 = 0.2;
/// Chance that the crawler counts drift on an emission
pub const CRAWLER_DRIFT_PROBABILITY: f64 = 0.1;

// ============================================================================
// Seed
// ============================================================================

/// Initial values for the dashboard counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSeed {
    pub daily_leads_count: u64,
    pub yesterday_leads_count: u64,
    pub active_crawlers: u32,
    pub high_priority_crawlers: u32,
    pub conversion_rate: f64,
    pub last_month_conversion_rate: f64,
    pub total_data_points: u64,
    pub daily_data_points: u64,
}

impl Default for StatsSeed {
    fn default() -> Self {
        Self {
            daily_leads_count: 0,
            yesterday_leads_count: 35,
            active_crawlers: 12,
            high_priority_crawlers: 4,
            conversion_rate: 8.7,
            last_month_conversion_rate: 6.6,
            total_data_points: 152_000,
            daily_data_points: 0,
        }
    }
}

impl StatsSeed {
    /// Reject seeds that already break the crawler invariants
    pub fn validate(&self) -> SchedulerResult<()> {
        if !(MIN_ACTIVE_CRAWLERS..=MAX_ACTIVE_CRAWLERS).contains(&self.active_crawlers) {
            return Err(SchedulerError::invalid_seed(
                "active_crawlers",
                format!(
                    "{} is outside [{MIN_ACTIVE_CRAWLERS}, {MAX_ACTIVE_CRAWLERS}]",
                    self.active_crawlers
                ),
            ));
        }
        if self.high_priority_crawlers < MIN_HIGH_PRIORITY_CRAWLERS
            || self.high_priority_crawlers > self.active_crawlers
        {
            return Err(SchedulerError::invalid_seed(
                "high_priority_crawlers",
                format!(
                    "{} is outside [{MIN_HIGH_PRIORITY_CRAWLERS}, {}]",
                    self.high_priority_crawlers, self.active_crawlers
                ),
            ));
        }
        if !self.conversion_rate.is_finite() || !self.last_month_conversion_rate.is_finite() {
            return Err(SchedulerError::invalid_seed(
                "conversion_rate",
                "conversion rates must be finite",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable view broadcast as `updateStats`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub daily_leads_count: u64,
    pub yesterday_leads_count: u64,
    pub active_crawlers: u32,
    pub high_priority_crawlers: u32,
    pub conversion_rate: f64,
    /// `conversion_rate - last_month_conversion_rate`, one decimal
    pub conversion_rate_change: f64,
    /// Lifetime total including today's points
    pub total_data_points: u64,
    pub daily_data_points: u64,
}

// ============================================================================
// Aggregator
// ============================================================================

/// Mutable dashboard counters plus the RNG that drives their drift
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    stats: StatsSeed,
    rng: ChaCha8Rng,
}

impl StatsAggregator {
    /// Aggregator seeded from `seed`; `rng_seed` makes the drift reproducible
    pub fn new(seed: StatsSeed, rng_seed: Option<u64>) -> SchedulerResult<Self> {
        seed.validate()?;
        let rng = match rng_seed {
            Some(value) => ChaCha8Rng::seed_from_u64(value),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self { stats: seed, rng })
    }

    /// Count one emission, drift the counters and return the new snapshot
    pub fn record_emission(&mut self) -> StatsSnapshot {
        self.stats.daily_leads_count += 1;
        self.stats.daily_data_points += self.rng.gen_range(5..=14);

        if self.rng.gen_bool(CONVERSION_DRIFT_PROBABILITY) {
            let drift: f64 = self.rng.gen_range(-0.1..0.1);
            self.stats.conversion_rate = round_one_decimal(self.stats.conversion_rate + drift);
        }

        if self.rng.gen_bool(CRAWLER_DRIFT_PROBABILITY) {
            let change: i64 = self.rng.gen_range(-1..=1);
            self.stats.active_crawlers = clamp_step(
                self.stats.active_crawlers,
                change,
                MIN_ACTIVE_CRAWLERS,
                MAX_ACTIVE_CRAWLERS,
            );

            let step = if self.rng.gen_bool(0.5) { 1 } else { -1 };
            self.stats.high_priority_crawlers = clamp_step(
                self.stats.high_priority_crawlers,
                step,
                MIN_HIGH_PRIORITY_CRAWLERS,
                self.stats.active_crawlers,
            );
        }

        self.snapshot()
    }

    /// Current values without mutating anything
    pub fn snapshot(&self) -> StatsSnapshot {
        let stats = &self.stats;
        StatsSnapshot {
            daily_leads_count: stats.daily_leads_count,
            yesterday_leads_count: stats.yesterday_leads_count,
            active_crawlers: stats.active_crawlers,
            high_priority_crawlers: stats.high_priority_crawlers,
            conversion_rate: stats.conversion_rate,
            conversion_rate_change: round_one_decimal(
                stats.conversion_rate - stats.last_month_conversion_rate,
            ),
            total_data_points: stats.total_data_points + stats.daily_data_points,
            daily_data_points: stats.daily_data_points,
        }
    }
}

fn clamp_step(value: u32, step: i64, min: u32, max: u32) -> u32 {
    (i64::from(value) + step).clamp(i64::from(min), i64::from(max)) as u32
}

/// Round half away from zero to one decimal place
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seeded(seed: u64) -> StatsAggregator {
        StatsAggregator::new(StatsSeed::default(), Some(seed)).unwrap()
    }

    #[test]
    fn test_initial_snapshot_from_seed() {
        let snapshot = seeded(1).snapshot();
        assert_eq!(snapshot.daily_leads_count, 0);
        assert_eq!(snapshot.yesterday_leads_count, 35);
        assert_eq!(snapshot.active_crawlers, 12);
        assert_eq!(snapshot.high_priority_crawlers, 4);
        assert_eq!(snapshot.conversion_rate, 8.7);
        assert_eq!(snapshot.conversion_rate_change, 2.1);
        assert_eq!(snapshot.total_data_points, 152_000);
    }

    #[test]
    fn test_record_emission_increments() {
        let mut stats = seeded(42);
        let before = stats.snapshot();
        let after = stats.record_emission();

        assert_eq!(after.daily_leads_count, before.daily_leads_count + 1);
        let added = after.daily_data_points - before.daily_data_points;
        assert!((5..=14).contains(&added), "added {added} data points");
        assert_eq!(after.total_data_points, 152_000 + after.daily_data_points);
        assert_eq!(stats.snapshot(), after);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let stats = seeded(3);
        assert_eq!(stats.snapshot(), stats.snapshot());
    }

    #[test]
    fn test_conversion_rate_stays_one_decimal() {
        let mut stats = seeded(11);
        for _ in 0..500 {
            let snapshot = stats.record_emission();
            let scaled = snapshot.conversion_rate * 10.0;
            assert!((scaled - scaled.round()).abs() < 1e-9);
            let change = snapshot.conversion_rate_change * 10.0;
            assert!((change - change.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_drift() {
        let mut a = seeded(99);
        let mut b = seeded(99);
        for _ in 0..100 {
            assert_eq!(a.record_emission(), b.record_emission());
        }
    }

    #[test]
    fn test_crawler_counts_eventually_move() {
        let mut stats = seeded(5);
        let initial = stats.snapshot();
        let moved = (0..1_000)
            .map(|_| stats.record_emission())
            .any(|s| s.active_crawlers != initial.active_crawlers);
        assert!(moved);
    }

    #[test]
    fn test_invalid_seeds_rejected() {
        let seed = StatsSeed {
            active_crawlers: 16,
            ..Default::default()
        };
        assert!(StatsAggregator::new(seed, None).is_err());

        let seed = StatsSeed {
            high_priority_crawlers: 2,
            ..Default::default()
        };
        assert!(seed.validate().is_err());

        let seed = StatsSeed {
            active_crawlers: 8,
            high_priority_crawlers: 9,
            ..Default::default()
        };
        assert!(seed.validate().is_err());
    }

    #[test]
    fn test_clamp_step() {
        assert_eq!(clamp_step(15, 1, 8, 15), 15);
        assert_eq!(clamp_step(8, -1, 8, 15), 8);
        assert_eq!(clamp_step(5, 1, 3, 5), 5);
        assert_eq!(clamp_step(3, -1, 3, 10), 3);
    }

    #[test]
    fn test_round_one_decimal() {
        assert_eq!(round_one_decimal(8.74), 8.7);
        assert_eq!(round_one_decimal(8.76), 8.8);
        assert_eq!(round_one_decimal(2.1000000000000005), 2.1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_crawler_bounds_hold_every_step(
            rng_seed in any::<u64>(),
            active in MIN_ACTIVE_CRAWLERS..=MAX_ACTIVE_CRAWLERS,
            high_offset in 0u32..=12,
        ) {
            let high = (MIN_HIGH_PRIORITY_CRAWLERS + high_offset).min(active);
            let seed = StatsSeed {
                active_crawlers: active,
                high_priority_crawlers: high,
                ..Default::default()
            };
            let mut stats = StatsAggregator::new(seed, Some(rng_seed)).unwrap();

            for _ in 0..10_000 {
                let s = stats.record_emission();
                prop_assert!((MIN_ACTIVE_CRAWLERS..=MAX_ACTIVE_CRAWLERS).contains(&s.active_crawlers));
                prop_assert!(s.high_priority_crawlers >= MIN_HIGH_PRIORITY_CRAWLERS);
                prop_assert!(s.high_priority_crawlers <= s.active_crawlers);
            }
        }
    }
}

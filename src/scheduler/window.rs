//! Working-hours interval policy
//!
//! Decides how long the emission loop sleeps before its next tick. Inside
//! the working window the delay is drawn around `window / target` with a
//! symmetric jitter, which spreads roughly `target` emissions over the
//! window without fixing the exact count. Outside the window the loop
//! sleeps until the next window start.

use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, TimeZone, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

const MS_PER_HOUR: u64 = 60 * 60 * 1000;
const FLOAT_SLACK_MS: f64 = 1e-6;

/// Daily window `[start_hour, end_hour)` with a target emission rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursPolicy {
    start_hour: u32,
    end_hour: u32,
    target_emissions: u32,
    jitter_factor: f64,
}

impl Default for WorkingHoursPolicy {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 24,
            target_emissions: 100,
            jitter_factor: 0.2,
        }
    }
}

impl WorkingHoursPolicy {
    /// Create a validated policy
    ///
    /// `end_hour` may be 24, meaning midnight at the end of the day.
    pub fn new(
        start_hour: u32,
        end_hour: u32,
        target_emissions: u32,
        jitter_factor: f64,
    ) -> SchedulerResult<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(SchedulerError::invalid_window(start_hour, end_hour));
        }
        if target_emissions == 0 {
            return Err(SchedulerError::InvalidTarget {
                target: target_emissions,
            });
        }
        if !(0.0..1.0).contains(&jitter_factor) {
            return Err(SchedulerError::InvalidJitter {
                factor: jitter_factor,
            });
        }

        Ok(Self {
            start_hour,
            end_hour,
            target_emissions,
            jitter_factor,
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    /// Whether a wall-clock hour falls inside the window
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }

    /// Length of the window in milliseconds
    pub fn window_ms(&self) -> u64 {
        u64::from(self.end_hour - self.start_hour) * MS_PER_HOUR
    }

    /// Mean gap between emissions inside the window, in milliseconds
    pub fn average_interval_ms(&self) -> f64 {
        self.window_ms() as f64 / f64::from(self.target_emissions)
    }

    /// Inclusive bounds of the jittered in-window delay, in milliseconds
    pub fn jitter_bounds_ms(&self) -> (u64, u64) {
        let average = self.average_interval_ms();
        // absorb float noise such as 648000 * 0.8 = 518400.00000000006
        let low = (average * (1.0 - self.jitter_factor) - FLOAT_SLACK_MS).ceil() as u64;
        let high = (average * (1.0 + self.jitter_factor) + FLOAT_SLACK_MS).floor() as u64;
        if low > high {
            let mid = average.round() as u64;
            (mid, mid)
        } else {
            (low, high)
        }
    }

    /// Delay before the next scheduler tick, given the current time
    pub fn next_delay<Tz: TimeZone, R: Rng>(
        &self,
        now: &DateTime<Tz>,
        rng: &mut R,
    ) -> Duration {
        if self.contains_hour(now.hour()) {
            let (low, high) = self.jitter_bounds_ms();
            Duration::from_millis(rng.gen_range(low..=high))
        } else {
            self.delay_until_window_start(now)
        }
    }

    /// Exact delay until the next `start_hour:00:00.000`
    pub fn delay_until_window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        let today = now.date_naive();
        let date = if now.hour() >= self.end_hour {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        } else {
            today
        };

        let Some(naive_start) = date.and_hms_opt(self.start_hour, 0, 0) else {
            return Duration::ZERO;
        };
        let Some(start) = resolve_local(&now.timezone(), naive_start) else {
            return Duration::ZERO;
        };

        (start - now.clone()).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Map a wall-clock instant to the zone, taking the earlier reading on
/// fold and the first valid instant after a gap
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    for shift_minutes in [0i64, 30, 60, 90, 120] {
        let candidate = naive + chrono::Duration::minutes(shift_minutes);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Some(dt),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => continue,
        }
    }
    None
}

//! Decaying-peak max-hold: each bar remembers its loudest recent value
//! and lets it fall back toward the floor over time, either at a
//! constant rate or an accelerating one.
//!
//! Ground truth: `original_source/core/DynamicMaxHolder.cpp`, line for
//! line — the branch that resets vs. keeps `updated_at` is what produces
//! constant vs. accelerating fall.

use std::time::Instant;

use crate::stats_chain::FLOOR_DBFS;

/// Milliseconds per dBFS of fall, default per spec's
/// `DynamicMaxHoldSpeedOfFalling`.
pub const DEFAULT_SPEED_MS_PER_DBFS: f32 = 900.0;

pub struct DynamicMaxHold {
    speed_ms_per_dbfs: f32,
    acceleration_enabled: bool,
    values: Vec<f32>,
    updated_at: Vec<Instant>,
}

impl DynamicMaxHold {
    pub fn new(num_bars: usize, speed_ms_per_dbfs: f32, acceleration_enabled: bool) -> Self {
        let now = Instant::now();
        DynamicMaxHold {
            speed_ms_per_dbfs,
            acceleration_enabled,
            values: vec![FLOOR_DBFS; num_bars],
            updated_at: vec![now; num_bars],
        }
    }

    /// Advances the decay model with a fresh dBFS vector, one element
    /// per bar.
    pub fn update(&mut self, input: &[f32]) {
        let now = Instant::now();
        for i in 0..self.values.len() {
            let dt_ms = now.duration_since(self.updated_at[i]).as_millis() as f32;
            let decayed = (self.values[i] - dt_ms / self.speed_ms_per_dbfs).max(FLOOR_DBFS);

            if input[i] > decayed {
                self.values[i] = input[i];
                self.updated_at[i] = now;
            } else {
                self.values[i] = decayed;
                if !self.acceleration_enabled {
                    self.updated_at[i] = now;
                }
            }
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn monotone_decay_without_input_peaks_reaches_floor() {
        let mut mh = DynamicMaxHold::new(1, 1.0, false);
        mh.update(&[0.0]);
        let mut previous = mh.values()[0];
        for _ in 0..20 {
            sleep(Duration::from_millis(5));
            mh.update(&[FLOOR_DBFS]);
            let current = mh.values()[0];
            assert!(current <= previous);
            previous = current;
        }
        assert!((previous - FLOOR_DBFS).abs() < 1e-3);
    }

    #[test]
    fn input_above_decayed_value_resets_to_input() {
        let mut mh = DynamicMaxHold::new(1, 900.0, false);
        mh.update(&[-50.0]);
        sleep(Duration::from_millis(20));
        mh.update(&[-10.0]);
        assert_eq!(mh.values()[0], -10.0);
    }

    #[test]
    fn constant_fall_rate_matches_speed_parameter() {
        // speed = 900ms/dBFS, acceleration off: after ~900ms the value
        // has fallen by ~1.0 dBFS from its initial peak.
        let mut mh = DynamicMaxHold::new(1, 900.0, false);
        mh.update(&[0.0]);
        sleep(Duration::from_millis(900));
        mh.update(&[FLOOR_DBFS]);
        assert!((mh.values()[0] - (-1.0)).abs() < 0.15);
    }

    #[test]
    fn acceleration_disabled_keeps_timestamp_fresh_each_tick() {
        // With acceleration off, dt_ms resets every tick, so decay per
        // tick stays bounded by the elapsed wall time of that one tick.
        let mut mh = DynamicMaxHold::new(1, 900.0, false);
        mh.update(&[0.0]);
        sleep(Duration::from_millis(10));
        mh.update(&[FLOOR_DBFS]);
        let after_one_tick = mh.values()[0];
        assert!(after_one_tick > -5.0);
    }
}

//! Pipeline configuration: in-code defaults matching spec.md §6, with an
//! optional YAML file overlay.
//!
//! Ground truth: teacher's `presets.rs` (`PresetManager::new`,
//! `get_default_preset`) for the serde_yaml load/merge pattern;
//! `original_source/core/Config.hpp` for the exact default values.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::window::{amplitude_correction, hann};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub sampling_rate: u32,
    pub number_of_samples: usize,
    pub desired_frame_rate: u32,
    pub number_of_signals_for_averaging: usize,
    pub number_of_signals_for_max_hold: usize,
    pub alpha_factor: f32,
    pub max_queue_size: usize,
    pub offset_factor: f32,
    pub freqs: Vec<f32>,
    pub dynamic_max_hold_speed_of_falling: f32,
    pub dynamic_max_hold_acceleration_state_of_falling: bool,
    /// Overrides the `1/mean(window)` amplitude correction when set
    /// (spec.md §6, `ScalingFactor`). Default ("from window") is `None`.
    pub scaling_factor: Option<f32>,
    /// Overrides the default Hann window when set, letting a config file
    /// supply an arbitrary per-sample window (spec.md §6, `SignalWindow`).
    /// Must match `number_of_samples` in length if present.
    pub signal_window: Option<Vec<f32>>,
}

impl PipelineConfig {
    /// The window used for the FFT, sized to `number_of_samples`: the
    /// configured override if present, otherwise a Hann window built on
    /// demand (spec.md §6, `SignalWindow` default).
    pub fn signal_window(&self) -> Vec<f32> {
        self.signal_window.clone().unwrap_or_else(|| hann(self.number_of_samples))
    }

    /// The amplitude-correction factor applied in the Statistics stage:
    /// the configured `scaling_factor` override if present, otherwise
    /// `1/mean(window)` (spec.md §6, `ScalingFactor` default "from
    /// window").
    pub fn scaling_factor(&self) -> f32 {
        self.scaling_factor.unwrap_or_else(|| amplitude_correction(&self.signal_window()))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sampling_rate: 44100,
            number_of_samples: 4096,
            desired_frame_rate: 60,
            number_of_signals_for_averaging: 1,
            number_of_signals_for_max_hold: 5,
            alpha_factor: 0.25,
            max_queue_size: 20,
            offset_factor: 0.0,
            freqs: default_freqs(),
            dynamic_max_hold_speed_of_falling: 900.0,
            dynamic_max_hold_acceleration_state_of_falling: true,
            scaling_factor: None,
            signal_window: None,
        }
    }
}

/// 20Hz to 8kHz, matching spec.md §6's default `Freqs` table.
fn default_freqs() -> Vec<f32> {
    vec![
        20.0, 40.0, 60.0, 80.0, 100.0, 150.0, 200.0, 300.0, 400.0, 500.0, 700.0, 1000.0, 1500.0,
        2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 7000.0, 8000.0,
    ]
}

/// Loads `path` as a YAML overlay on [`PipelineConfig::default`]. Missing
/// fields in the file keep their default value; an absent file is not an
/// error — callers fall back to defaults entirely, matching teacher's
/// presets.rs treatment of a missing presets.yaml.
pub fn load(path: &str) -> Result<PipelineConfig> {
    if !Path::new(path).exists() {
        info!("config: no file at {path}, using defaults");
        return Ok(PipelineConfig::default());
    }

    let yaml = fs::read_to_string(path).map_err(|e| anyhow!("failed to read {path}: {e}"))?;
    let overlay: PartialConfig =
        serde_yaml::from_str(&yaml).map_err(|e| anyhow!("failed to parse {path}: {e}"))?;

    let mut config = PipelineConfig::default();
    overlay.apply(&mut config);
    if config.freqs.is_empty() {
        warn!("config: freqs list is empty after applying {path}");
    }
    Ok(config)
}

/// Mirrors `PipelineConfig` with every field optional, so a YAML file
/// can override a subset without repeating all of them.
#[derive(Debug, Deserialize)]
struct PartialConfig {
    sampling_rate: Option<u32>,
    number_of_samples: Option<usize>,
    desired_frame_rate: Option<u32>,
    number_of_signals_for_averaging: Option<usize>,
    number_of_signals_for_max_hold: Option<usize>,
    alpha_factor: Option<f32>,
    max_queue_size: Option<usize>,
    offset_factor: Option<f32>,
    freqs: Option<Vec<f32>>,
    dynamic_max_hold_speed_of_falling: Option<f32>,
    dynamic_max_hold_acceleration_state_of_falling: Option<bool>,
    scaling_factor: Option<f32>,
    signal_window: Option<Vec<f32>>,
}

impl PartialConfig {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(v) = self.sampling_rate {
            config.sampling_rate = v;
        }
        if let Some(v) = self.number_of_samples {
            config.number_of_samples = v;
        }
        if let Some(v) = self.desired_frame_rate {
            config.desired_frame_rate = v;
        }
        if let Some(v) = self.number_of_signals_for_averaging {
            config.number_of_signals_for_averaging = v;
        }
        if let Some(v) = self.number_of_signals_for_max_hold {
            config.number_of_signals_for_max_hold = v;
        }
        if let Some(v) = self.alpha_factor {
            config.alpha_factor = v;
        }
        if let Some(v) = self.max_queue_size {
            config.max_queue_size = v;
        }
        if let Some(v) = self.offset_factor {
            config.offset_factor = v;
        }
        if let Some(v) = self.freqs {
            config.freqs = v;
        }
        if let Some(v) = self.dynamic_max_hold_speed_of_falling {
            config.dynamic_max_hold_speed_of_falling = v;
        }
        if let Some(v) = self.dynamic_max_hold_acceleration_state_of_falling {
            config.dynamic_max_hold_acceleration_state_of_falling = v;
        }
        if let Some(v) = self.scaling_factor {
            config.scaling_factor = Some(v);
        }
        if let Some(v) = self.signal_window {
            config.signal_window = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = PipelineConfig::default();
        assert_eq!(config.sampling_rate, 44100);
        assert_eq!(config.number_of_samples, 4096);
        assert_eq!(config.desired_frame_rate, 60);
        assert_eq!(config.number_of_signals_for_averaging, 1);
        assert_eq!(config.number_of_signals_for_max_hold, 5);
        assert_eq!(config.alpha_factor, 0.25);
        assert_eq!(config.max_queue_size, 20);
        assert_eq!(config.dynamic_max_hold_speed_of_falling, 900.0);
        assert!(config.dynamic_max_hold_acceleration_state_of_falling);
    }

    #[test]
    fn signal_window_length_matches_number_of_samples() {
        let config = PipelineConfig::default();
        assert_eq!(config.signal_window().len(), config.number_of_samples);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load("/nonexistent/path/to/config.yaml").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn scaling_factor_defaults_to_window_derived_value() {
        let config = PipelineConfig::default();
        assert_eq!(config.scaling_factor(), amplitude_correction(&config.signal_window()));
    }

    #[test]
    fn scaling_factor_override_wins_over_window() {
        let mut config = PipelineConfig::default();
        config.scaling_factor = Some(2.5);
        assert_eq!(config.scaling_factor(), 2.5);
    }

    #[test]
    fn signal_window_override_wins_over_hann() {
        let mut config = PipelineConfig::default();
        let custom = vec![1.0; config.number_of_samples];
        config.signal_window = Some(custom.clone());
        assert_eq!(config.signal_window(), custom);
    }
}

//! Window function construction. Default window is Hann, per spec's
//! `SignalWindow` default; teacher's `apply_blackman_harris` is the
//! structural model for building a per-sample coefficient table.

use std::f32::consts::PI;

/// Builds a Hann window of the given length.
pub fn hann(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (len as f32 - 1.0)).cos())
        .collect()
}

/// Amplitude correction factor for a window: `1 / mean(window)`.
pub fn amplitude_correction(window: &[f32]) -> f32 {
    let mean: f32 = window.iter().sum::<f32>() / window.len() as f32;
    if mean == 0.0 {
        1.0
    } else {
        1.0 / mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_starts_and_ends_near_zero() {
        let w = hann(1024);
        assert!(w[0].abs() < 1e-6);
        assert!(w[w.len() - 1].abs() < 1e-6);
    }

    #[test]
    fn hann_window_peaks_at_center() {
        let w = hann(1025);
        let center = w[512];
        assert!((center - 1.0).abs() < 1e-3);
    }

    #[test]
    fn amplitude_correction_is_reciprocal_of_mean() {
        let window = vec![0.5, 0.5, 0.5, 0.5];
        assert!((amplitude_correction(&window) - 2.0).abs() < 1e-6);
    }
}

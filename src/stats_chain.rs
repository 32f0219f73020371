//! Post-FFT statistical processing: power conversion, then the
//! max-hold → average → smooth filter chain.
//!
//! Ground truth for the exact update rule of each filter:
//! `original_source/core/DataCalculator.hpp/.cpp` — each filter holds a
//! fixed-size window of past frames and applies a pointwise transform
//! across it, it is not a running accumulator reused across calls to
//! `calculate`.

use rustfft::num_complex::Complex32;
use std::collections::VecDeque;

/// 16-bit dynamic range floor, in dBFS.
pub const FLOOR_DBFS: f32 = -96.32;

/// Converts one FFT result to a dBFS power frame.
///
/// `amplitude_correction` compensates for the window's amplitude loss
/// (`1/mean(window)`); `offset` is the user-configurable dBFS offset.
/// Magnitudes below unity (after normalizing by `fft_size/2`) are
/// clamped to 0 dBFS rather than `-inf` before the window/offset scaling
/// — this bounds every bin, by design (spec.md §9).
pub fn power_frame(fft: &[Complex32], amplitude_correction: f32, offset: f32) -> Vec<f32> {
    let half = fft.len() as f32 / 2.0;
    fft.iter()
        .map(|bin| {
            let mag = bin.norm() / half;
            let dbfs = if mag >= 1.0 { 20.0 * mag.log10() } else { 0.0 };
            amplitude_correction * (dbfs - offset)
        })
        .collect()
}

/// Pointwise maximum over the last `window` frames. Initial accumulator
/// is the 16-bit dynamic-range floor.
pub struct MaxHolder {
    window: usize,
    frame_len: usize,
    queue: VecDeque<Vec<f32>>,
}

impl MaxHolder {
    pub fn new(frame_len: usize, window: usize) -> Self {
        MaxHolder {
            window,
            frame_len,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: Vec<f32>) {
        self.queue.push_back(frame);
    }

    pub fn calculate(&mut self) -> Option<Vec<f32>> {
        if self.queue.len() < self.window {
            return None;
        }
        let mut acc = vec![FLOOR_DBFS; self.frame_len];
        for frame in self.queue.iter().take(self.window) {
            for (a, &v) in acc.iter_mut().zip(frame.iter()) {
                *a = a.max(v);
            }
        }
        self.queue.pop_front();
        Some(acc)
    }
}

/// Pointwise mean over the last `window` frames. Initial accumulator 0.
pub struct Averager {
    window: usize,
    frame_len: usize,
    queue: VecDeque<Vec<f32>>,
}

impl Averager {
    pub fn new(frame_len: usize, window: usize) -> Self {
        Averager {
            window,
            frame_len,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: Vec<f32>) {
        self.queue.push_back(frame);
    }

    pub fn calculate(&mut self) -> Option<Vec<f32>> {
        if self.queue.len() < self.window {
            return None;
        }
        let mut acc = vec![0.0f32; self.frame_len];
        for frame in self.queue.iter().take(self.window) {
            for (a, &v) in acc.iter_mut().zip(frame.iter()) {
                *a += v / self.window as f32;
            }
        }
        self.queue.pop_front();
        Some(acc)
    }
}

/// Exponential smoother: `y[t] = (1-alpha) * y[t-1] + alpha * x[t]`.
/// Needs only one input per output.
pub struct Smoother {
    alpha: f32,
    state: Option<Vec<f32>>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Smoother { alpha, state: None }
    }

    pub fn push_and_calculate(&mut self, frame: &[f32]) -> Vec<f32> {
        let output = match &self.state {
            Some(prev) => prev
                .iter()
                .zip(frame.iter())
                .map(|(&y, &x)| (1.0 - self.alpha) * y + self.alpha * x)
                .collect(),
            None => frame.iter().map(|&x| self.alpha * x).collect(),
        };
        self.state = Some(output.clone());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f32, im: f32) -> Complex32 {
        Complex32::new(re, im)
    }

    #[test]
    fn power_floor_and_sign_hold_for_arbitrary_input() {
        let fft = vec![c(0.0, 0.0), c(1000.0, 0.0), c(-5.0, 5.0), c(0.3, 0.1)];
        let power = power_frame(&fft, 1.0, 0.0);
        for &v in &power {
            assert!(v <= 0.0);
        }
    }

    #[test]
    fn pure_tone_bin_center_normalizes_to_unity() {
        // 1kHz sine at amplitude 1, fft_size=8, sr=8000: |X[1]|=|X[7]|=4.
        let mut fft = vec![Complex32::new(0.0, 0.0); 8];
        fft[1] = c(0.0, -4.0);
        fft[7] = c(0.0, 4.0);
        let power = power_frame(&fft, 1.0, 0.0);
        // mag = 4 / (8/2) = 1.0 -> 20*log10(1.0) = 0 dBFS.
        assert!((power[1] - 0.0).abs() < 1e-4);
        assert!((power[7] - 0.0).abs() < 1e-4);
        assert!((power[0] - 0.0).abs() < 1e-4);
    }

    #[test]
    fn max_hold_idempotent_once_window_fills_with_constant_input() {
        let mut mh = MaxHolder::new(2, 3);
        let frame = vec![-10.0, -20.0];
        for _ in 0..3 {
            mh.push(frame.clone());
        }
        let first = mh.calculate().unwrap();
        assert_eq!(first, frame);

        mh.push(frame.clone());
        let second = mh.calculate().unwrap();
        assert_eq!(second, frame);
    }

    #[test]
    fn averager_mean_of_constant_frames_is_itself() {
        let mut avg = Averager::new(2, 4);
        let frame = vec![-5.0, -15.0];
        for _ in 0..4 {
            avg.push(frame.clone());
        }
        let result = avg.calculate().unwrap();
        for (r, f) in result.iter().zip(frame.iter()) {
            assert!((r - f).abs() < 1e-4);
        }
    }

    #[test]
    fn smoother_converges_to_constant_input() {
        let mut smoother = Smoother::new(0.25);
        let target = vec![-12.0];
        let mut y = vec![0.0];
        for _ in 0..50 {
            y = smoother.push_and_calculate(&target);
        }
        assert!((y[0] - target[0]).abs() < 1e-3);
    }
}

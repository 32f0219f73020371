//! The Spectrum stage: buffers time-domain samples, applies the window,
//! runs a forward complex FFT per Welch segment, advances by the
//! overlap-derived step.
//!
//! Ground truth: `original_source/core/FFTCalculator.hpp/.cpp`
//! (`WelchCalculator`) for the step formula and buffer-consume order;
//! teacher's `fft_analysis.rs::compute_spectrum` for the rustfft wiring
//! idiom.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::queue::BoundedQueue;

pub struct WelchCalculator {
    fft_size: usize,
    overlap: f32,
    step: usize,
    window: Vec<f32>,
    buf: VecDeque<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl WelchCalculator {
    pub fn new(fft_size: usize, overlap: f32, window: Vec<f32>) -> Self {
        assert_eq!(window.len(), fft_size, "window length must equal fft_size");
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        WelchCalculator {
            fft_size,
            overlap,
            step: compute_step(fft_size, overlap),
            window,
            buf: VecDeque::new(),
            fft,
        }
    }

    pub fn update_buffer(&mut self, frame: &[f32]) {
        self.buf.extend(frame.iter().copied());
    }

    pub fn update_overlap(&mut self, new_overlap: f32) {
        self.overlap = new_overlap;
        self.step = compute_step(self.fft_size, new_overlap);
    }

    pub fn overlap(&self) -> f32 {
        self.overlap
    }

    /// Drains as many FFT-size segments as are currently buffered,
    /// pushing each result onto `out_queue` and advancing the buffer by
    /// `step` samples after each.
    pub fn calculate(&mut self, out_queue: &BoundedQueue<Vec<Complex32>>) {
        while self.buf.len() >= self.fft_size {
            let mut segment: Vec<Complex32> = self
                .buf
                .iter()
                .take(self.fft_size)
                .zip(self.window.iter())
                .map(|(&sample, &w)| Complex32::new(sample * w, 0.0))
                .collect();

            self.fft.process(&mut segment);
            out_queue.push(segment);

            for _ in 0..self.step {
                if self.buf.pop_front().is_none() {
                    break;
                }
            }
        }
    }
}

/// `overlap <= 0` => no overlap (step = fft_size); `overlap >= 1` => max
/// overlap (step = 1); otherwise `fft_size - round(overlap * fft_size)`.
pub fn compute_step(fft_size: usize, overlap: f32) -> usize {
    if overlap <= 0.0 {
        return fft_size;
    }
    if overlap >= 1.0 {
        return 1;
    }
    let shift = (overlap * fft_size as f32).round() as usize;
    fft_size.saturating_sub(shift).max(1)
}

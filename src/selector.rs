//! Maps user-requested frequencies to FFT bins. Built once per run from
//! `sr`/`fft_size`/the requested frequency list; immutable thereafter.
//!
//! Ground truth: `original_source/core/DataSelector.cpp` — the
//! `upper_bound`/tie-break-to-lower snapping algorithm spec.md §4.3
//! describes in prose.

use std::collections::BTreeSet;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BarInfo {
    fft_bin_index: usize,
    snapped_frequency: f32,
}

/// Immutable bar-index → `(fft_bin_index, snapped_frequency)` table.
pub struct FrequencyIndexTable {
    fft_size: usize,
    bars: Vec<BarInfo>,
}

impl FrequencyIndexTable {
    /// Builds the table for `sampling_rate`/`fft_size`, snapping each of
    /// `requested` to the nearest available FFT bin frequency
    /// `sr * i / fft_size` for `0 <= i < fft_size / 2`.
    pub fn build(sampling_rate: u32, fft_size: usize, requested: &[f32]) -> Self {
        let available: BTreeSet<OrderedFreq> = (0..fft_size / 2)
            .map(|i| OrderedFreq(sampling_rate as f32 * i as f32 / fft_size as f32))
            .collect();

        let bars = requested
            .iter()
            .map(|&freq| snap(&available, freq))
            .collect();

        FrequencyIndexTable { fft_size, bars }
    }

    /// Returns `power_frame[bin_index]` for each bar. Errors if
    /// `power_frame.len() != fft_size`.
    pub fn apply(&self, power_frame: &[f32]) -> Result<Vec<f32>, PipelineError> {
        if power_frame.len() != self.fft_size {
            return Err(PipelineError::FrameSizeMismatch {
                expected: self.fft_size,
                actual: power_frame.len(),
            });
        }
        Ok(self
            .bars
            .iter()
            .map(|bar| power_frame[bar.fft_bin_index])
            .collect())
    }

    pub fn snapped_frequencies(&self) -> Vec<f32> {
        self.bars.iter().map(|b| b.snapped_frequency).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// For each of `aux_freqs`, snaps against the already-selected bar
    /// frequencies (not the full FFT bins) and returns the bar index.
    /// Used to place reference lines over the already-rendered bars.
    pub fn indices_closest_to(&self, aux_freqs: &[f32]) -> Vec<usize> {
        let bar_freqs: BTreeSet<OrderedFreq> = self
            .bars
            .iter()
            .map(|b| OrderedFreq(b.snapped_frequency))
            .collect();

        aux_freqs
            .iter()
            .filter_map(|&freq| {
                let snapped = snap_value(&bar_freqs, freq)?;
                self.bars
                    .iter()
                    .position(|b| b.snapped_frequency == snapped)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedFreq(f32);

impl Eq for OrderedFreq {}
impl PartialOrd for OrderedFreq {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedFreq {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

fn snap(available: &BTreeSet<OrderedFreq>, requested: f32) -> BarInfo {
    let snapped = snap_value(available, requested).unwrap_or(0.0);
    let index = available
        .iter()
        .position(|f| f.0 == snapped)
        .unwrap_or(0);
    BarInfo {
        fft_bin_index: index,
        snapped_frequency: snapped,
    }
}

/// Snaps `requested` to the nearest element of `available`, tie-breaking
/// to the lower element. `None` only if `available` is empty.
fn snap_value(available: &BTreeSet<OrderedFreq>, requested: f32) -> Option<f32> {
    let min = available.iter().next()?.0;
    if requested <= min {
        return Some(min);
    }

    let mut lower = min;
    let mut upper = None;
    for &OrderedFreq(f) in available {
        if f <= requested {
            lower = f;
        } else {
            upper = Some(f);
            break;
        }
    }

    match upper {
        Some(upper) => {
            if (requested - lower) <= (upper - requested) {
                Some(lower)
            } else {
                Some(upper)
            }
        }
        None => Some(lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_requests_yield_nondecreasing_bins() {
        let table = FrequencyIndexTable::build(44100, 4096, &[20.0, 100.0, 360.0, 1000.0, 2000.0, 3000.0]);
        let bins: Vec<usize> = table.bars.iter().map(|b| b.fft_bin_index).collect();
        for pair in bins.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn snapped_frequency_within_one_bin_width_of_request() {
        let sr = 44100;
        let fft_size = 4096;
        let bin_width = sr as f32 / fft_size as f32;
        let table = FrequencyIndexTable::build(sr, fft_size, &[1234.5, 7777.7, 50.0]);
        for (requested, snapped) in [1234.5, 7777.7, 50.0]
            .iter()
            .zip(table.snapped_frequencies())
        {
            assert!((requested - snapped).abs() <= bin_width);
        }
    }

    #[test]
    fn below_minimum_snaps_to_bin_zero() {
        let table = FrequencyIndexTable::build(44100, 4096, &[-5.0, 0.0]);
        assert_eq!(table.bars[0].fft_bin_index, 0);
        assert_eq!(table.bars[1].fft_bin_index, 0);
    }

    #[test]
    fn apply_rejects_mismatched_frame_size() {
        let table = FrequencyIndexTable::build(44100, 4096, &[100.0]);
        let err = table.apply(&vec![0.0; 10]).unwrap_err();
        match err {
            PipelineError::FrameSizeMismatch { expected, actual } => {
                assert_eq!(expected, 4096);
                assert_eq!(actual, 10);
            }
            _ => panic!("wrong error kind"),
        }
    }

    #[test]
    fn apply_picks_the_selected_bin_values() {
        let table = FrequencyIndexTable::build(8000, 8, &[1000.0]);
        let mut frame = vec![0.0; 8];
        frame[1] = 42.0;
        let result = table.apply(&frame).unwrap();
        assert_eq!(result, vec![42.0]);
    }

    #[test]
    fn selector_mapping_matches_original_scenario() {
        let table = FrequencyIndexTable::build(
            44100,
            4096,
            &[20.0, 100.0, 360.0, 1000.0, 2000.0, 3000.0],
        );
        let aux = [25.0, 70.0, 150.0, 250.0, 700.0, 1400.0, 1600.0, 2200.0];
        let indices = table.indices_closest_to(&aux);
        assert_eq!(indices, vec![0, 1, 1, 2, 3, 3, 4, 4]);
    }
}

//! The Acquirer stage: polls a `SampleSource` for fixed-size mono frames
//! and pushes them onto `Q_raw`.
//!
//! Ground truth: teacher's `audio_stream.rs` (`build_input_stream`,
//! `process_input_samples`) for the PortAudio wiring idiom;
//! `original_source/core/AudioSamplesCollector.hpp` /
//! `SamplesCollector.cpp` for the mono downmix and the fixed
//! `noOfSamplesToBeCollectedFromHwEachTime` read size; spec.md §6 for
//! the exact `SampleSource` method names.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use portaudio as pa;

use crate::error::PipelineError;
use crate::observer::Observer;
use crate::queue::BoundedQueue;

/// Samples read from the hardware per callback, matching the original's
/// `noOfSamplesToBeCollectedFromHwEachTime`.
pub const READ_CHUNK_SIZE: u32 = 128;

/// Spec.md §6's "sample source interface": `initialize` opens the
/// device, `poll` returns one downmixed mono frame of `num_samples`
/// length, empty on error.
pub trait SampleSource {
    fn initialize(&mut self, num_samples: usize, sample_rate: u32) -> bool;
    fn poll(&self) -> Vec<f32>;
}

/// Downmixes an interleaved multi-channel frame to mono by averaging
/// every channel in each frame.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Downmixes an interleaved multi-channel frame to mono by averaging only
/// `selected` channel indices out of `channels` total, falling back to
/// every channel when `selected` is empty. Out-of-range indices are
/// ignored rather than panicking, since the selection comes from a
/// user-supplied CLI list.
pub fn downmix_selected_channels(interleaved: &[f32], channels: usize, selected: &[usize]) -> Vec<f32> {
    let picked: Vec<usize> = selected.iter().copied().filter(|&c| c < channels).collect();
    if picked.is_empty() {
        return downmix_to_mono(interleaved, channels);
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| picked.iter().map(|&c| frame[c]).sum::<f32>() / picked.len() as f32)
        .collect()
}

/// `SampleSource` backed by a non-blocking PortAudio stream: the audio
/// callback downmixes and pushes each `READ_CHUNK_SIZE`-sample frame
/// onto an internal queue, and `poll` blocks on that queue — the callback
/// API the teacher's `portaudio` dependency actually exposes, wearing the
/// spec's pull-based interface on top.
pub struct PortAudioSource {
    device_index: pa::DeviceIndex,
    device_channels: usize,
    /// Channel indices to average into the mono signal; empty means
    /// every channel (teacher's devices are opened with every channel
    /// regardless, since PortAudio streams channels starting at 0 — the
    /// selection is applied when downmixing the captured buffer).
    selected_channels: Vec<usize>,
    internal: Arc<BoundedQueue<Vec<f32>>>,
    // Held alongside the stream for lifetime/Drop ordering; never touched
    // again once `initialize` opens and starts the stream through it.
    context: Option<pa::PortAudio>,
    stream: Option<pa::Stream<pa::NonBlocking, pa::Input<f32>>>,
}

impl PortAudioSource {
    pub fn new(device_index: pa::DeviceIndex, device_channels: usize, selected_channels: Vec<usize>) -> Self {
        PortAudioSource {
            device_index,
            device_channels,
            selected_channels,
            internal: Arc::new(BoundedQueue::new(64)),
            context: None,
            stream: None,
        }
    }

    /// Opens a fresh `PortAudio` context (teacher's `start_sampling_thread`
    /// never shares one across threads either), opens the input stream at
    /// `sample_rate`, and starts it.
    fn open_and_start(&mut self, num_samples: usize, sample_rate: u32) -> Result<()> {
        let pa = pa::PortAudio::new()
            .map_err(|e| PipelineError::DeviceInitFailure(format!("failed to initialize PortAudio: {e}")))?;

        let device_info = pa
            .device_info(self.device_index)
            .map_err(|e| PipelineError::DeviceInitFailure(format!("failed to query input device: {e}")))?;

        debug!(
            "acquirer: opening device '{}' at {} Hz, {} channels",
            device_info.name, sample_rate, self.device_channels
        );

        let latency = device_info.default_low_input_latency;
        let input_params =
            pa::StreamParameters::<f32>::new(self.device_index, self.device_channels as i32, true, latency);

        pa.is_input_format_supported(input_params, sample_rate as f64)
            .map_err(|e| PipelineError::DeviceInitFailure(format!("unsupported input format: {e}")))?;

        let read_chunk = READ_CHUNK_SIZE.min(num_samples.max(1) as u32);
        let settings = pa::InputStreamSettings::new(input_params, sample_rate as f64, read_chunk);

        let internal_cb = Arc::clone(&self.internal);
        let channels = self.device_channels;
        let expected = read_chunk as usize * channels;
        let selected = self.selected_channels.clone();

        let mut stream = pa
            .open_non_blocking_stream(settings, move |args: pa::stream::InputCallbackArgs<f32>| {
                if args.buffer.len() < expected {
                    let err = PipelineError::TransientInputUnderflow {
                        expected,
                        actual: args.buffer.len(),
                    };
                    warn!("acquirer: {err}");
                    return pa::Continue;
                }
                internal_cb.push(downmix_selected_channels(args.buffer, channels, &selected));
                pa::Continue
            })
            .map_err(|e| PipelineError::DeviceInitFailure(format!("failed to open input stream: {e}")))?;

        stream
            .start()
            .map_err(|e| PipelineError::DeviceInitFailure(format!("failed to start input stream: {e}")))?;

        info!("acquirer: stream opened and started");
        self.stream = Some(stream);
        self.context = Some(pa);
        Ok(())
    }

    /// Stops the hardware stream and wakes any thread blocked in `poll`
    /// with an empty-frame sentinel, so the Acquirer stage's `run` loop
    /// can observe the shutdown and exit instead of blocking forever.
    pub fn stop(&mut self) -> Result<()> {
        let result = match &mut self.stream {
            Some(stream) => stream.stop().map_err(|e| anyhow!("failed to stop input stream: {e}")),
            None => Ok(()),
        };
        self.internal.push(Vec::new());
        result
    }
}

impl SampleSource for PortAudioSource {
    /// Opens the device and starts the stream; the real entry point for
    /// production use, folding the PortAudio context/open/start sequence
    /// behind spec.md §6's single-method setup call. Returns `false` (and
    /// logs) on any failure instead of propagating one, matching the
    /// interface's boolean contract.
    fn initialize(&mut self, num_samples: usize, sample_rate: u32) -> bool {
        match self.open_and_start(num_samples, sample_rate) {
            Ok(()) => true,
            Err(e) => {
                error!("acquirer: {e}");
                false
            }
        }
    }

    fn poll(&self) -> Vec<f32> {
        self.internal.get().unwrap_or_default()
    }
}

/// Runs the Acquirer stage: calls `source.poll()` in a loop, pushing
/// every non-empty result onto `raw_queue` and ticking `observer`. An
/// empty poll means the source shut down; the loop exits.
pub fn run(source: &dyn SampleSource, raw_queue: &BoundedQueue<Vec<f32>>, observer: &Observer, proceed: &AtomicBool) {
    info!("acquirer: starting");
    while proceed.load(Ordering::Relaxed) {
        let frame = source.poll();
        if frame.is_empty() {
            break;
        }
        raw_queue.push(frame);
        observer.tick();
    }
    info!("acquirer: shutting down");
}

/// Owns the Acquirer stage end to end on its own thread: builds a
/// `PortAudioSource`, drives it through `SampleSource::initialize` (the
/// only entry point that opens the device), runs the poll loop until
/// `proceed` clears or the device errors out, then tears the stream down.
pub fn spawn(
    device_index: pa::DeviceIndex,
    device_channels: usize,
    selected_channels: Vec<usize>,
    sample_rate: u32,
    num_samples: usize,
    raw_queue: Arc<BoundedQueue<Vec<f32>>>,
    observer: Arc<Observer>,
    proceed: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut source = PortAudioSource::new(device_index, device_channels, selected_channels);
        if !source.initialize(num_samples, sample_rate) {
            proceed.store(false, Ordering::Relaxed);
            raw_queue.stop();
            return;
        }

        run(&source, &raw_queue, &observer, &proceed);

        source.stop().ok();
    })
}

//! Wires the five stages together: builds the queues and shared state,
//! spawns the Acquirer/Spectrum/Statistics/Controller threads, and runs
//! the Renderer on the calling thread (egui requires the main thread on
//! most platforms).
//!
//! Ground truth: teacher's `main.rs::run` for the shared-resource setup
//! and worker-thread/GUI-loop shape; `original_source/core/CommonData.hpp`
//! for which pieces of state are actually shared across stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use eframe::NativeOptions;
use log::{error, info, warn};
use portaudio as pa;
use rustfft::num_complex::Complex32;

use crate::acquirer;
use crate::config::PipelineConfig;
use crate::controller::{self, ControllerParams};
use crate::dynamic_max_hold::DynamicMaxHold;
use crate::error::PipelineError;
use crate::observer::Observer;
use crate::queue::BoundedQueue;
use crate::renderer::{EguiRenderer, SpectrumView};
use crate::selector::FrequencyIndexTable;
use crate::spectrum::WelchCalculator;
use crate::stats_chain::{power_frame, Averager, MaxHolder, Smoother};

pub struct DeviceChoice {
    pub index: pa::DeviceIndex,
    pub channels: usize,
    /// Channel indices to downmix, out of `channels` total. Empty means
    /// every channel.
    pub selected_channels: Vec<usize>,
}

/// Runs the whole pipeline until the renderer window closes or Ctrl-C is
/// pressed. Blocks on the renderer's native event loop.
pub fn run(config: PipelineConfig, device: DeviceChoice) -> Result<()> {
    let proceed = Arc::new(AtomicBool::new(true));
    {
        let proceed = Arc::clone(&proceed);
        ctrlc::set_handler(move || {
            info!("orchestrator: Ctrl-C received, shutting down");
            proceed.store(false, Ordering::Relaxed);
        })
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {e}"))?;
    }

    let raw_queue = Arc::new(BoundedQueue::<Vec<f32>>::new(config.max_queue_size));
    let fft_queue = Arc::new(BoundedQueue::<Vec<Complex32>>::new(config.max_queue_size));
    let display_queue = Arc::new(BoundedQueue::<Vec<f32>>::new(config.max_queue_size));
    let ctrl_queue = Arc::new(BoundedQueue::<f32>::new(config.max_queue_size));

    let acquirer_observer = Arc::new(Observer::default());
    let renderer_observer = Arc::new(Observer::default());

    let selector = Arc::new(FrequencyIndexTable::build(
        config.sampling_rate,
        config.number_of_samples,
        &config.freqs,
    ));
    let view = Arc::new(SpectrumView::new(selector.len()));

    let acquirer_thread = acquirer::spawn(
        device.index,
        device.channels,
        device.selected_channels.clone(),
        config.sampling_rate,
        config.number_of_samples,
        Arc::clone(&raw_queue),
        Arc::clone(&acquirer_observer),
        Arc::clone(&proceed),
    );

    let spectrum_thread = spawn_spectrum_stage(&config, Arc::clone(&raw_queue), Arc::clone(&fft_queue), Arc::clone(&ctrl_queue), Arc::clone(&proceed));
    let stats_thread = spawn_stats_stage(&config, Arc::clone(&selector), Arc::clone(&fft_queue), Arc::clone(&display_queue), Arc::clone(&proceed));

    let controller_thread = {
        let params = ControllerParams {
            sampling_rate: config.sampling_rate,
            fft_size: config.number_of_samples,
            desired_fps: config.desired_frame_rate,
        };
        let renderer_observer = Arc::clone(&renderer_observer);
        let display_queue = Arc::clone(&display_queue);
        let ctrl_queue = Arc::clone(&ctrl_queue);
        let proceed = Arc::clone(&proceed);
        thread::spawn(move || controller::run(params, renderer_observer, display_queue, ctrl_queue, proceed))
    };

    let diagnostics_thread = spawn_diagnostics(
        Arc::clone(&acquirer_observer),
        Arc::clone(&renderer_observer),
        Arc::clone(&raw_queue),
        Arc::clone(&display_queue),
        Arc::clone(&proceed),
    );

    let native_options = NativeOptions {
        initial_window_size: Some(eframe::epaint::Vec2::new(1024.0, 420.0)),
        ..Default::default()
    };
    let frequencies = selector.snapped_frequencies();
    let renderer_display_queue = Arc::clone(&display_queue);
    let renderer_proceed = Arc::clone(&proceed);
    let renderer_observer_app = Arc::clone(&renderer_observer);
    let view_app = Arc::clone(&view);

    eframe::run_native(
        "Real-Time Spectrum Analyzer",
        native_options,
        Box::new(move |_cc| {
            Box::new(EguiRenderer::new(
                view_app,
                renderer_display_queue,
                frequencies,
                renderer_observer_app,
                renderer_proceed,
            ))
        }),
    )
    .map_err(|e| anyhow!("renderer exited with error: {e}"))?;

    proceed.store(false, Ordering::Relaxed);
    raw_queue.stop();
    fft_queue.stop();
    display_queue.stop();
    ctrl_queue.stop();

    acquirer_thread.join().ok();
    spectrum_thread.join().ok();
    stats_thread.join().ok();
    controller_thread.join().ok();
    diagnostics_thread.join().ok();

    info!("orchestrator: shutdown complete");
    Ok(())
}

fn spawn_spectrum_stage(
    config: &PipelineConfig,
    raw_queue: Arc<BoundedQueue<Vec<f32>>>,
    fft_queue: Arc<BoundedQueue<Vec<Complex32>>>,
    ctrl_queue: Arc<BoundedQueue<f32>>,
    proceed: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let fft_size = config.number_of_samples;
    let window = config.signal_window();
    thread::spawn(move || {
        let mut calc = WelchCalculator::new(fft_size, 0.0, window);
        info!("spectrum: starting");
        while proceed.load(Ordering::Relaxed) {
            if let Some(overlap) = ctrl_queue.poll() {
                calc.update_overlap(overlap);
            }
            match raw_queue.get() {
                Some(frame) => {
                    calc.update_buffer(&frame);
                    calc.calculate(&fft_queue);
                }
                None => break,
            }
        }
        info!("spectrum: shutting down");
    })
}

fn spawn_stats_stage(
    config: &PipelineConfig,
    selector: Arc<FrequencyIndexTable>,
    fft_queue: Arc<BoundedQueue<Vec<Complex32>>>,
    display_queue: Arc<BoundedQueue<Vec<f32>>>,
    proceed: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let frame_len = config.number_of_samples;
    let correction = config.scaling_factor();
    let offset = config.offset_factor;
    let max_hold_window = config.number_of_signals_for_max_hold;
    let averaging_window = config.number_of_signals_for_averaging;
    let alpha = config.alpha_factor;
    let speed = config.dynamic_max_hold_speed_of_falling;
    let accelerating = config.dynamic_max_hold_acceleration_state_of_falling;
    let num_bars = selector.len();

    thread::spawn(move || {
        let mut max_holder = MaxHolder::new(frame_len, max_hold_window);
        let mut averager = Averager::new(frame_len, averaging_window);
        let mut smoother = Smoother::new(alpha);
        let mut dynamic_max_hold = DynamicMaxHold::new(num_bars, speed, accelerating);

        info!("statistics: starting");
        loop {
            if !proceed.load(Ordering::Relaxed) {
                break;
            }
            let fft = match fft_queue.get() {
                Some(fft) => fft,
                None => break,
            };

            let power = power_frame(&fft, correction, offset);
            max_holder.push(power);
            let Some(held) = max_holder.calculate() else { continue };
            averager.push(held);
            let Some(averaged) = averager.calculate() else { continue };
            let smoothed = smoother.push_and_calculate(&averaged);

            match selector.apply(&smoothed) {
                Ok(bars) => {
                    dynamic_max_hold.update(&bars);
                    display_queue.push(bars);
                }
                Err(e @ PipelineError::FrameSizeMismatch { .. }) => {
                    error!("statistics: {e}, shutting down");
                    proceed.store(false, Ordering::Relaxed);
                    break;
                }
                Err(e) => warn!("statistics: {e}"),
            }
        }
        info!("statistics: shutting down");
    })
}

/// Lists every input-capable device, one line per device, matching
/// teacher's `main.rs::run` device enumeration output.
pub fn list_input_devices(pa_ctx: &pa::PortAudio) -> Result<Vec<DeviceChoice>> {
    let devices = pa_ctx
        .devices()
        .map_err(|e| anyhow!("failed to enumerate devices: {e}"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("failed to read device info: {e}"))?;

    let mut choices = Vec::new();
    for (index, info) in devices {
        if info.max_input_channels > 0 {
            println!("  [{}] - {} ({} channels)", choices.len(), info.name, info.max_input_channels);
            choices.push(DeviceChoice {
                index,
                channels: info.max_input_channels as usize,
                selected_channels: Vec::new(),
            });
        }
    }
    Ok(choices)
}

const DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(1);
const DIAGNOSTICS_WINDOW: Duration = Duration::from_millis(1000);

fn spawn_diagnostics(
    acquirer_observer: Arc<Observer>,
    renderer_observer: Arc<Observer>,
    raw_queue: Arc<BoundedQueue<Vec<f32>>>,
    display_queue: Arc<BoundedQueue<Vec<f32>>>,
    proceed: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while proceed.load(Ordering::Relaxed) {
            thread::sleep(DIAGNOSTICS_INTERVAL);
            let samples_per_sec = acquirer_observer.calls_in_last(DIAGNOSTICS_WINDOW);
            println!("Samples updated: {samples_per_sec} per second queue size: {}", raw_queue.len());
            let plots_per_sec = renderer_observer.calls_in_last(DIAGNOSTICS_WINDOW);
            println!("Plots updated: {plots_per_sec} per second queue size: {}", display_queue.len());
        }
    })
}

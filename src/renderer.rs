//! The Renderer stage: draws the selector's bar output and reports back
//! how often it actually draws, which feeds the flow controller.
//!
//! Ground truth: teacher's `plot.rs` (`SpectrumApp`/`MyApp`) for the
//! egui/eframe wiring — one bar per entry, dark visuals, close flag tied
//! to a shared atomic. Bars here are one per selected frequency rather
//! than one per channel's partials, per spec.md §5. `DisplaySink` is
//! spec.md §6's literal interface; `eframe::App::update` is the adapter
//! that drives it each repaint, since egui/eframe owns the event loop
//! rather than handing control to a pull-based render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eframe::egui;
use egui::plot::{Bar, BarChart, Legend, Plot};
use log::info;

use crate::observer::Observer;
use crate::queue::BoundedQueue;
use crate::stats_chain::FLOOR_DBFS;

/// Spec.md §6's "display sink interface": one-shot GPU setup, push one
/// frame at a time, and two booleans the orchestrator would otherwise
/// have to poll the windowing system for itself.
pub trait DisplaySink {
    fn initialize_gpu(&mut self);
    fn draw(&mut self, frame: Vec<f32>);
    fn should_close(&self) -> bool;
    fn should_recreate(&self) -> bool;
}

/// Shared, latest-bar-frame state the renderer reads each repaint.
pub struct SpectrumView {
    bars: Mutex<Vec<(f32, f32)>>,
}

impl SpectrumView {
    pub fn new(num_bars: usize) -> Self {
        SpectrumView {
            bars: Mutex::new(vec![(0.0, FLOOR_DBFS); num_bars]),
        }
    }

    pub fn set(&self, frequencies: &[f32], values: &[f32]) {
        let mut bars = self.bars.lock().unwrap();
        for (slot, (&freq, &val)) in bars.iter_mut().zip(frequencies.iter().zip(values.iter())) {
            *slot = (freq, val);
        }
    }

    fn snapshot(&self) -> Vec<(f32, f32)> {
        self.bars.lock().unwrap().clone()
    }
}

pub struct EguiRenderer {
    view: Arc<SpectrumView>,
    display_queue: Arc<BoundedQueue<Vec<f32>>>,
    frequencies: Vec<f32>,
    observer: Arc<Observer>,
    proceed: Arc<AtomicBool>,
    bar_color: egui::Color32,
    bar_width: f32,
    last_repaint: Instant,
}

impl EguiRenderer {
    pub fn new(
        view: Arc<SpectrumView>,
        display_queue: Arc<BoundedQueue<Vec<f32>>>,
        frequencies: Vec<f32>,
        observer: Arc<Observer>,
        proceed: Arc<AtomicBool>,
    ) -> Self {
        EguiRenderer {
            view,
            display_queue,
            frequencies,
            observer,
            proceed,
            bar_color: egui::Color32::from_rgb(0, 150, 255),
            bar_width: 5.0,
            last_repaint: Instant::now(),
        }
    }
}

impl DisplaySink for EguiRenderer {
    fn initialize_gpu(&mut self) {
        // eframe/egui allocate GPU resources themselves before the first
        // `update` call; nothing left for this stage to do.
    }

    fn draw(&mut self, frame: Vec<f32>) {
        self.view.set(&self.frequencies, &frame);
        self.observer.tick();
    }

    fn should_close(&self) -> bool {
        !self.proceed.load(Ordering::Relaxed)
    }

    fn should_recreate(&self) -> bool {
        // egui/winit handle window/surface recreation internally; this
        // stage never needs to ask the orchestrator to rebuild anything.
        false
    }
}

impl eframe::App for EguiRenderer {
    fn on_close_event(&mut self) -> bool {
        info!("renderer: window close requested");
        self.proceed.store(false, Ordering::Relaxed);
        true
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if self.should_close() {
            frame.close();
            return;
        }

        if let Some(next_frame) = self.display_queue.poll() {
            self.draw(next_frame);
        }

        let now = Instant::now();
        if now.duration_since(self.last_repaint) >= Duration::from_millis(16) {
            ctx.request_repaint();
            self.last_repaint = now;
        }
        ctx.set_visuals(egui::Visuals::dark());

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label("Spectrum");

            let bars: Vec<Bar> = self
                .view
                .snapshot()
                .into_iter()
                .map(|(freq, dbfs)| Bar::new(freq as f64, dbfs as f64).width(self.bar_width as f64))
                .collect();
            let chart = BarChart::new(bars).color(self.bar_color);

            Plot::new("spectrum_plot").legend(Legend::default()).show(ui, |plot_ui| {
                plot_ui.bar_chart(chart);
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_view_starts_at_floor() {
        let view = SpectrumView::new(3);
        let snap = view.snapshot();
        assert_eq!(snap.len(), 3);
        for (_, dbfs) in snap {
            assert_eq!(dbfs, FLOOR_DBFS);
        }
    }

    #[test]
    fn set_updates_matching_bars() {
        let view = SpectrumView::new(2);
        view.set(&[100.0, 200.0], &[-10.0, -20.0]);
        assert_eq!(view.snapshot(), vec![(100.0, -10.0), (200.0, -20.0)]);
    }
}

mod acquirer;
mod config;
mod controller;
mod dynamic_max_hold;
mod error;
mod observer;
mod orchestrator;
mod queue;
mod renderer;
mod selector;
mod spectrum;
mod stats_chain;
mod window;

use std::io::{self, Write};

use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info, warn};
use portaudio as pa;

use orchestrator::DeviceChoice;

/// Real-time audio spectrum analysis engine.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to a YAML config overlay.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Input device index, skipping the interactive prompt.
    #[arg(short, long)]
    device: Option<usize>,

    /// Comma-separated input channel indices (e.g. 0,1).
    #[arg(long)]
    channels: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("pipeline failed: {e:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;
    info!("loaded config: {config:?}");

    let pa_ctx = pa::PortAudio::new().map_err(|e| anyhow!("failed to initialize PortAudio: {e}"))?;
    let devices = orchestrator::list_input_devices(&pa_ctx)?;
    if devices.is_empty() {
        return Err(anyhow!("no input audio devices found"));
    }

    let chosen_index = match cli.device {
        Some(i) => i,
        None => prompt_device_index(devices.len())?,
    };
    if chosen_index >= devices.len() {
        return Err(anyhow!("invalid device index {chosen_index}"));
    }
    let channels = devices[chosen_index].channels;
    let selected_channels = match &cli.channels {
        Some(requested) => {
            let parsed: Vec<usize> = requested
                .split(',')
                .filter_map(|s| s.trim().parse::<usize>().ok())
                .collect();
            if parsed.iter().any(|&c| c >= channels) {
                warn!("requested channel selection out of range, using all {channels} channels");
                Vec::new()
            } else {
                parsed
            }
        }
        None => Vec::new(),
    };
    let device = DeviceChoice {
        index: devices[chosen_index].index,
        channels,
        selected_channels,
    };

    orchestrator::run(config, device)
}

fn prompt_device_index(count: usize) -> Result<usize> {
    print!("Enter the index of the desired device: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let index = input
        .trim()
        .parse::<usize>()
        .map_err(|_| anyhow!("invalid device index"))?;
    if index >= count {
        return Err(anyhow!("device index out of range"));
    }
    Ok(index)
}

//! polysynth - play the engine from a computer keyboard
//!
//! Run with: cargo run --release -- --polyphony 8 --preset pad.json

mod audio;
mod keyboard;
mod ui;

use std::{fs::File, path::PathBuf, sync::Mutex};

use clap::Parser;
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use polysynth::{EngineConfig, EngineHandle, ParameterSet, ParameterSnapshot};
use tracing::Level;

use ui::UiApp;

/// Command queue depth between the UI and the audio thread.
const COMMAND_QUEUE: usize = 256;
/// Samples buffered for the oscilloscope.
const SCOPE_QUEUE: usize = 16_384;

#[derive(Debug, Parser)]
#[command(name = "polysynth", version, about = "Polyphonic terminal synthesizer")]
struct Args {
    /// Maximum simultaneously sounding notes
    #[arg(short, long, default_value_t = 8)]
    polyphony: usize,

    /// Upper bound on live audio nodes
    #[arg(long, default_value_t = 512)]
    max_nodes: usize,

    /// JSON parameter snapshot to load at startup
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Note held by the space bar
    #[arg(long, default_value_t = 69)]
    toggle_note: i32,

    /// Write debug logs here instead of warnings to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> EyreResult<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(Level::DEBUG)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(Level::WARN)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_preset(path: &PathBuf) -> EyreResult<ParameterSnapshot> {
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read preset {}", path.display()))?;
    ParameterSnapshot::from_json(&json)
        .wrap_err_with(|| format!("preset {} is not a flat JSON object", path.display()))
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let preset = args.preset.as_ref().map(load_preset).transpose()?;

    let (handle, commands) = EngineHandle::channel(COMMAND_QUEUE);
    let (scope_tx, scope_rx) = rtrb::RingBuffer::new(SCOPE_QUEUE);
    let (status_tx, status_rx) = rtrb::RingBuffer::new(64);

    let config = EngineConfig {
        polyphony: args.polyphony,
        max_nodes: args.max_nodes,
        toggle_note: args.toggle_note,
        ..EngineConfig::default()
    };

    let output = audio::start(config, preset.as_ref(), commands, scope_tx, status_tx)?;

    // mirror of the engine's parameters so the UI can cycle through values
    let mut params = ParameterSet::default();
    if let Some(snapshot) = &preset {
        for change in snapshot.to_changes()? {
            params.apply(change)?;
        }
    }

    let mut terminal = ratatui::init();
    let result = UiApp::new(handle, scope_rx, status_rx, params, output.sample_rate)
        .run(&mut terminal);
    ratatui::restore();

    drop(output);
    result
}

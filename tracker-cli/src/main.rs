//! # Tracker CLI
//!
//! A minimal console consumer for the pitch tracking engine, standing in
//! for a full tuning display. It opens the default input device, runs
//! the engine on the audio thread, and prints one line per emitted
//! estimate.
//!
//! Usage: `tracker-cli [config.json]` — the optional JSON file may set
//! any subset of the engine configuration fields; the rest keep their
//! defaults.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use tracker_core::{Engine, EngineConfig, PitchEstimate, audio};

/// Estimates queue up to this depth before the audio thread starts
/// dropping them. At 240-sample hops a handful is plenty.
const ESTIMATE_QUEUE_CAPACITY: usize = 8;

fn main() -> Result<()> {
    let config = load_config()?;
    eprintln!(
        "[MAIN] {} Hz, window {} samples, hop {} samples, range {}-{} Hz",
        config.sample_rate,
        config.window_size,
        config.hop_size,
        config.min_frequency,
        config.max_frequency
    );

    let engine = Engine::new(config)?;
    let (sender, receiver) = bounded::<PitchEstimate>(ESTIMATE_QUEUE_CAPACITY);

    // The stream must stay alive for capture to continue.
    let _stream = audio::start_pitch_stream(engine, sender)?;

    eprintln!("[MAIN] Listening. Press Ctrl-C to stop.");
    for estimate in receiver.iter() {
        print_estimate(&estimate);
    }

    Ok(())
}

fn print_estimate(estimate: &PitchEstimate) {
    if estimate.is_voiced() {
        println!(
            "{:9.3}s  {:8.2} Hz  confidence {:4.2}  level {:6.1} dBFS",
            estimate.timestamp, estimate.frequency_hz, estimate.confidence, estimate.level_dbfs
        );
    } else {
        println!(
            "{:9.3}s       ---                      level {:6.1} dBFS",
            estimate.timestamp, estimate.level_dbfs
        );
    }
}

/// Loads the engine configuration from the optional path in argv[1],
/// falling back to defaults when no path is given.
fn load_config() -> Result<EngineConfig> {
    match env::args().nth(1) {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            let config = serde_json::from_str(&text)
                .with_context(|| format!("parsing config file {path}"))?;
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

// tracker-core/src/lib.rs

//! The core logic for the real-time pitch tracker.
//! This crate is responsible for sample buffering, high-pass filtering,
//! silence gating and autocorrelation-based pitch estimation. It is
//! completely headless and contains no UI code.

pub mod audio;
pub mod config;
pub mod engine;
pub mod estimator;
pub mod filter;
pub mod ring;

pub use config::{EngineConfig, PeakSelection};
pub use engine::Engine;

use serde::{Deserialize, Serialize};

/// A single pitch reading, produced once per hop and handed straight to
/// the consumer. The core never retains emitted estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// The estimated fundamental frequency in Hz. Zero when unvoiced.
    pub frequency_hz: f32,
    /// How periodic the analyzed window is (0.0 to 1.0). Zero means
    /// "no reliable pitch", regardless of `frequency_hz`.
    pub confidence: f32,
    /// Loudness of the analyzed window in dB relative to full scale.
    /// Reported even when the window is gated as silence.
    pub level_dbfs: f32,
    /// Stream time of the estimate in seconds, derived from the running
    /// count of ingested samples. Monotonic and deterministic.
    pub timestamp: f64,
}

impl PitchEstimate {
    /// Whether this estimate carries a usable pitch reading.
    pub fn is_voiced(&self) -> bool {
        self.confidence > 0.0
    }
}

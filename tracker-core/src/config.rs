//! # Engine Configuration Module
//!
//! Construction-time parameters for the pitch tracking engine. A config
//! is immutable once an engine has been built from it; every invariant
//! is checked up front so the audio thread never has to.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Cutoff of the one-pole high-pass filter applied to every incoming
/// sample, chosen to remove DC offset and low rumble without touching
/// the fundamental of any note in the searched range.
pub const DC_CUTOFF_HZ: f32 = 60.0;

/// How the peak of the normalized autocorrelation is chosen.
///
/// `GlobalMax` matches the long-observed behavior of this tracker.
/// `FirstDominant` is the canonical McLeod/Wyvill rule and is less prone
/// to octave errors on sources with strong even harmonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakSelection {
    /// Pick the lag with the largest NSDF value over the whole range.
    #[default]
    GlobalMax,
    /// Pick the first key maximum (between a positive- and a
    /// negative-going zero crossing) that reaches 90% of the largest one.
    FirstDominant,
}

/// Parameters of the streaming estimation pipeline.
///
/// All fields have sensible defaults, so a partial JSON config file
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: f32,
    /// Number of samples analyzed per pitch estimate.
    pub window_size: usize,
    /// Number of ingested samples between analyses. Must not exceed
    /// `window_size`.
    pub hop_size: usize,
    /// Lowest frequency searched for, in Hz. Bounds the largest lag.
    pub min_frequency: f32,
    /// Highest frequency searched for, in Hz. Bounds the smallest lag.
    pub max_frequency: f32,
    /// Linear RMS amplitude below which a window is treated as silence.
    pub silence_rms_threshold: f32,
    /// Centre-clipping threshold as a fraction of the window's peak
    /// absolute value.
    pub clip_threshold_ratio: f32,
    /// NSDF peak selection strategy.
    pub peak_selection: PeakSelection,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 48_000.0,
            window_size: 4096,
            hop_size: 240,
            min_frequency: 50.0,
            max_frequency: 1000.0,
            silence_rms_threshold: 0.005,
            clip_threshold_ratio: 0.2,
            peak_selection: PeakSelection::default(),
        }
    }
}

impl EngineConfig {
    /// The smallest lag searched, in samples: `floor(sample_rate / max_frequency)`.
    pub fn tau_min(&self) -> usize {
        (self.sample_rate / self.max_frequency).floor() as usize
    }

    /// The largest lag searched, in samples: `floor(sample_rate / min_frequency)`.
    pub fn tau_max(&self) -> usize {
        (self.sample_rate / self.min_frequency).floor() as usize
    }

    /// Checks every construction-time invariant.
    ///
    /// This is the only place the pipeline can fail: once a config
    /// passes validation, everything downstream handles degenerate
    /// input as policy rather than as an error.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            bail!("sample_rate must be a positive number, got {}", self.sample_rate);
        }
        if self.window_size == 0 {
            bail!("window_size must be greater than 0");
        }
        if self.hop_size == 0 {
            bail!("hop_size must be greater than 0");
        }
        if self.hop_size > self.window_size {
            bail!(
                "hop_size ({}) must not exceed window_size ({})",
                self.hop_size,
                self.window_size
            );
        }
        if !self.min_frequency.is_finite() || self.min_frequency <= 0.0 {
            bail!("min_frequency must be a positive number, got {}", self.min_frequency);
        }
        if !self.max_frequency.is_finite() || self.max_frequency <= 0.0 {
            bail!("max_frequency must be a positive number, got {}", self.max_frequency);
        }
        if self.min_frequency >= self.max_frequency {
            bail!(
                "frequency range is inverted or degenerate: min {} Hz, max {} Hz",
                self.min_frequency,
                self.max_frequency
            );
        }
        if !(0.0..1.0).contains(&self.clip_threshold_ratio) {
            bail!(
                "clip_threshold_ratio must be in [0, 1), got {}",
                self.clip_threshold_ratio
            );
        }
        if !self.silence_rms_threshold.is_finite() || self.silence_rms_threshold < 0.0 {
            bail!(
                "silence_rms_threshold must be non-negative, got {}",
                self.silence_rms_threshold
            );
        }
        if self.tau_min() < 1 {
            bail!(
                "max_frequency ({} Hz) is too high for sample rate {} Hz",
                self.max_frequency,
                self.sample_rate
            );
        }
        if self.tau_max() > self.window_size {
            bail!(
                "min_frequency ({} Hz) needs a lag of {} samples, which exceeds the {}-sample window",
                self.min_frequency,
                self.tau_max(),
                self.window_size
            );
        }
        if self.tau_min() >= self.tau_max() {
            bail!(
                "lag range is degenerate: tau_min {} >= tau_max {}",
                self.tau_min(),
                self.tau_max()
            );
        }
        Ok(())
    }
}

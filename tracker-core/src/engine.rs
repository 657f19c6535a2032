//! # Streaming Engine Module
//!
//! Ties the pipeline together: every incoming sample is high-pass
//! filtered and written to the ring buffer, and once per hop the latest
//! window is analyzed and an estimate is handed to the caller.
//!
//! The engine is built for use inside a real-time audio callback: all
//! state is allocated once in [`Engine::new`], the per-sample path never
//! allocates, blocks or logs, and there is a single writer (the callback
//! thread itself), so no locks or atomics are needed.

use anyhow::Result;

use crate::PitchEstimate;
use crate::config::{DC_CUTOFF_HZ, EngineConfig};
use crate::estimator::PitchEstimator;
use crate::filter::HighPassFilter;
use crate::ring::SampleRingBuffer;

/// Floor applied before converting a linear amplitude to dBFS, keeping
/// the reading finite for all-zero windows.
const LEVEL_FLOOR: f32 = 1e-9;

/// Root-mean-square amplitude of a window.
pub fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f32 = window.iter().map(|&s| s * s).sum();
    (sum / window.len() as f32).sqrt()
}

/// Converts a linear amplitude to dB relative to full scale.
pub fn to_dbfs(amplitude: f32) -> f32 {
    20.0 * amplitude.max(LEVEL_FLOOR).log10()
}

/// The streaming pitch tracking engine.
///
/// Feed it blocks of samples with [`Engine::process`]; it invokes the
/// supplied handler once per `hop_size` ingested samples with a fresh
/// [`PitchEstimate`]. Block boundaries are irrelevant to the schedule:
/// a handler call may happen mid-block, and feeding `K` samples always
/// produces exactly `K / hop_size` estimates (integer division).
pub struct Engine {
    config: EngineConfig,
    ring: SampleRingBuffer,
    filter: HighPassFilter,
    estimator: PitchEstimator,
    /// Scratch for the latest window, materialized once per hop.
    window: Box<[f32]>,
    /// Samples ingested since the last analysis pass.
    hop_counter: usize,
    /// Samples ingested over the engine's lifetime; the timestamp source.
    samples_ingested: u64,
}

impl Engine {
    /// Validates `config` and allocates every buffer the engine will
    /// ever need. This is the only fallible operation in the pipeline.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Engine {
            // Double capacity keeps the latest window clear of the
            // write frontier while it is copied out.
            ring: SampleRingBuffer::with_capacity(2 * config.window_size),
            filter: HighPassFilter::new(config.sample_rate, DC_CUTOFF_HZ),
            estimator: PitchEstimator::new(&config),
            window: vec![0.0; config.window_size].into_boxed_slice(),
            hop_counter: 0,
            samples_ingested: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingests one block of raw samples (nominally in [-1, 1]) and
    /// invokes `on_estimate` for every completed hop. An empty block is
    /// a benign no-op.
    ///
    /// Estimates are handed out by reference and not retained; wire the
    /// handler to whatever delivery mechanism the host uses, e.g. a
    /// channel `try_send` that drops the record when the consumer lags.
    pub fn process<F>(&mut self, block: &[f32], mut on_estimate: F)
    where
        F: FnMut(&PitchEstimate),
    {
        for &raw in block {
            let filtered = self.filter.process(raw);
            self.ring.push(filtered);
            self.samples_ingested += 1;
            self.hop_counter += 1;
            if self.hop_counter == self.config.hop_size {
                self.hop_counter = 0;
                let estimate = self.analyze();
                on_estimate(&estimate);
            }
        }
    }

    /// Returns the engine to its freshly constructed state.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.filter.reset();
        self.hop_counter = 0;
        self.samples_ingested = 0;
    }

    /// One analysis pass over the latest window: loudness first, then
    /// pitch only when the window is loud enough to trust.
    fn analyze(&mut self) -> PitchEstimate {
        self.ring.copy_latest(&mut self.window);
        let level = rms(&self.window);
        let timestamp = self.samples_ingested as f64 / self.config.sample_rate as f64;

        if level < self.config.silence_rms_threshold {
            // Gated: loudness is still reported, pitch is not computed.
            return PitchEstimate {
                frequency_hz: 0.0,
                confidence: 0.0,
                level_dbfs: to_dbfs(level),
                timestamp,
            };
        }

        let raw = self.estimator.estimate(&self.window, self.config.sample_rate);
        PitchEstimate {
            frequency_hz: raw.frequency_hz,
            confidence: raw.clarity,
            level_dbfs: to_dbfs(level),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: f32, frequency: f32, amplitude: f32, count: usize) -> Vec<f32> {
        (0..count)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin()
            })
            .collect()
    }

    fn collect(engine: &mut Engine, input: &[f32]) -> Vec<PitchEstimate> {
        let mut estimates = Vec::new();
        engine.process(input, |estimate| estimates.push(*estimate));
        estimates
    }

    #[test]
    fn silence_reports_zero_pitch_and_floor_level() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let estimates = collect(&mut engine, &vec![0.0; 8192]);
        assert!(!estimates.is_empty());
        for estimate in &estimates {
            assert_eq!(estimate.frequency_hz, 0.0);
            assert_eq!(estimate.confidence, 0.0);
            assert!(!estimate.is_voiced());
            assert!(estimate.level_dbfs <= -179.0, "level {}", estimate.level_dbfs);
        }
    }

    #[test]
    fn tracks_a_440_hz_tone_within_five_hz() {
        let config = EngineConfig::default();
        let fill_hops = config.window_size / config.hop_size + 2;
        let mut engine = Engine::new(config.clone()).unwrap();
        let input = sine(config.sample_rate, 440.0, 0.5, 48_000);

        let estimates = collect(&mut engine, &input);
        assert_eq!(estimates.len(), 200);
        // Ignore estimates emitted before the ring buffer has filled.
        for estimate in &estimates[fill_hops..] {
            assert!(
                (estimate.frequency_hz - 440.0).abs() <= 5.0,
                "detected {} Hz at t = {}",
                estimate.frequency_hz,
                estimate.timestamp
            );
            assert!(estimate.confidence > 0.8, "confidence {}", estimate.confidence);
        }
    }

    #[test]
    fn emits_exactly_one_estimate_per_hop() {
        let config = EngineConfig::default();
        let hop = config.hop_size;
        let mut engine = Engine::new(config.clone()).unwrap();
        let input = sine(config.sample_rate, 300.0, 0.3, 3 * hop + hop / 2);

        // Deliver in chunks deliberately misaligned with the hop.
        let mut count = 0;
        for chunk in input.chunks(128) {
            engine.process(chunk, |_| count += 1);
        }
        assert_eq!(count, input.len() / hop);
    }

    #[test]
    fn timestamps_advance_by_one_hop() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config.clone()).unwrap();
        let estimates = collect(&mut engine, &vec![0.0; 2 * config.hop_size]);
        assert_eq!(estimates.len(), 2);
        let hop_seconds = config.hop_size as f64 / config.sample_rate as f64;
        assert!((estimates[0].timestamp - hop_seconds).abs() < 1e-9);
        assert!((estimates[1].timestamp - 2.0 * hop_seconds).abs() < 1e-9);
    }

    #[test]
    fn amplitude_scaling_does_not_change_the_pitch() {
        let config = EngineConfig::default();
        let quiet = sine(config.sample_rate, 440.0, 0.05, 24_000);
        let loud: Vec<f32> = quiet.iter().map(|s| s * 10.0).collect();

        let mut engine_a = Engine::new(config.clone()).unwrap();
        let mut engine_b = Engine::new(config.clone()).unwrap();
        let a = collect(&mut engine_a, &quiet);
        let b = collect(&mut engine_b, &loud);

        assert_eq!(a.len(), b.len());
        let fill_hops = config.window_size / config.hop_size + 2;
        for (qa, qb) in a[fill_hops..].iter().zip(&b[fill_hops..]) {
            assert!((qa.frequency_hz - qb.frequency_hz).abs() < 1.0);
            assert!((qa.confidence - qb.confidence).abs() < 0.01);
        }
    }

    #[test]
    fn identical_engines_produce_identical_estimates() {
        let config = EngineConfig::default();
        // A deterministic tone-plus-noise mixture.
        let mut state: u32 = 0x2545_f491;
        let input: Vec<f32> = sine(config.sample_rate, 217.0, 0.4, 24_000)
            .into_iter()
            .map(|s| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                s + 0.01 * ((state >> 16) as f32 / 32_768.0 - 1.0)
            })
            .collect();

        let mut engine_a = Engine::new(config.clone()).unwrap();
        let mut engine_b = Engine::new(config).unwrap();
        let a = collect(&mut engine_a, &input);
        let b = collect(&mut engine_b, &input);
        assert_eq!(a, b);
    }

    #[test]
    fn constant_input_decays_to_silence() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config).unwrap();
        let estimates = collect(&mut engine, &vec![0.5; 48_000]);

        // After many filter time constants the DC step is gone.
        let last = estimates.last().unwrap();
        assert_eq!(last.frequency_hz, 0.0);
        assert_eq!(last.confidence, 0.0);
        assert!(last.level_dbfs < -60.0, "level {}", last.level_dbfs);
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let mut called = false;
        engine.process(&[], |_| called = true);
        assert!(!called);
    }

    #[test]
    fn reset_restarts_the_stream_clock() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config.clone()).unwrap();
        collect(&mut engine, &vec![0.0; 3 * config.hop_size]);
        engine.reset();
        let estimates = collect(&mut engine, &vec![0.0; config.hop_size]);
        let hop_seconds = config.hop_size as f64 / config.sample_rate as f64;
        assert!((estimates[0].timestamp - hop_seconds).abs() < 1e-9);
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = EngineConfig {
            hop_size: 10_000,
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn to_dbfs_is_floored() {
        assert!((to_dbfs(0.0) - -180.0).abs() < 1e-3);
        assert!((to_dbfs(1.0) - 0.0).abs() < 1e-3);
    }
}

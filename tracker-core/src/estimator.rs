//! # Pitch Estimation Module
//!
//! A variant of the MPM (McLeod Pitch Method) algorithm working on a
//! single window of filtered samples:
//!
//! 1. Centre-clipping to suppress low-amplitude noise and secondary
//!    harmonics that would otherwise distort the autocorrelation peak.
//! 2. The normalized square-difference function (NSDF) over the lag
//!    range implied by the configured frequency bounds. The
//!    normalization makes the NSDF amplitude-scale-invariant and
//!    bounded roughly in [-1, 1].
//! 3. Peak selection, either by global maximum or by the canonical
//!    first-dominant-maximum rule.
//! 4. Parabolic interpolation around the chosen lag for sub-sample
//!    precision.
//!
//! All scratch buffers are allocated once at construction; `estimate`
//! performs no allocation and is safe to call from a real-time thread.

use crate::config::{EngineConfig, PeakSelection};

/// Upper bound on candidate maxima gathered by the first-dominant
/// strategy. A window rarely contains more than a handful.
const MAX_KEY_MAXIMA: usize = 16;

/// A candidate maximum must reach this fraction of the largest key
/// maximum to be selected by the first-dominant strategy.
const FIRST_DOMINANT_CUTOFF: f32 = 0.9;

/// The raw outcome of one analysis pass, before loudness and timing are
/// attached by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEstimate {
    /// Estimated fundamental frequency in Hz, zero if none was found.
    pub frequency_hz: f32,
    /// NSDF value at the selected peak, clamped to [0, 1]. Zero means
    /// the window had no discernable periodicity.
    pub clarity: f32,
}

impl RawEstimate {
    const UNVOICED: RawEstimate = RawEstimate {
        frequency_hz: 0.0,
        clarity: 0.0,
    };
}

/// Reusable state for NSDF-based pitch detection on fixed-size windows.
pub struct PitchEstimator {
    tau_min: usize,
    tau_max: usize,
    clip_threshold_ratio: f32,
    peak_selection: PeakSelection,
    /// Centre-clipped copy of the window under analysis.
    clipped: Box<[f32]>,
    /// NSDF values indexed by lag; only `[tau_min, tau_max]` is written.
    nsdf: Box<[f32]>,
}

impl PitchEstimator {
    /// Builds an estimator for the given (already validated) config,
    /// pre-allocating every buffer `estimate` will need.
    pub fn new(config: &EngineConfig) -> Self {
        PitchEstimator {
            tau_min: config.tau_min(),
            tau_max: config.tau_max(),
            clip_threshold_ratio: config.clip_threshold_ratio,
            peak_selection: config.peak_selection,
            clipped: vec![0.0; config.window_size].into_boxed_slice(),
            nsdf: vec![0.0; config.tau_max() + 1].into_boxed_slice(),
        }
    }

    /// Runs one full analysis pass over `window`, which must be exactly
    /// the configured window size.
    pub fn estimate(&mut self, window: &[f32], sample_rate: f32) -> RawEstimate {
        debug_assert_eq!(window.len(), self.clipped.len());

        self.centre_clip(window);
        self.compute_nsdf();

        let peak_lag = match self.peak_selection {
            PeakSelection::GlobalMax => Some(self.global_max_lag()),
            PeakSelection::FirstDominant => self.first_dominant_lag(),
        };
        let Some(peak_lag) = peak_lag else {
            return RawEstimate::UNVOICED;
        };

        let refined_lag = self.refine_lag(peak_lag);
        let frequency_hz = if refined_lag > 0.0 {
            sample_rate / refined_lag
        } else {
            0.0
        };
        RawEstimate {
            frequency_hz,
            clarity: self.nsdf[peak_lag].clamp(0.0, 1.0),
        }
    }

    /// Zeroes every sample whose magnitude falls below a fraction of
    /// the window's peak magnitude.
    fn centre_clip(&mut self, window: &[f32]) {
        let mut peak: f32 = 0.0;
        for &sample in window {
            peak = peak.max(sample.abs());
        }
        let threshold = peak * self.clip_threshold_ratio;
        for (clipped, &sample) in self.clipped.iter_mut().zip(window) {
            *clipped = if sample.abs() >= threshold { sample } else { 0.0 };
        }
    }

    /// Fills `self.nsdf` for every searched lag:
    /// `nsdf[tau] = 2 * acf(tau) / m(tau)`, where `acf` is the
    /// autocorrelation and `m` the summed squared magnitudes of both
    /// shifted segments. A zero-energy lag yields zero rather than NaN.
    fn compute_nsdf(&mut self) {
        let n = self.clipped.len();
        self.nsdf.fill(0.0);
        for tau in self.tau_min..=self.tau_max {
            let mut acf = 0.0f32;
            let mut m = 0.0f32;
            for i in 0..(n - tau) {
                let a = self.clipped[i];
                let b = self.clipped[i + tau];
                acf += a * b;
                m += a * a + b * b;
            }
            self.nsdf[tau] = if m > 0.0 { 2.0 * acf / m } else { 0.0 };
        }
    }

    /// The lag with the largest NSDF value over the searched range.
    /// For an all-zero NSDF this degenerates to `tau_min`; the caller
    /// still reports zero clarity in that case.
    fn global_max_lag(&self) -> usize {
        let mut best_lag = self.tau_min;
        let mut best_value = f32::NEG_INFINITY;
        for tau in self.tau_min..=self.tau_max {
            if self.nsdf[tau] > best_value {
                best_value = self.nsdf[tau];
                best_lag = tau;
            }
        }
        best_lag
    }

    /// Canonical MPM peak picking: gather one key maximum per stretch
    /// of the NSDF between a positive-going and a negative-going zero
    /// crossing, then select the first whose value reaches
    /// `FIRST_DOMINANT_CUTOFF` times the largest. Returns `None` when
    /// the NSDF never crosses zero, e.g. for a flat window.
    fn first_dominant_lag(&self) -> Option<usize> {
        let mut candidates = [0usize; MAX_KEY_MAXIMA];
        let mut candidate_count = 0;
        let mut detecting = false;
        let mut max_value = 0.0f32;
        let mut max_lag = 0usize;
        let mut prev = self.nsdf[self.tau_min];

        for tau in (self.tau_min + 1)..=self.tau_max {
            let curr = self.nsdf[tau];
            if prev <= 0.0 && curr > 0.0 {
                // Positive-going zero crossing: start tracking a maximum.
                detecting = true;
                max_value = curr;
                max_lag = tau;
            } else if prev >= 0.0 && curr < 0.0 {
                // Negative-going zero crossing: store the tracked maximum.
                if detecting && candidate_count < MAX_KEY_MAXIMA {
                    candidates[candidate_count] = max_lag;
                    candidate_count += 1;
                }
                detecting = false;
            }
            if detecting {
                if tau == self.tau_max {
                    // The range ended mid-lobe; keep what we have.
                    if candidate_count < MAX_KEY_MAXIMA {
                        candidates[candidate_count] =
                            if curr > max_value { tau } else { max_lag };
                        candidate_count += 1;
                    }
                } else if curr > max_value {
                    max_value = curr;
                    max_lag = tau;
                }
            }
            prev = curr;
        }

        if candidate_count == 0 {
            return None;
        }
        let mut largest = f32::NEG_INFINITY;
        for &lag in &candidates[..candidate_count] {
            largest = largest.max(self.nsdf[lag]);
        }
        let threshold = FIRST_DOMINANT_CUTOFF * largest;
        candidates[..candidate_count]
            .iter()
            .copied()
            .find(|&lag| self.nsdf[lag] >= threshold)
    }

    /// Refines an integer peak lag by fitting a parabola through the
    /// peak and its neighbors. Boundary lags and a vanishing curvature
    /// denominator keep the integer lag unchanged.
    fn refine_lag(&self, lag: usize) -> f32 {
        if lag <= self.tau_min || lag >= self.tau_max {
            return lag as f32;
        }
        let y1 = self.nsdf[lag - 1];
        let y2 = self.nsdf[lag];
        let y3 = self.nsdf[lag + 1];
        let denom = 2.0 * (2.0 * y2 - y1 - y3);
        if denom == 0.0 {
            return lag as f32;
        }
        lag as f32 + (y1 - y3) / denom
    }
}

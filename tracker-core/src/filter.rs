//! One-pole high-pass filter applied to every incoming sample, removing
//! DC offset and low rumble before anything reaches the ring buffer.

use std::f32::consts::PI;

/// Discretized one-pole high-pass filter:
/// `y[n] = alpha * (y[n-1] + x[n] - x[n-1])` with
/// `alpha = RC / (RC + dt)` and `RC = 1 / (2 * pi * cutoff)`.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    alpha: f32,
    prev_input: f32,
    prev_output: f32,
}

impl HighPassFilter {
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        HighPassFilter {
            alpha: rc / (rc + dt),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    /// Filters a single sample. State persists across calls; the filter
    /// starts from zero state, so the very first window carries a brief
    /// settling transient.
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.alpha * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    /// Returns the filter to its initial zero state.
    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

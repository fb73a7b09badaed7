//! Zero-phase high-pass filter for rumble removal
//!
//! A first-order Butterworth section run through `biquad`, applied forward
//! and then backward so the result has no phase shift.

use biquad::{Biquad, Coefficients, DirectForm1};

use super::buffer::AudioBuffer;
use crate::error::{CleanError, Result};

/// Default rumble cutoff in Hz.
pub const DEFAULT_HIGH_PASS_HZ: f32 = 100.0;

/// Edge extension length: three times the filter length (two taps).
const PAD_LEN: usize = 6;

/// First-order Butterworth high-pass
#[derive(Clone, Copy)]
pub struct HighPassFilter {
    coeffs: Coefficients<f32>,
}

impl HighPassFilter {
    /// Design the filter for `cutoff_hz` at `sample_rate`.
    ///
    /// Bilinear transform with prewarping, the same response as a
    /// first-order Butterworth design normalized to Nyquist.
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Result<Self> {
        let nyquist = sample_rate / 2.0;
        if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 {
            return Err(CleanError::Filter(format!(
                "Cutoff must be a positive frequency, got {} Hz",
                cutoff_hz
            )));
        }
        if !sample_rate.is_finite() || cutoff_hz >= nyquist {
            return Err(CleanError::Filter(format!(
                "Cutoff {} Hz must be below Nyquist ({} Hz)",
                cutoff_hz, nyquist
            )));
        }

        let k = (std::f32::consts::PI * cutoff_hz / sample_rate).tan();
        let norm = 1.0 / (1.0 + k);
        let coeffs = Coefficients {
            a1: (k - 1.0) * norm,
            a2: 0.0,
            b0: norm,
            b1: -norm,
            b2: 0.0,
        };

        Ok(Self { coeffs })
    }

    /// Filter one channel forward and backward.
    ///
    /// Output length always equals input length.
    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        let n = samples.len();
        if n < 2 {
            return samples.to_vec();
        }

        let pad = PAD_LEN.min(n - 1);
        let first = samples[0];
        let last = samples[n - 1];

        // Odd extension at both ends
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i]));
        extended.extend_from_slice(samples);
        extended.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i]));

        let mut forward = self.run_from_steady_state(&extended);
        forward.reverse();
        let mut backward = self.run_from_steady_state(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }

    /// Single pass with the state settled on the first input value.
    ///
    /// The section has zero DC gain, so the settled response to a constant
    /// is zero and filtering `x - x[0]` from rest gives the same output.
    fn run_from_steady_state(&self, samples: &[f32]) -> Vec<f32> {
        let mut section = DirectForm1::<f32>::new(self.coeffs);
        let offset = samples.first().copied().unwrap_or(0.0);
        samples.iter().map(|s| section.run(s - offset)).collect()
    }
}

/// Apply the zero-phase high-pass to every channel of `buffer`.
pub fn high_pass(buffer: &AudioBuffer, cutoff_hz: f32) -> Result<AudioBuffer> {
    let filter = HighPassFilter::new(buffer.sample_rate() as f32, cutoff_hz)?;
    buffer.try_map_channels(|channel| Ok(filter.process(&channel)))
}

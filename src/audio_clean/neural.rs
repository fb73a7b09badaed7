//! Neural denoising using RNNoise via nnnoiseless
//!
//! Alternative to the spectral gate for speech recordings.

use nnnoiseless::DenoiseState;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::{CleanError, Result};

/// RNNoise frame size (fixed at 480 samples at 48kHz = 10ms)
const RNNOISE_FRAME_SIZE: usize = 480;
/// RNNoise sample rate (fixed at 48kHz)
const RNNOISE_SAMPLE_RATE: f64 = 48000.0;
/// RNNoise works on 16-bit PCM scale, not ±1.0
const PCM_SCALE: f32 = 32768.0;

/// Neural denoiser wrapper around nnnoiseless
pub struct NeuralDenoiser {
    strength: f32,
    source_sample_rate: f64,
}

impl NeuralDenoiser {
    /// Create a new neural denoiser
    ///
    /// # Arguments
    /// * `source_sample_rate` - Sample rate of the input audio
    /// * `strength` - Blend strength (0.0 = original, 1.0 = fully denoised)
    pub fn new(source_sample_rate: u32, strength: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            source_sample_rate: source_sample_rate as f64,
        }
    }

    /// Denoise one channel. Output has the same length as the input.
    pub fn process(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.is_empty() || self.strength <= 0.0 {
            return Ok(samples.to_vec());
        }

        let needs_resample = (self.source_sample_rate - RNNOISE_SAMPLE_RATE).abs() > 1.0;

        let samples_48k = if needs_resample {
            resample(samples, RNNOISE_SAMPLE_RATE / self.source_sample_rate)?
        } else {
            samples.to_vec()
        };

        let denoised_48k = run_rnnoise(&samples_48k);

        let mut denoised = if needs_resample {
            resample(&denoised_48k, self.source_sample_rate / RNNOISE_SAMPLE_RATE)?
        } else {
            denoised_48k
        };
        // Rounding in the two resamples can leave the length one sample off
        denoised.resize(samples.len(), 0.0);

        // Blend with original based on strength
        Ok(samples
            .iter()
            .zip(&denoised)
            .map(|(dry, wet)| dry * (1.0 - self.strength) + wet * self.strength)
            .collect())
    }
}

/// Resample a whole channel in one chunk
///
/// The sinc filter delay is removed and the tail flushed, so output sample
/// `i` sits at input time `i / ratio` and the length is `len * ratio`.
fn resample(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| CleanError::Denoise(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| CleanError::Denoise(format!("Failed to resample: {}", e)))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Push zeros through until the delayed tail has come out
    while output.len() < delay + expected {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| CleanError::Denoise(format!("Failed to flush resampler: {}", e)))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend_from_slice(&tail);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

/// Run audio through RNNoise in fixed frames
///
/// RNNoise answers one frame late, so one extra frame of zeros is fed in
/// and the first frame of output dropped.
fn run_rnnoise(samples: &[f32]) -> Vec<f32> {
    let mut state = DenoiseState::new();
    let padded_len = samples.len() + RNNOISE_FRAME_SIZE;
    let mut output = Vec::with_capacity(padded_len + RNNOISE_FRAME_SIZE);
    let mut frame = [0.0f32; RNNOISE_FRAME_SIZE];
    let mut output_frame = [0.0f32; RNNOISE_FRAME_SIZE];

    for start in (0..padded_len).step_by(RNNOISE_FRAME_SIZE) {
        frame.fill(0.0);
        let chunk = samples.get(start..).unwrap_or(&[]);
        for (slot, sample) in frame.iter_mut().zip(chunk) {
            *slot = sample * PCM_SCALE;
        }

        state.process_frame(&mut output_frame, &frame);

        output.extend(output_frame.iter().map(|s| s / PCM_SCALE));
    }

    output.drain(..RNNOISE_FRAME_SIZE.min(output.len()));
    output.truncate(samples.len());
    output
}

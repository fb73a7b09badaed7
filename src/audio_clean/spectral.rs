//! Spectral noise gating using an FFT-based soft mask
//!
//! Tracks a per-bin noise floor by smoothing the magnitude spectrogram over
//! time, gates bins that do not rise clearly above it, and resynthesizes by
//! windowed overlap-add.

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::error::{CleanError, Result};

const FFT_SIZE: usize = 1024;
const HOP_SIZE: usize = FFT_SIZE / 4; // 75% overlap

/// Time constant of the running noise floor estimate
const NOISE_TIME_CONSTANT_S: f32 = 2.0;
/// A bin must be this many times above the floor to open the gate
const THRESH_MULT: f32 = 2.0;
const SIGMOID_SLOPE: f32 = 10.0;
const FREQ_MASK_SMOOTH_HZ: f32 = 500.0;
const TIME_MASK_SMOOTH_MS: f32 = 50.0;

/// Samples gated per block; bounds the spectrogram held in memory
const CHUNK_SIZE: usize = 600_000;
/// Context processed on each side of a block and then discarded
const CHUNK_PADDING: usize = 30_000;

/// FFT-based spectral gate
pub struct SpectralGate {
    sample_rate: f32,
    strength: f32,
    forward_fft: Arc<dyn RealToComplex<f32>>,
    inverse_fft: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
    chunk_size: usize,
    chunk_padding: usize,
}

impl SpectralGate {
    /// Create a new spectral gate
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `strength` - Proportion of the gate applied (0.0 = none, 1.0 = full)
    pub fn new(sample_rate: f32, strength: f32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward_fft = planner.plan_fft_forward(FFT_SIZE);
        let inverse_fft = planner.plan_fft_inverse(FFT_SIZE);

        // Periodic Hann window
        let window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos())
            })
            .collect();

        Self {
            sample_rate,
            strength: strength.clamp(0.0, 1.0),
            forward_fft,
            inverse_fft,
            window,
            chunk_size: CHUNK_SIZE,
            chunk_padding: CHUNK_PADDING,
        }
    }

    /// Override the block length and the context kept around each block.
    pub fn with_chunking(mut self, chunk_size: usize, chunk_padding: usize) -> Self {
        self.chunk_size = chunk_size.max(FFT_SIZE);
        self.chunk_padding = chunk_padding;
        self
    }

    /// Process one channel through the gate
    ///
    /// Long channels are gated in overlapping blocks; the padding around each
    /// block is dropped at the seams. Output has the same length as the input.
    pub fn process(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() <= self.chunk_size {
            return self.process_block(samples);
        }

        let mut output = Vec::with_capacity(samples.len());
        let mut start = 0;
        while start < samples.len() {
            let end = (start + self.chunk_size).min(samples.len());
            let lo = start.saturating_sub(self.chunk_padding);
            let hi = (end + self.chunk_padding).min(samples.len());

            let block = self.process_block(&samples[lo..hi])?;
            output.extend_from_slice(&block[start - lo..end - lo]);
            start = end;
        }
        Ok(output)
    }

    /// Gate one contiguous block in a single spectrogram
    fn process_block(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let bins = FFT_SIZE / 2 + 1;

        // Centre the first frame on sample 0 and cover the tail fully
        let pad = FFT_SIZE / 2;
        let base_len = samples.len() + 2 * pad;
        let frame_count = 1 + (base_len.saturating_sub(FFT_SIZE) + HOP_SIZE - 1) / HOP_SIZE;
        let padded_len = (frame_count - 1) * HOP_SIZE + FFT_SIZE;

        let mut padded = vec![0.0f32; padded_len];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        // Pass 1: magnitude spectrogram, frame-major
        let mut magnitudes = vec![0.0f32; frame_count * bins];
        for frame in 0..frame_count {
            let spectrum = self.analyze(&padded, frame)?;
            for (k, c) in spectrum.iter().enumerate() {
                magnitudes[frame * bins + k] = c.norm();
            }
        }

        let mask = self.build_mask(&magnitudes, frame_count, bins);

        // Pass 2: apply mask and overlap-add
        let mut output = vec![0.0f32; padded_len];
        let mut window_sum = vec![0.0f32; padded_len];
        let mut time_buffer = self.inverse_fft.make_output_vec();
        let norm = 1.0 / FFT_SIZE as f32;

        for frame in 0..frame_count {
            let mut spectrum = self.analyze(&padded, frame)?;
            for (k, c) in spectrum.iter_mut().enumerate() {
                *c *= mask[frame * bins + k];
            }
            // DC and Nyquist bins must stay purely real for the inverse transform
            spectrum[0].im = 0.0;
            spectrum[bins - 1].im = 0.0;

            self.inverse_fft
                .process(&mut spectrum, &mut time_buffer)
                .map_err(|e| CleanError::Denoise(format!("Inverse FFT failed: {}", e)))?;

            let pos = frame * HOP_SIZE;
            for (i, sample) in time_buffer.iter().enumerate() {
                output[pos + i] += sample * norm * self.window[i];
                window_sum[pos + i] += self.window[i] * self.window[i];
            }
        }

        // Normalize by window sum (overlap-add normalization)
        Ok((pad..pad + samples.len())
            .map(|i| {
                if window_sum[i] > 1e-3 {
                    output[i] / window_sum[i]
                } else {
                    0.0
                }
            })
            .collect())
    }

    /// Window and transform one frame of the padded signal
    fn analyze(&self, padded: &[f32], frame: usize) -> Result<Vec<Complex<f32>>> {
        let pos = frame * HOP_SIZE;
        let mut buffer: Vec<f32> = padded[pos..pos + FFT_SIZE]
            .iter()
            .zip(&self.window)
            .map(|(s, w)| s * w)
            .collect();

        let mut spectrum = self.forward_fft.make_output_vec();
        self.forward_fft
            .process(&mut buffer, &mut spectrum)
            .map_err(|e| CleanError::Denoise(format!("Forward FFT failed: {}", e)))?;
        Ok(spectrum)
    }

    /// Soft mask in [1 - strength, 1] for every (frame, bin)
    fn build_mask(&self, magnitudes: &[f32], frames: usize, bins: usize) -> Vec<f32> {
        let floor = smooth_over_time(magnitudes, frames, bins, self.floor_coefficient());

        let mut gate: Vec<f32> = magnitudes
            .iter()
            .zip(&floor)
            .map(|(mag, noise)| {
                let above = (mag - noise) / (noise + 1e-10);
                1.0 / (1.0 + (-(above - THRESH_MULT) * SIGMOID_SLOPE).exp())
            })
            .collect();

        let freq_radius = (FREQ_MASK_SMOOTH_HZ / (self.sample_rate / (FFT_SIZE as f32 / 2.0))) as usize;
        let time_radius = (TIME_MASK_SMOOTH_MS / (HOP_SIZE as f32 / self.sample_rate * 1000.0)) as usize;
        gate = convolve_axis(&gate, frames, bins, &triangle(freq_radius), Axis::Bins);
        gate = convolve_axis(&gate, frames, bins, &triangle(time_radius), Axis::Frames);

        let strength = self.strength;
        gate.iter()
            .map(|g| g * strength + (1.0 - strength))
            .collect()
    }

    /// One-pole coefficient for the noise floor follower
    fn floor_coefficient(&self) -> f32 {
        let t_frames = NOISE_TIME_CONSTANT_S * self.sample_rate / HOP_SIZE as f32;
        ((1.0 + 4.0 * t_frames * t_frames).sqrt() - 1.0) / (2.0 * t_frames * t_frames)
    }
}

/// Forward-backward one-pole smoothing of each bin across frames
fn smooth_over_time(magnitudes: &[f32], frames: usize, bins: usize, b: f32) -> Vec<f32> {
    let mut smoothed = magnitudes.to_vec();
    for k in 0..bins {
        let mut state = smoothed[k];
        for frame in 0..frames {
            let idx = frame * bins + k;
            state = b * smoothed[idx] + (1.0 - b) * state;
            smoothed[idx] = state;
        }
        let mut state = smoothed[(frames - 1) * bins + k];
        for frame in (0..frames).rev() {
            let idx = frame * bins + k;
            state = b * smoothed[idx] + (1.0 - b) * state;
            smoothed[idx] = state;
        }
    }
    smoothed
}

/// Normalized triangular kernel of length `2 * radius + 1`
fn triangle(radius: usize) -> Vec<f32> {
    let weights: Vec<f32> = (0..=2 * radius)
        .map(|j| 1.0 - (j as f32 - radius as f32).abs() / (radius as f32 + 1.0))
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

#[derive(Clone, Copy)]
enum Axis {
    Frames,
    Bins,
}

/// Same-size convolution along one axis, zero outside the grid
fn convolve_axis(grid: &[f32], frames: usize, bins: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
    if kernel.len() == 1 {
        return grid.to_vec();
    }
    let radius = (kernel.len() / 2) as isize;
    let mut out = vec![0.0f32; grid.len()];

    for frame in 0..frames {
        for k in 0..bins {
            let mut acc = 0.0f32;
            for (j, weight) in kernel.iter().enumerate() {
                let offset = j as isize - radius;
                let (f, b) = match axis {
                    Axis::Frames => (frame as isize + offset, k as isize),
                    Axis::Bins => (frame as isize, k as isize + offset),
                };
                if f >= 0 && (f as usize) < frames && b >= 0 && (b as usize) < bins {
                    acc += weight * grid[f as usize * bins + b as usize];
                }
            }
            out[frame * bins + k] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_clean::buffer::rms;

    /// Small deterministic noise source (xorshift)
    fn noise(len: usize, amplitude: f32, mut seed: u32) -> Vec<f32> {
        (0..len)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                amplitude * ((seed as f32 / u32::MAX as f32) * 2.0 - 1.0)
            })
            .collect()
    }

    #[test]
    fn test_triangle_kernel() {
        assert_eq!(triangle(0), vec![1.0]);
        let k = triangle(2);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(k[2] > k[1] && k[1] > k[0]);
        assert!((k[0] - k[4]).abs() < 1e-9);
    }

    #[test]
    fn test_zero_strength_is_near_identity() {
        let sample_rate = 16000.0;
        let samples: Vec<f32> = noise(16000, 0.2, 7)
            .iter()
            .enumerate()
            .map(|(i, n)| n + 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate).sin())
            .collect();

        let gate = SpectralGate::new(sample_rate, 0.0);
        let out = gate.process(&samples).unwrap();
        assert_eq!(out.len(), samples.len());

        let diff: Vec<f32> = out.iter().zip(&samples).map(|(a, b)| a - b).collect();
        assert!(rms(&diff) < 1e-4, "round trip error too large: {}", rms(&diff));
    }

    #[test]
    fn test_full_strength_reduces_steady_noise() {
        let samples = noise(32000, 0.1, 42);
        let gate = SpectralGate::new(16000.0, 1.0);
        let out = gate.process(&samples).unwrap();
        assert_eq!(out.len(), samples.len());
        assert!(rms(&out) < rms(&samples) * 0.5);
    }

    #[test]
    fn test_chunked_matches_single_block() {
        // 6 s at 16 kHz: quiet noise with a 100 ms tone burst every second.
        // Seams and block edges all fall in the noise between bursts.
        let sample_rate = 16000.0;
        let background = noise(96000, 0.005, 99);
        let samples: Vec<f32> = background
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let t = i as f32 / sample_rate;
                let in_burst = (0.45..0.55).contains(&t.fract());
                let tone = if in_burst {
                    0.3 * (2.0 * std::f32::consts::PI * 1000.0 * t).sin()
                } else {
                    0.0
                };
                n + tone
            })
            .collect();

        let whole = SpectralGate::new(sample_rate, 0.5)
            .with_chunking(samples.len(), 0)
            .process(&samples)
            .unwrap();
        let chunked = SpectralGate::new(sample_rate, 0.5)
            .with_chunking(32000, 16000)
            .process(&samples)
            .unwrap();

        assert_eq!(chunked.len(), samples.len());
        let diff: Vec<f32> = whole.iter().zip(&chunked).map(|(a, b)| a - b).collect();
        assert!(
            rms(&diff) < 0.1 * rms(&whole),
            "chunked output drifted: {} vs {}",
            rms(&diff),
            rms(&whole)
        );
    }

    #[test]
    fn test_chunk_seams_keep_length() {
        let samples = noise(5000, 0.1, 3);
        let out = SpectralGate::new(16000.0, 1.0)
            .with_chunking(1024, 100)
            .process(&samples)
            .unwrap();
        assert_eq!(out.len(), samples.len());
    }

    #[test]
    fn test_short_and_empty_input() {
        let gate = SpectralGate::new(44100.0, 1.0);
        assert!(gate.process(&[]).unwrap().is_empty());
        assert_eq!(gate.process(&[0.1f32; 100]).unwrap().len(), 100);
    }
}

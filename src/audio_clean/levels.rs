//! Channel and level post-processing
//!
//! Every function here takes a buffer and returns a new one, so the order of
//! the calls in the pipeline is the only coupling between them.

use super::buffer::{db_to_linear, AudioBuffer};

/// Default peak ceiling applied after normalization.
pub const DEFAULT_LIMITER_CEILING_DB: f32 = -1.0;

const PCM16_MAX: f32 = 32767.0;

/// Round samples to the 16-bit integer grid, clipping at full scale.
///
/// Mirrors writing the buffer out as 16-bit PCM and reading it back.
pub fn quantize_pcm16(buffer: &AudioBuffer) -> AudioBuffer {
    let samples = buffer
        .samples()
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * PCM16_MAX).round() / PCM16_MAX)
        .collect();
    AudioBuffer::new(samples, buffer.sample_rate(), buffer.channels())
}

/// Average all channels into one.
pub fn downmix_to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    let channels = buffer.channels() as usize;
    if channels == 1 {
        return buffer.clone();
    }
    let mono = buffer
        .samples()
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    AudioBuffer::mono(mono, buffer.sample_rate())
}

/// Uniform gain so the peak sits `headroom_db` below full scale.
///
/// Silent buffers come back unchanged.
pub fn normalize(buffer: &AudioBuffer, headroom_db: f32) -> AudioBuffer {
    let peak = buffer.peak();
    if peak <= 0.0 {
        return buffer.clone();
    }
    scale(buffer, db_to_linear(-headroom_db.abs()) / peak)
}

/// Pull the peak down to `ceiling_db` if it is above it.
pub fn limit(buffer: &AudioBuffer, ceiling_db: f32) -> AudioBuffer {
    let peak = buffer.peak();
    let ceiling = db_to_linear(ceiling_db);
    if peak <= ceiling {
        return buffer.clone();
    }
    scale(buffer, ceiling / peak)
}

/// Fixed gain in dB. Samples saturate at ±1.0 like integer PCM.
pub fn apply_gain(buffer: &AudioBuffer, gain_db: f32) -> AudioBuffer {
    if gain_db == 0.0 {
        return buffer.clone();
    }
    let factor = db_to_linear(gain_db);
    let samples = buffer
        .samples()
        .iter()
        .map(|s| (s * factor).clamp(-1.0, 1.0))
        .collect();
    AudioBuffer::new(samples, buffer.sample_rate(), buffer.channels())
}

fn scale(buffer: &AudioBuffer, factor: f32) -> AudioBuffer {
    let samples = buffer.samples().iter().map(|s| s * factor).collect();
    AudioBuffer::new(samples, buffer.sample_rate(), buffer.channels())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, frames: usize) -> AudioBuffer {
        let samples = (0..frames)
            .map(|i| amplitude * (i as f32 * 0.07).sin())
            .collect();
        AudioBuffer::mono(samples, 44100)
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = AudioBuffer::new(vec![0.2, 0.4, -0.6, 0.0], 8000, 2);
        let mono = downmix_to_mono(&stereo);
        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.frames(), 2);
        assert!((mono.samples()[0] - 0.3).abs() < 1e-6);
        assert!((mono.samples()[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_reaches_full_scale() {
        let out = normalize(&tone(0.1, 4000), 0.0);
        assert!((out.peak() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_then_limit_respects_ceiling() {
        for amplitude in [0.001, 0.05, 0.5, 0.99, 1.0] {
            let normalized = normalize(&tone(amplitude, 4000), 0.0);
            let limited = limit(&normalized, DEFAULT_LIMITER_CEILING_DB);
            assert!(
                limited.peak_dbfs() <= DEFAULT_LIMITER_CEILING_DB + 1e-4,
                "peak {} dBFS above ceiling for amplitude {}",
                limited.peak_dbfs(),
                amplitude
            );
        }
    }

    #[test]
    fn test_silence_untouched() {
        let silent = AudioBuffer::mono(vec![0.0; 100], 8000);
        assert_eq!(normalize(&silent, 0.0), silent);
        assert_eq!(limit(&silent, -1.0), silent);
    }

    #[test]
    fn test_limit_leaves_quiet_audio_alone() {
        let quiet = tone(0.2, 1000);
        assert_eq!(limit(&quiet, -1.0), quiet);
    }

    #[test]
    fn test_gain_saturates() {
        let buffer = AudioBuffer::mono(vec![0.5, -0.9, 0.1], 8000);
        let out = apply_gain(&buffer, 10.0);
        assert_eq!(out.samples()[0], 1.0);
        assert_eq!(out.samples()[1], -1.0);
        assert!((out.samples()[2] - 0.1 * 3.1623).abs() < 1e-3);
    }

    #[test]
    fn test_quantize_pcm16() {
        let buffer = AudioBuffer::mono(vec![1.5, -2.0, 0.0, 0.25], 8000);
        let out = quantize_pcm16(&buffer);
        assert_eq!(out.samples()[0], 1.0);
        assert_eq!(out.samples()[1], -1.0);
        assert_eq!(out.samples()[2], 0.0);
        assert!((out.samples()[3] - 0.25).abs() < 1.0 / 32767.0);
    }
}

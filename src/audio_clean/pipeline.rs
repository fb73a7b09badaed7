//! Audio cleaning pipeline orchestration
//!
//! Runs the cleaning stages on a decoded buffer in a fixed order:
//! high-pass, denoise, PCM re-quantization, downmix, normalize, limit,
//! clarity boost, silence trim.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;
use super::filters::{high_pass, DEFAULT_HIGH_PASS_HZ};
use super::levels::{self, DEFAULT_LIMITER_CEILING_DB};
use super::neural::NeuralDenoiser;
use super::silence::{trim_silence, SilenceTrimOptions};
use super::spectral::SpectralGate;
use crate::commands::export::OutputFormat;
use crate::error::{CleanError, Result};

/// Largest clarity boost the controls allow
pub const MAX_CLARITY_BOOST_DB: u8 = 10;

/// User-facing options for one cleaning run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Proportion of the detected noise removed (0-1)
    pub noise_strength: f32,
    /// Extra gain after limiting (0-10 dB)
    pub clarity_boost_db: u8,
    /// Enable the 100 Hz rumble filter
    pub apply_high_pass: bool,
    /// Enable silence trimming
    pub apply_silence_trim: bool,
    pub output_format: OutputFormat,
    pub denoise_method: DenoiseMethod,
}

/// Noise reduction backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DenoiseMethod {
    /// FFT spectral gating
    #[default]
    Spectral,
    /// RNNoise
    Neural,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noise_strength: 1.0,
            clarity_boost_db: 0,
            apply_high_pass: false,
            apply_silence_trim: false,
            output_format: OutputFormat::Wav,
            denoise_method: DenoiseMethod::Spectral,
        }
    }
}

impl PipelineConfig {
    /// Reject values outside the ranges the controls allow.
    pub fn validate(&self) -> Result<()> {
        if !self.noise_strength.is_finite() || !(0.0..=1.0).contains(&self.noise_strength) {
            return Err(CleanError::InvalidConfig(format!(
                "noise strength must be between 0 and 1, got {}",
                self.noise_strength
            )));
        }
        if self.clarity_boost_db > MAX_CLARITY_BOOST_DB {
            return Err(CleanError::InvalidConfig(format!(
                "clarity boost must be between 0 and {} dB, got {}",
                MAX_CLARITY_BOOST_DB, self.clarity_boost_db
            )));
        }
        Ok(())
    }
}

/// Fixed stage parameters set by whoever hosts the tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StageSettings {
    pub high_pass_cutoff_hz: f32,
    pub limiter_ceiling_db: f32,
    pub silence: SilenceTrimOptions,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            high_pass_cutoff_hz: DEFAULT_HIGH_PASS_HZ,
            limiter_ceiling_db: DEFAULT_LIMITER_CEILING_DB,
            silence: SilenceTrimOptions::default(),
        }
    }
}

/// Reduce noise on every channel with the chosen backend.
pub fn reduce_noise(buffer: &AudioBuffer, strength: f32, method: DenoiseMethod) -> Result<AudioBuffer> {
    match method {
        DenoiseMethod::Spectral => {
            let gate = SpectralGate::new(buffer.sample_rate() as f32, strength);
            buffer.try_map_channels(|channel| gate.process(&channel))
        }
        DenoiseMethod::Neural => {
            let denoiser = NeuralDenoiser::new(buffer.sample_rate(), strength);
            buffer.try_map_channels(|channel| denoiser.process(&channel))
        }
    }
}

/// Mono, normalized, limited and boosted copy of a denoised buffer.
pub fn post_process(buffer: &AudioBuffer, boost_db: u8, ceiling_db: f32) -> AudioBuffer {
    let pcm = levels::quantize_pcm16(buffer);
    let mono = levels::downmix_to_mono(&pcm);
    let normalized = levels::normalize(&mono, 0.0);
    let limited = levels::limit(&normalized, ceiling_db);
    levels::apply_gain(&limited, boost_db as f32)
}

/// Process a decoded buffer through every enabled stage
///
/// # Arguments
/// * `buffer` - Decoded audio at its native rate and channel count
/// * `config` - User options for this run
/// * `settings` - Fixed stage parameters
pub fn process_audio(
    buffer: AudioBuffer,
    config: &PipelineConfig,
    settings: &StageSettings,
) -> Result<AudioBuffer> {
    config.validate()?;

    // Stage 1: high-pass (IIR, zero-phase)
    let filtered = if config.apply_high_pass {
        let started = Instant::now();
        let out = high_pass(&buffer, settings.high_pass_cutoff_hz)?;
        log::debug!(
            "High-pass at {} Hz: {} frames in {:?}",
            settings.high_pass_cutoff_hz,
            out.frames(),
            started.elapsed()
        );
        out
    } else {
        buffer
    };

    // Stage 2: noise reduction
    let started = Instant::now();
    let denoised = reduce_noise(&filtered, config.noise_strength, config.denoise_method)?;
    log::debug!(
        "Denoise ({:?}, strength {:.2}): {} frames x {} ch in {:?}",
        config.denoise_method,
        config.noise_strength,
        denoised.frames(),
        denoised.channels(),
        started.elapsed()
    );

    // Stage 3: levels
    let levelled = post_process(&denoised, config.clarity_boost_db, settings.limiter_ceiling_db);
    log::debug!(
        "Levels: peak {:.2} dBFS, average {:.2} dBFS",
        levelled.peak_dbfs(),
        levelled.dbfs()
    );

    // Stage 4: silence trim
    if config.apply_silence_trim {
        Ok(trim_silence(&levelled, &settings.silence))
    } else {
        Ok(levelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_tone(sample_rate: u32, seconds: f32, channels: u16) -> AudioBuffer {
        let frames = (sample_rate as f32 * seconds) as usize;
        let mut seed = 12345u32;
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let tone = 0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
            for _ in 0..channels {
                seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = ((seed >> 16) as f32 / 32768.0 - 1.0) * 0.02;
                samples.push(tone + noise);
            }
        }
        AudioBuffer::new(samples, sample_rate, channels)
    }

    #[test]
    fn test_default_options() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_format, OutputFormat::Wav);
        assert_eq!(config.denoise_method, DenoiseMethod::Spectral);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = PipelineConfig {
            noise_strength: 1.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CleanError::InvalidConfig(_))));

        let config = PipelineConfig {
            noise_strength: f32::NAN,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CleanError::InvalidConfig(_))));

        let config = PipelineConfig {
            clarity_boost_db: 11,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(CleanError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_json_camel_case() {
        let json = r#"{"noiseStrength":0.5,"clarityBoostDb":3,"applyHighPass":true,"outputFormat":"mp3"}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.noise_strength, 0.5);
        assert_eq!(config.clarity_boost_db, 3);
        assert!(config.apply_high_pass);
        assert!(!config.apply_silence_trim);
        assert_eq!(config.output_format, OutputFormat::Mp3);
    }

    #[test]
    fn test_process_audio_stereo_to_mono() {
        let buffer = noisy_tone(16000, 1.0, 2);
        let config = PipelineConfig {
            apply_high_pass: true,
            ..PipelineConfig::default()
        };
        let out = process_audio(buffer.clone(), &config, &StageSettings::default()).unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(out.frames(), buffer.frames());
        assert_eq!(out.sample_rate(), 16000);
        assert!(out.peak_dbfs() <= DEFAULT_LIMITER_CEILING_DB + 1e-3);
    }

    #[test]
    fn test_boost_applied_after_limit() {
        let buffer = noisy_tone(16000, 0.5, 1);
        let config = PipelineConfig {
            noise_strength: 0.0,
            clarity_boost_db: 6,
            ..PipelineConfig::default()
        };
        let out = process_audio(buffer, &config, &StageSettings::default()).unwrap();
        assert!(out.peak() <= 1.0);
        assert!(out.peak_dbfs() > DEFAULT_LIMITER_CEILING_DB);
    }

    #[test]
    fn test_high_pass_bad_cutoff_fails() {
        let buffer = noisy_tone(8000, 0.2, 1);
        let config = PipelineConfig {
            apply_high_pass: true,
            ..PipelineConfig::default()
        };
        let settings = StageSettings {
            high_pass_cutoff_hz: 5000.0,
            ..StageSettings::default()
        };
        let result = process_audio(buffer, &config, &settings);
        assert!(matches!(result, Err(CleanError::Filter(_))));
    }

    #[test]
    fn test_process_audio_empty() {
        let buffer = AudioBuffer::mono(Vec::new(), 44100);
        let out = process_audio(buffer, &PipelineConfig::default(), &StageSettings::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_silence_only_input_trims_to_empty() {
        let buffer = AudioBuffer::mono(vec![0.0; 44100 * 2], 44100);
        let config = PipelineConfig {
            apply_silence_trim: true,
            ..PipelineConfig::default()
        };
        let out = process_audio(buffer, &config, &StageSettings::default()).unwrap();
        assert!(out.is_empty());
    }
}

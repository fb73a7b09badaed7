//! Audio cleaning pipeline module
//!
//! Provides the processing stages for one upload:
//! 1. Zero-phase high-pass filter for rumble
//! 2. Spectral noise gating (FFT soft mask) or neural denoising (RNNoise)
//! 3. Downmix, normalization, limiting and clarity boost
//! 4. Silence trimming

pub mod buffer;
pub mod filters;
pub mod levels;
pub mod neural;
pub mod pipeline;
pub mod silence;
pub mod spectral;

pub use buffer::AudioBuffer;
pub use pipeline::{process_audio, DenoiseMethod, PipelineConfig, StageSettings};

//! Upload-and-clean audio processing
//!
//! Decodes a WAV or MP3 upload, removes background noise, evens out levels,
//! optionally trims long silences and re-encodes the result for download.

pub mod audio_clean;
pub mod commands;
pub mod config;
pub mod error;
pub mod services;

pub use audio_clean::{AudioBuffer, DenoiseMethod, PipelineConfig, StageSettings};
pub use commands::clean::{Cleaner, ProcessingResult, UploadedFile};
pub use commands::export::OutputFormat;
pub use config::ServiceConfig;
pub use error::{CleanError, Result};

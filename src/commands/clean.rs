//! Cleaning one uploaded file end to end

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::audio_clean::{process_audio, PipelineConfig};
use crate::commands::audio::{decode_file, supported_extension};
use crate::commands::export::{cleaned_filename, encode};
use crate::config::ServiceConfig;
use crate::error::{CleanError, Result};
use crate::services::scratch::ScratchDir;

/// An uploaded file as received from the user
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a local file as if it had been uploaded under its own name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }
}

/// Cleaned audio ready for download
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: &'static str,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Runs uploads through decode, cleaning and encode with fixed service settings.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    config: ServiceConfig,
}

impl Cleaner {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Read a local file as an upload, refusing oversized files before
    /// their contents are loaded.
    pub fn load_upload(&self, path: &Path) -> Result<UploadedFile> {
        let size = std::fs::metadata(path)?.len();
        self.check_size(size)?;
        UploadedFile::from_path(path)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.config.max_upload_bytes {
            return Err(CleanError::UploadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Clean one upload
    ///
    /// The size limit is checked before the bytes are touched. Intermediate
    /// files live in a scratch directory that is removed on every exit path.
    pub fn process(&self, upload: &UploadedFile, options: &PipelineConfig) -> Result<ProcessingResult> {
        let started = Instant::now();
        options.validate()?;

        self.check_size(upload.bytes.len() as u64)?;

        supported_extension(&upload.filename)?;

        let scratch = ScratchDir::create(&self.config.scratch_dir)?;
        let input_path = scratch.write_file(&upload.filename, &upload.bytes)?;

        let decoded = decode_file(&input_path)?;
        let input_secs = decoded.duration_secs();

        let cleaned = process_audio(decoded, options, &self.config.stages)?;
        let encoded = encode(&cleaned, options.output_format, self.config.mp3_bitrate_kbps)?;

        let result = ProcessingResult {
            bytes: encoded.bytes,
            filename: cleaned_filename(&upload.filename, options.output_format),
            mime_type: encoded.mime_type,
            duration_secs: cleaned.duration_secs(),
            sample_rate: cleaned.sample_rate(),
            channels: cleaned.channels(),
        };

        log::info!(
            "Cleaned {} ({:.2}s -> {:.2}s, {} bytes) in {:?}",
            upload.filename,
            input_secs,
            result.duration_secs,
            result.bytes.len(),
            started.elapsed()
        );

        Ok(result)
    }
}

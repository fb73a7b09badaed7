//! Service settings fixed when the cleaner is constructed

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio_clean::StageSettings;
use crate::error::{CleanError, Result};

/// Upload cap: 50 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MP3_BITRATE_KBPS: u32 = 192;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Uploads larger than this are rejected before anything else happens
    pub max_upload_bytes: u64,
    /// Where per-request scratch directories are created
    pub scratch_dir: PathBuf,
    pub mp3_bitrate_kbps: u32,
    #[serde(flatten)]
    pub stages: StageSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            scratch_dir: std::env::temp_dir(),
            mp3_bitrate_kbps: DEFAULT_MP3_BITRATE_KBPS,
            stages: StageSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            CleanError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        log::info!("Loaded settings from {:?}", path);
        Ok(config)
    }
}

/// Every way a cleaning run can fail. A run stops at the first error.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("Upload too large: {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: u64, limit: u64 },
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Filter error: {0}")]
    Filter(String),
    #[error("Noise reduction failed: {0}")]
    Denoise(String),
    #[error("Failed to encode audio: {0}")]
    Encode(String),
    #[error("Invalid settings: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CleanError>;

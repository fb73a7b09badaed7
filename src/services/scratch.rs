//! Per-request scratch directories

use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::export::sanitize_filename;
use crate::error::Result;

/// Per-request scratch directory, removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<root>/noise-reducer-<uuid>`.
    pub fn create(root: &Path) -> Result<Self> {
        let path = root.join(format!("noise-reducer-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        log::debug!("Scratch dir created: {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` under a sanitized version of `filename`.
    pub fn write_file(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let mut name = sanitize_filename(filename);
        if name.is_empty() || name.chars().all(|c| c == '.') {
            name = "upload".to_string();
        }
        let path = self.path.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            log::warn!("Failed to remove scratch dir {:?}: {}", self.path, e);
        }
    }
}

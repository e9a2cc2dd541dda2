use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::info;
use std::path::PathBuf;

/// MIME type used when a response does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Receives fetched files.
#[cfg_attr(test, mockall::automock)]
pub trait SaveFile: Send + Sync {
    /// Stores `blob` under `filename` and returns where it ended up.
    fn save(&self, blob: &[u8], filename: &str, mime_type: &str) -> Result<PathBuf>;
}

/// Builds a download filename: `prefix` followed by `YYYYMMDDHHMMSS`.
pub fn format_filename(prefix: &str, at: NaiveDateTime) -> String {
    format!("{}{}", prefix, at.format("%Y%m%d%H%M%S"))
}

/// Writes files into a fixed directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Saver for the user's download directory, if the platform has one.
    pub fn downloads() -> Option<Self> {
        dirs::download_dir().map(Self::new)
    }
}

impl SaveFile for DirectorySaver {
    #[tracing::instrument(skip(self, blob))]
    fn save(&self, blob: &[u8], filename: &str, mime_type: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create download directory {:?}", self.dir))?;

        let path = self.dir.join(filename);
        std::fs::write(&path, blob).with_context(|| format!("Failed to write {:?}", path))?;

        info!("Saved {} ({}, {} bytes)", path.display(), mime_type, blob.len());
        Ok(path)
    }
}

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::types::VideoRecord;

/// JSON file holding the last announced upload
pub struct VideoStore {
    path: PathBuf,
}

impl VideoStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty record file if none exists yet
    pub async fn initialize(&self) -> Result<()> {
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }

        self.ensure_parent().await?;
        fs::write(&self.path, "{}").await
            .with_context(|| format!("Failed to create video store: {}", self.path.display()))?;

        info!("Created empty video store at: {}", self.path.display());
        Ok(())
    }

    /// Read the stored record. Missing, empty and unreadable files all mean "nothing announced yet".
    pub async fn load(&self) -> Option<VideoRecord> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read video store {}: {}", self.path.display(), e);
                return None;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Video store {} is not valid JSON: {}", self.path.display(), e);
                return None;
            }
        };

        if value.as_object().map_or(true, |object| object.is_empty()) {
            debug!("Video store is empty");
            return None;
        }

        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Video store {} has an unexpected shape: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Overwrite the stored record, replacing the file in one rename
    pub async fn save(&self, record: &VideoRecord) -> Result<()> {
        self.ensure_parent().await?;

        let json = serde_json::to_string_pretty(record)
            .context("Failed to serialize video record")?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, json).await
            .with_context(|| format!("Failed to write video store: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).await
            .with_context(|| format!("Failed to replace video store: {}", self.path.display()))?;

        debug!("Saved video {} to {}", record.id, self.path.display());
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

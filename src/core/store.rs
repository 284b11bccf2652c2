//! Durable storage of the configuration aggregate.

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use super::model::Settings;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("settings store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Where applied configuration ends up.
#[async_trait]
pub trait SettingsStore: Send {
    /// Records a changed aggregate. May defer the physical write.
    async fn update(&mut self, settings: &Settings) -> Result<(), StoreError>;

    /// Makes `settings` durable before returning.
    async fn flush(&mut self, settings: &Settings) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored aggregate. `Ok(None)` when nothing has been stored yet.
    pub async fn load(&self) -> Result<Option<Settings>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Stored settings, or defaults when missing or unreadable.
    pub async fn load_or_default(&self) -> Settings {
        match self.load().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No stored settings at {}, using defaults", self.path.display());
                Settings::default()
            }
            Err(e) => {
                warn!("Failed to read stored settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write(&self, settings: &Settings, sync: bool) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let staging = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.io_error(e))?;
        if sync {
            file.sync_all().await.map_err(|e| self.io_error(e))?;
        } else {
            file.flush().await.map_err(|e| self.io_error(e))?;
        }
        drop(file);

        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn update(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.write(settings, false).await
    }

    async fn flush(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.write(settings, true).await
    }
}

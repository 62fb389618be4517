//! JSON file store
//!
//! Keeps the registry record and the allowlist as UTF-8 JSON documents at
//! fixed paths. Writes go through a temporary file and a rename so a crash
//! never leaves a truncated document behind.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{RegistryRecord, RegistryStore};
use crate::error::PersistenceError;

/// Default location of the registry state document
pub const DEFAULT_STATE_PATH: &str = "/etc/kubernetes/service.json";

/// Default location of the endpoint allowlist
pub const DEFAULT_ALLOWLIST_PATH: &str = "/etc/kubernetes/exceptRuntime.json";

/// Registry store backed by two JSON files
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    state_path: PathBuf,
    allowlist_path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(state_path: impl Into<PathBuf>, allowlist_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            allowlist_path: allowlist_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn allowlist_path(&self) -> &Path {
        &self.allowlist_path
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document not found");
                return Ok(None);
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| PersistenceError::Malformed {
                path: path.display().to_string(),
                source,
            })
    }
}

impl Default for FileRegistryStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_PATH, DEFAULT_ALLOWLIST_PATH)
    }
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn load_state(&self) -> Result<Option<RegistryRecord>, PersistenceError> {
        Self::read_json(&self.state_path).await
    }

    async fn save_state(&self, record: &RegistryRecord) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(record).map_err(PersistenceError::Serialize)?;
        let io_error = |source: std::io::Error| PersistenceError::Io {
            path: self.state_path.display().to_string(),
            source,
        };

        if let Some(parent) = self.state_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }

        let tmp_path = self.state_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await.map_err(io_error)?;
        tokio::fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(io_error)?;

        info!(
            path = %self.state_path.display(),
            endpoints = record.addresses.len(),
            "Registry state saved"
        );
        Ok(())
    }

    async fn load_allowlist(&self) -> Result<Option<Vec<String>>, PersistenceError> {
        Self::read_json(&self.allowlist_path).await
    }
}

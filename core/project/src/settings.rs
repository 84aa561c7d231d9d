//! JSON-file-backed settings store for small key/value state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use wasmpress_common::{Error, Result};

/// Settings key holding the id of the most recently saved or opened project.
pub const LAST_PROJECT_KEY: &str = "last_project";

/// Settings key holding builder UI preferences.
pub const BUILDER_SETTINGS_KEY: &str = "builder_settings";

/// A string-keyed map of JSON values persisted as a single file.
///
/// Every mutation rewrites the whole file. The rewrite goes through a
/// temporary file in the same directory followed by a rename, so readers
/// never observe a partially written document.
pub struct SettingsStore {
    path: PathBuf,
    // Not held across an await; a snapshot is taken before writing.
    values: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl SettingsStore {
    /// Open a settings store, loading the file if it exists.
    ///
    /// # Errors
    /// - I/O failure reading the file
    /// - The file exists but is not a JSON object
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Serialization(format!("settings file {}: {}", path.display(), e))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let values = self.values.read().expect("settings lock poisoned");
        values.get(key).cloned()
    }

    /// Get a value deserialized into a concrete type.
    ///
    /// Returns `Ok(None)` for a missing key; a present but malformed value
    /// is an error.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(|e| {
                    Error::Serialization(format!("settings key '{}': {}", key, e))
                })?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Set a value and persist the store.
    pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        {
            let mut values = self.values.write().expect("settings lock poisoned");
            values.insert(key.into(), value);
        }
        self.persist().await
    }

    /// Set a serializable value and persist the store.
    pub async fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.set(key, value).await
    }

    /// Remove a key, returning whether it was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let removed = {
            let mut values = self.values.write().expect("settings lock poisoned");
            values.remove(key).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let values = self.values.read().expect("settings lock poisoned");
        values.keys().cloned().collect()
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = {
            let values = self.values.read().expect("settings lock poisoned");
            values.clone()
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content.as_bytes()).await?;
        fs::rename(&tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), "settings persisted");
        Ok(())
    }
}

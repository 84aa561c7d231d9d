//! Local filesystem storage provider.
//!
//! Stand-in for the original builder's browser-local database: object bytes
//! live under `<database>/objects/<key>` with a JSON sidecar at
//! `<database>/meta/<key>` carrying content type and user metadata. The two
//! subtrees keep sidecars out of the key namespace, so a key like
//! `a.txt.meta` is an ordinary object.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;
use tracing::debug;

use wasmpress_common::{Error, ObjectKey, Result};

use crate::provider::{
    content_hash, crc_etag, guess_content_type, Capabilities, ConnectionState, ObjectMeta,
    ProviderKind, StorageProvider, UploadReceipt,
};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";

/// Connection configuration for the local provider.
#[derive(Debug, Deserialize)]
struct LocalConfig {
    /// Logical database name; becomes a directory under the data root.
    database: String,
    /// Optional explicit root directory (tests use this).
    #[serde(default)]
    root: Option<PathBuf>,
}

/// Local filesystem storage provider.
pub struct LocalProvider {
    state: RwLock<ConnectionState>,
    root: RwLock<Option<PathBuf>>,
}

impl LocalProvider {
    /// Create a new disconnected local provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            root: RwLock::new(None),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    fn root_dir(&self) -> Result<PathBuf> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => {}
            _ => return Err(Error::NotConnected("local".to_string())),
        }
        self.root
            .read()
            .expect("root lock poisoned")
            .clone()
            .ok_or_else(|| Error::NotConnected("local".to_string()))
    }

    fn keyed_path(root: &Path, top: &str, key: &ObjectKey) -> PathBuf {
        let mut path = root.join(top);
        for segment in key.as_str().split('/') {
            path.push(segment);
        }
        path
    }

    fn data_path(root: &Path, key: &ObjectKey) -> PathBuf {
        Self::keyed_path(root, OBJECTS_DIR, key)
    }

    fn meta_path(root: &Path, key: &ObjectKey) -> PathBuf {
        Self::keyed_path(root, META_DIR, key)
    }

    async fn read_meta(root: &Path, key: &ObjectKey, data_path: &Path) -> Result<ObjectMeta> {
        let meta_path = Self::meta_path(root, key);
        if let Ok(bytes) = fs::read(&meta_path).await {
            let meta: ObjectMeta = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Serialization(format!("Corrupt sidecar for {}: {}", key, e)))?;
            return Ok(meta);
        }

        // No sidecar (file placed out of band); synthesize from fs metadata.
        let fs_meta = fs::metadata(data_path).await?;
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(Into::into)
            .unwrap_or_else(|_| Utc::now());
        Ok(ObjectMeta {
            key: key.clone(),
            size: fs_meta.len(),
            content_type: Some(guess_content_type(key).to_string()),
            modified,
            etag: None,
            metadata: BTreeMap::new(),
        })
    }

    /// Collect all data files under the objects subtree, depth-first.
    async fn collect_files(objects_root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![objects_root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }

    fn key_for(objects_root: &Path, path: &Path) -> Result<ObjectKey> {
        let relative = path
            .strip_prefix(objects_root)
            .map_err(|_| Error::Storage(format!("Path escapes root: {}", path.display())))?;
        let segments: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        ObjectKey::parse(&segments.join("/"))
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn state(&self) -> ConnectionState {
        *self.state.read().expect("state lock poisoned")
    }

    async fn connect(&self, config: serde_json::Value) -> Result<()> {
        let config: LocalConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("local provider config: {}", e)))?;
        if config.database.is_empty() {
            return Err(Error::Configuration(
                "local provider requires a non-empty 'database'".to_string(),
            ));
        }

        // Resolve the root before entering Connecting so configuration
        // failures leave the provider Disconnected.
        let root = match config.root {
            Some(root) => root.join(&config.database),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    Error::Configuration("no data directory available on this platform".to_string())
                })?
                .join("wasmpress")
                .join(&config.database),
        };

        self.set_state(ConnectionState::Connecting);

        if let Err(e) = fs::create_dir_all(root.join(OBJECTS_DIR)).await {
            self.set_state(ConnectionState::Error);
            return Err(e.into());
        }

        debug!(root = %root.display(), "local provider connected");
        *self.root.write().expect("root lock poisoned") = Some(root);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.root.write().expect("root lock poisoned") = None;
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        let root = self.root_dir()?;
        let data_path = Self::data_path(&root, key);

        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&data_path, &data).await?;

        let now = Utc::now();
        let meta = ObjectMeta {
            key: key.clone(),
            size: data.len() as u64,
            content_type: Some(guess_content_type(key).to_string()),
            modified: now,
            etag: Some(crc_etag(&data)),
            metadata: BTreeMap::new(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)?;
        let meta_path = Self::meta_path(&root, key);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&meta_path, meta_json).await?;

        Ok(UploadReceipt {
            key: key.clone(),
            size: data.len() as u64,
            hash: content_hash(&data),
            url: None,
            uploaded_at: now,
        })
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let root = self.root_dir()?;
        let data_path = Self::data_path(&root, key);

        match fs::read(&data_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        let root = self.root_dir()?;
        let data_path = Self::data_path(&root, key);

        match fs::remove_file(&data_path).await {
            Ok(()) => {
                let _ = fs::remove_file(Self::meta_path(&root, key)).await;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let root = self.root_dir()?;
        let objects_root = root.join(OBJECTS_DIR);
        let mut results = Vec::new();

        for path in Self::collect_files(&objects_root).await? {
            let key = Self::key_for(&objects_root, &path)?;
            if !key.starts_with(prefix) {
                continue;
            }
            results.push(Self::read_meta(&root, &key, &path).await?);
        }

        results.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(results)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        let root = self.root_dir()?;
        Ok(fs::try_exists(Self::data_path(&root, key)).await?)
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        let root = self.root_dir()?;
        let data_path = Self::data_path(&root, key);
        if !fs::try_exists(&data_path).await? {
            return Err(Error::NotFound(format!("Object not found: {}", key)));
        }
        Self::read_meta(&root, key, &data_path).await
    }
}

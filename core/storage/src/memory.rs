//! In-memory storage provider for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use wasmpress_common::{Error, ObjectKey, Result};

use crate::provider::{
    content_hash, crc_etag, guess_content_type, Capabilities, ConnectionState, ObjectMeta,
    ProviderKind, StorageProvider, UploadReceipt,
};

struct StoredObject {
    data: Vec<u8>,
    meta: ObjectMeta,
}

/// In-memory storage provider.
///
/// Useful for tests and as the reference implementation of the provider
/// contract. All data is lost on drop. `connect` accepts any configuration.
pub struct MemoryProvider {
    state: RwLock<ConnectionState>,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryProvider {
    /// Create a new empty, disconnected memory provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            objects: RwLock::new(HashMap::new()),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => Ok(()),
            _ => Err(Error::NotConnected("memory".to_string())),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
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

    async fn connect(&self, _config: serde_json::Value) -> Result<()> {
        *self.state.write().expect("state lock poisoned") = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.state.write().expect("state lock poisoned") = ConnectionState::Disconnected;
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        self.ensure_connected()?;

        let now = Utc::now();
        let hash = content_hash(&data);
        let meta = ObjectMeta {
            key: key.clone(),
            size: data.len() as u64,
            content_type: Some(guess_content_type(key).to_string()),
            modified: now,
            etag: Some(crc_etag(&data)),
            metadata: BTreeMap::new(),
        };
        let receipt = UploadReceipt {
            key: key.clone(),
            size: data.len() as u64,
            hash,
            url: None,
            uploaded_at: now,
        };

        self.objects
            .write()
            .expect("objects lock poisoned")
            .insert(key.as_str().to_string(), StoredObject { data, meta });

        Ok(receipt)
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let objects = self.objects.read().expect("objects lock poisoned");
        objects
            .get(key.as_str())
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", key)))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        self.ensure_connected()?;
        let removed = self
            .objects
            .write()
            .expect("objects lock poisoned")
            .remove(key.as_str())
            .is_some();
        Ok(removed)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.ensure_connected()?;
        let objects = self.objects.read().expect("objects lock poisoned");
        let mut results: Vec<ObjectMeta> = objects
            .values()
            .filter(|o| o.meta.key.starts_with(prefix))
            .map(|o| o.meta.clone())
            .collect();
        results.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(results)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self
            .objects
            .read()
            .expect("objects lock poisoned")
            .contains_key(key.as_str()))
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        self.ensure_connected()?;
        let objects = self.objects.read().expect("objects lock poisoned");
        objects
            .get(key.as_str())
            .map(|o| o.meta.clone())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", key)))
    }
}

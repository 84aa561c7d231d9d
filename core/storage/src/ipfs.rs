//! IPFS storage provider.
//!
//! Uploads go to an IPFS node's `/api/v0/add` endpoint; downloads come from
//! a public gateway by CID. IPFS has no notion of mutable keys, so the
//! provider keeps a session-scoped key-to-CID pin map: `exists`, `list`,
//! `metadata` and `download` answer from it. Objects are immutable; `delete`
//! resolves to `false` instead of erroring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use wasmpress_common::{Error, ObjectKey, Result};

use crate::provider::{
    guess_content_type, Capabilities, ConnectionState, ObjectMeta, ProviderKind, StorageProvider,
    UploadReceipt,
};

/// Connection configuration for the IPFS provider.
#[derive(Debug, Deserialize)]
struct IpfsConfig {
    /// Node API URL, e.g. `http://127.0.0.1:5001`.
    api_url: String,
    /// Gateway used for downloads.
    #[serde(default = "default_gateway")]
    gateway_url: String,
}

fn default_gateway() -> String {
    "https://ipfs.io".to_string()
}

/// Response of `/api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size")]
    size: String,
}

#[derive(Debug, Clone)]
struct PinEntry {
    cid: String,
    size: u64,
    content_type: String,
    added: DateTime<Utc>,
}

/// IPFS storage provider.
pub struct IpfsProvider {
    state: RwLock<ConnectionState>,
    config: RwLock<Option<IpfsConfig>>,
    pins: RwLock<HashMap<String, PinEntry>>,
    http: Client,
}

impl IpfsProvider {
    /// Create a new disconnected IPFS provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            config: RwLock::new(None),
            pins: RwLock::new(HashMap::new()),
            http: Client::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    fn with_config<T>(&self, f: impl FnOnce(&IpfsConfig) -> T) -> Result<T> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => {}
            _ => return Err(Error::NotConnected("ipfs".to_string())),
        }
        let config = self.config.read().expect("config lock poisoned");
        config
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::NotConnected("ipfs".to_string()))
    }

    fn gateway_url(config: &IpfsConfig, cid: &str) -> String {
        format!("{}/ipfs/{}", config.gateway_url.trim_end_matches('/'), cid)
    }

    fn pin_for(&self, key: &ObjectKey) -> Result<PinEntry> {
        self.pins
            .read()
            .expect("pins lock poisoned")
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No pinned object for key: {}", key)))
    }

    fn meta_from(key: &ObjectKey, pin: &PinEntry) -> ObjectMeta {
        let mut metadata = BTreeMap::new();
        metadata.insert("cid".to_string(), pin.cid.clone());
        ObjectMeta {
            key: key.clone(),
            size: pin.size,
            content_type: Some(pin.content_type.clone()),
            modified: pin.added,
            etag: Some(pin.cid.clone()),
            metadata,
        }
    }
}

impl Default for IpfsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for IpfsProvider {
    fn name(&self) -> &str {
        "ipfs"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Web3
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IMMUTABLE
    }

    fn state(&self) -> ConnectionState {
        *self.state.read().expect("state lock poisoned")
    }

    async fn connect(&self, config: serde_json::Value) -> Result<()> {
        let config: IpfsConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("ipfs provider config: {}", e)))?;
        Url::parse(&config.api_url)
            .map_err(|e| Error::Configuration(format!("ipfs api_url is not a valid URL: {}", e)))?;

        self.set_state(ConnectionState::Connecting);

        // Liveness check: node version.
        let url = format!("{}/api/v0/version", config.api_url.trim_end_matches('/'));
        let response = self.http.post(&url).send().await.map_err(|e| {
            self.set_state(ConnectionState::Error);
            Error::Network(format!("IPFS node unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            self.set_state(ConnectionState::Error);
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "IPFS version check failed: {} - {}",
                status, body
            )));
        }

        debug!(api = %config.api_url, "ipfs provider connected");
        *self.config.write().expect("config lock poisoned") = Some(config);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.config.write().expect("config lock poisoned") = None;
        self.pins.write().expect("pins lock poisoned").clear();
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        let size = data.len() as u64;
        let content_type = guess_content_type(key).to_string();

        let (url, gateway_base) = self.with_config(|c| {
            (
                format!("{}/api/v0/add", c.api_url.trim_end_matches('/')),
                c.gateway_url.clone(),
            )
        })?;

        let part = multipart::Part::bytes(data)
            .file_name(key.name().to_string())
            .mime_str(&content_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid content type: {}", e)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Network(format!("IPFS add failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "IPFS add failed: {} - {}",
                status, body
            )));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse add response: {}", e)))?;

        let now = Utc::now();
        let pin = PinEntry {
            cid: added.hash.clone(),
            size: added.size.parse().unwrap_or(size),
            content_type,
            added: now,
        };
        self.pins
            .write()
            .expect("pins lock poisoned")
            .insert(key.as_str().to_string(), pin);

        let public_url = format!("{}/ipfs/{}", gateway_base.trim_end_matches('/'), added.hash);
        Ok(UploadReceipt {
            key: key.clone(),
            size,
            hash: added.hash,
            url: Some(public_url),
            uploaded_at: now,
        })
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        self.with_config(|_| ())?;
        let pin = self.pin_for(key)?;
        let url = self.with_config(|c| Self::gateway_url(c, &pin.cid))?;

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Gateway fetch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!(
                "Gateway fetch failed for {}: {}",
                pin.cid, status
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read gateway body: {}", e)))
    }

    /// IPFS content is immutable; deletion is semantically impossible.
    /// Always resolves to `false`, by contract never an error.
    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        warn!(key = %key, "delete is not supported on ipfs; content is immutable");
        Ok(false)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.with_config(|_| ())?;
        let pins = self.pins.read().expect("pins lock poisoned");
        let mut results = Vec::new();
        for (key_str, pin) in pins.iter() {
            if key_str.starts_with(prefix) {
                let key = ObjectKey::parse(key_str)?;
                results.push(Self::meta_from(&key, pin));
            }
        }
        results.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(results)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        self.with_config(|_| ())?;
        Ok(self
            .pins
            .read()
            .expect("pins lock poisoned")
            .contains_key(key.as_str()))
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        self.with_config(|_| ())?;
        let pin = self.pin_for(key)?;
        Ok(Self::meta_from(key, &pin))
    }
}

//! Proprietary cloud object store provider.
//!
//! Bearer-token auth over a `/s3/buckets/<bucket>/objects/<key>` path
//! convention, with JSON listing responses. Payloads can optionally be
//! XOR-masked with a repeating key; this is *obfuscation only* and provides
//! no confidentiality whatsoever against anyone who can read the traffic or
//! the stored bytes. It exists for wire parity with deployments that enable
//! it, never as a security measure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::debug;
use url::Url;

use wasmpress_common::{Error, ObjectKey, Result};

use crate::provider::{
    content_hash, guess_content_type, Capabilities, ConnectionState, ObjectMeta, ProviderKind,
    SecretString, StorageProvider, UploadReceipt,
};

const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const DEFAULT_BASE_URL: &str = "https://api.wasmpress.cloud";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Connection configuration for the cloud provider.
#[derive(Debug, Deserialize)]
struct CloudConfig {
    api_key: SecretString,
    bucket: String,
    /// API base URL; defaults to the hosted service.
    #[serde(default = "default_base_url")]
    base_url: String,
    /// Optional XOR mask key; see module docs for why this is not encryption.
    #[serde(default)]
    obfuscation_key: Option<SecretString>,
}

/// Object entry in a JSON list response.
#[derive(Debug, Deserialize)]
struct CloudObject {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    etag: Option<String>,
}

/// Proprietary cloud object store provider.
pub struct CloudProvider {
    state: RwLock<ConnectionState>,
    config: RwLock<Option<CloudConfig>>,
    http: Client,
}

impl CloudProvider {
    /// Create a new disconnected cloud provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            config: RwLock::new(None),
            http: Client::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    fn with_config<T>(&self, f: impl FnOnce(&CloudConfig) -> T) -> Result<T> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => {}
            _ => return Err(Error::NotConnected("cloud".to_string())),
        }
        let config = self.config.read().expect("config lock poisoned");
        config
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::NotConnected("cloud".to_string()))
    }

    fn bucket_url(config: &CloudConfig) -> String {
        format!(
            "{}/s3/buckets/{}",
            config.base_url.trim_end_matches('/'),
            config.bucket
        )
    }

    fn object_url(config: &CloudConfig, key: &ObjectKey) -> String {
        format!(
            "{}/objects/{}",
            Self::bucket_url(config),
            utf8_percent_encode(key.as_str(), KEY_ENCODE_SET)
        )
    }

    fn bearer(config: &CloudConfig) -> String {
        format!("Bearer {}", config.api_key.expose())
    }

    /// Apply the repeating-key XOR mask. Symmetric: masking twice restores
    /// the input.
    fn mask(config: &CloudConfig, mut data: Vec<u8>) -> Vec<u8> {
        if let Some(mask_key) = &config.obfuscation_key {
            let mask = mask_key.expose().as_bytes();
            if !mask.is_empty() {
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte ^= mask[i % mask.len()];
                }
            }
        }
        data
    }

    async fn error_from(response: Response, context: &str) -> Error {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Error::NotFound(context.to_string()),
            StatusCode::UNAUTHORIZED => {
                Error::Authentication("Invalid or expired API key".to_string())
            }
            StatusCode::FORBIDDEN => Error::PermissionDenied(context.to_string()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Error::Network(format!("{}: {} - {}", context, status, body))
            }
        }
    }
}

impl Default for CloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for CloudProvider {
    fn name(&self) -> &str {
        "cloud"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            public_url: true,
            ..Capabilities::FULL
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.read().expect("state lock poisoned")
    }

    async fn connect(&self, config: serde_json::Value) -> Result<()> {
        let config: CloudConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("cloud provider config: {}", e)))?;
        Url::parse(&config.base_url)
            .map_err(|e| Error::Configuration(format!("cloud base_url is not a valid URL: {}", e)))?;
        if config.bucket.is_empty() {
            return Err(Error::Configuration(
                "cloud provider requires a non-empty 'bucket'".to_string(),
            ));
        }

        self.set_state(ConnectionState::Connecting);

        // Liveness check: bucket info.
        let response = self
            .http
            .get(Self::bucket_url(&config))
            .header(header::AUTHORIZATION, Self::bearer(&config))
            .send()
            .await
            .map_err(|e| {
                self.set_state(ConnectionState::Error);
                Error::Network(format!("Bucket info request failed: {}", e))
            })?;

        if !response.status().is_success() {
            self.set_state(ConnectionState::Error);
            return Err(Self::error_from(response, "Bucket info").await);
        }

        debug!(bucket = %config.bucket, "cloud provider connected");
        *self.config.write().expect("config lock poisoned") = Some(config);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.config.write().expect("config lock poisoned") = None;
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        let size = data.len() as u64;
        let hash = content_hash(&data);

        let (request, url) = self.with_config(|c| {
            let url = Self::object_url(c, key);
            let body = Self::mask(c, data);
            let request = self
                .http
                .put(&url)
                .header(header::AUTHORIZATION, Self::bearer(c))
                .header(header::CONTENT_TYPE, guess_content_type(key))
                .body(body);
            (request, url)
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Upload failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Upload").await);
        }

        Ok(UploadReceipt {
            key: key.clone(),
            size,
            hash,
            url: Some(url),
            uploaded_at: Utc::now(),
        })
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let request = self.with_config(|c| {
            self.http
                .get(Self::object_url(c, key))
                .header(header::AUTHORIZATION, Self::bearer(c))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Download {}", key)).await);
        }

        let data = response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read download body: {}", e)))?;

        self.with_config(|c| Self::mask(c, data))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        let request = self.with_config(|c| {
            self.http
                .delete(Self::object_url(c, key))
                .header(header::AUTHORIZATION, Self::bearer(c))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Delete failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(response, &format!("Delete {}", key)).await),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let request = self.with_config(|c| {
            let url = format!(
                "{}/objects?prefix={}",
                Self::bucket_url(c),
                utf8_percent_encode(prefix, KEY_ENCODE_SET)
            );
            self.http
                .get(url)
                .header(header::AUTHORIZATION, Self::bearer(c))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("List failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "List").await);
        }

        let objects: Vec<CloudObject> = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("Failed to parse list response: {}", e)))?;

        let mut results = Vec::with_capacity(objects.len());
        for object in objects {
            results.push(ObjectMeta {
                key: ObjectKey::parse(&object.key)?,
                size: object.size,
                content_type: object.content_type,
                modified: object.last_modified.unwrap_or_else(Utc::now),
                etag: object.etag,
                metadata: BTreeMap::new(),
            });
        }
        Ok(results)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        let request = self.with_config(|c| {
            self.http
                .head(Self::object_url(c, key))
                .header(header::AUTHORIZATION, Self::bearer(c))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Head failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(response, &format!("Head {}", key)).await),
        }
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        let request = self.with_config(|c| {
            self.http
                .head(Self::object_url(c, key))
                .header(header::AUTHORIZATION, Self::bearer(c))
        })?;

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("Head failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, &format!("Head {}", key)).await);
        }

        let headers = response.headers();
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let etag = headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        Ok(ObjectMeta {
            key: key.clone(),
            size,
            content_type,
            modified: Utc::now(),
            etag,
            metadata: BTreeMap::new(),
        })
    }
}

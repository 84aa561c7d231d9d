//! Storage provider trait definition.

use async_trait::async_trait;
use blake2::{Blake2s256, Digest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use wasmpress_common::{Error, ObjectKey, Result};

/// Broad category a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Data stays on this machine (memory, filesystem).
    Local,
    /// Conventional remote object store.
    Cloud,
    /// Content-addressed / permaweb storage.
    Web3,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Cloud => write!(f, "cloud"),
            ProviderKind::Web3 => write!(f, "web3"),
        }
    }
}

/// Connection lifecycle state of a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Static descriptor of what a backend supports.
///
/// Declared once per provider; callers consult this instead of probing
/// instances for methods at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub upload: bool,
    pub download: bool,
    /// False on immutable backends, where `delete` resolves to `false`.
    pub delete: bool,
    pub list: bool,
    pub exists: bool,
    pub metadata: bool,
    /// Whether uploads yield a publicly reachable URL.
    pub public_url: bool,
}

impl Capabilities {
    /// Full read/write capability set.
    pub const FULL: Self = Self {
        upload: true,
        download: true,
        delete: true,
        list: true,
        exists: true,
        metadata: true,
        public_url: false,
    };

    /// Capabilities of an immutable, content-addressed backend.
    pub const IMMUTABLE: Self = Self {
        upload: true,
        download: true,
        delete: false,
        list: true,
        exists: true,
        metadata: true,
        public_url: true,
    };
}

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Logical key of the object.
    pub key: ObjectKey,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, if the backend tracks one.
    pub content_type: Option<String>,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// ETag or content hash for change detection.
    pub etag: Option<String>,
    /// Backend-preserved string metadata (best effort).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Result descriptor returned by a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub key: ObjectKey,
    pub size: u64,
    /// Content hash (or backend identifier such as a CID/transaction id).
    pub hash: String,
    /// Public URL where the object can be fetched, if the backend has one.
    pub url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Representation requested for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Text,
    Bytes,
    Json,
}

/// Downloaded content in the caller-requested representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Content {
    /// Convert raw bytes into the requested representation.
    pub fn from_bytes(data: Vec<u8>, format: ContentFormat) -> Result<Self> {
        match format {
            ContentFormat::Bytes => Ok(Content::Bytes(data)),
            ContentFormat::Text => String::from_utf8(data)
                .map(Content::Text)
                .map_err(|e| Error::Serialization(format!("Content is not valid UTF-8: {}", e))),
            ContentFormat::Json => serde_json::from_slice(&data)
                .map(Content::Json)
                .map_err(|e| Error::Serialization(format!("Content is not valid JSON: {}", e))),
        }
    }
}

/// API keys and similar secrets, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for request signing.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

/// Storage provider trait implemented by every backend.
///
/// A provider is instantiated once at registration and stays registered for
/// the process lifetime; `connect` binds credentials and transitions the
/// connection state. Every data operation requires `Connected` state and
/// fails fast with [`Error::NotConnected`] otherwise.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Provider name, as used in the registry ("memory", "s3", ...).
    fn name(&self) -> &str;

    /// Backend category.
    fn kind(&self) -> ProviderKind;

    /// Static capability descriptor.
    fn capabilities(&self) -> Capabilities;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Validate configuration, perform a liveness check and bind credentials.
    ///
    /// # Preconditions
    /// - Required config keys are backend-specific and documented per
    ///   provider; missing keys yield [`Error::Configuration`] before any I/O
    ///
    /// # Postconditions
    /// - State is `Connected` on success, `Error` on failure
    ///
    /// # Errors
    /// - Configuration, network or authentication errors; never retried
    async fn connect(&self, config: serde_json::Value) -> Result<()>;

    /// Tear down the connection and drop credentials.
    async fn disconnect(&self) -> Result<()>;

    /// Upload data under the given key, overwriting any existing object.
    ///
    /// Concurrent uploads to the same key are not sequenced; last write wins.
    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt>;

    /// Download the complete object content.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if no object exists at the key
    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>>;

    /// Download in a caller-requested representation.
    async fn download_as(&self, key: &ObjectKey, format: ContentFormat) -> Result<Content> {
        let data = self.download(key).await?;
        Content::from_bytes(data, format)
    }

    /// Delete an object. Returns whether anything was removed.
    ///
    /// Immutable backends resolve to `Ok(false)` and log a warning instead
    /// of erroring, because deletion is semantically impossible there.
    async fn delete(&self, key: &ObjectKey) -> Result<bool>;

    /// List objects whose key starts with the given string prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Check whether an object exists at the key.
    async fn exists(&self, key: &ObjectKey) -> Result<bool>;

    /// Get metadata for an object.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if no object exists at the key
    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta>;
}

/// Blake2s content hash, hex-encoded.
pub(crate) fn content_hash(data: &[u8]) -> String {
    let digest = Blake2s256::digest(data);
    to_hex(&digest)
}

/// Cheap etag for local backends.
pub(crate) fn crc_etag(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Guess a MIME type from the key's file extension.
pub(crate) fn guess_content_type(key: &ObjectKey) -> &'static str {
    match key.name().rsplit('.').next() {
        Some("json") => "application/json",
        Some("txt") | Some("md") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("php") => "application/x-httpd-php",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

//! Arweave storage provider.
//!
//! Simplified transaction flow: uploads POST a JSON transaction (base64url
//! data plus content-type/path tags) to the gateway's `/tx` endpoint,
//! downloads GET the transaction data by id. Like IPFS, Arweave is
//! append-only: a session-scoped key-to-transaction map backs key lookups
//! and `delete` resolves to `false`.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use blake2::{Blake2s256, Digest};
use chrono::{DateTime, Utc};
use reqwest::Client;
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

/// Connection configuration for the Arweave provider.
#[derive(Debug, Deserialize)]
struct ArweaveConfig {
    /// Gateway base URL, e.g. `https://arweave.net`.
    gateway_url: String,
}

/// Subset of the gateway `/info` response used for the liveness check.
#[derive(Debug, Deserialize)]
struct GatewayInfo {
    network: String,
    height: u64,
}

#[derive(Debug, Clone)]
struct TxEntry {
    id: String,
    size: u64,
    content_type: String,
    posted: DateTime<Utc>,
}

/// Arweave storage provider.
pub struct ArweaveProvider {
    state: RwLock<ConnectionState>,
    config: RwLock<Option<ArweaveConfig>>,
    transactions: RwLock<HashMap<String, TxEntry>>,
    http: Client,
}

impl ArweaveProvider {
    /// Create a new disconnected Arweave provider.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            config: RwLock::new(None),
            transactions: RwLock::new(HashMap::new()),
            http: Client::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    fn gateway(&self) -> Result<String> {
        match *self.state.read().expect("state lock poisoned") {
            ConnectionState::Connected => {}
            _ => return Err(Error::NotConnected("arweave".to_string())),
        }
        let config = self.config.read().expect("config lock poisoned");
        config
            .as_ref()
            .map(|c| c.gateway_url.trim_end_matches('/').to_string())
            .ok_or_else(|| Error::NotConnected("arweave".to_string()))
    }

    /// Client-side transaction id: base64url of the data's Blake2s digest.
    fn transaction_id(data: &[u8]) -> String {
        let digest = Blake2s256::digest(data);
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn tx_for(&self, key: &ObjectKey) -> Result<TxEntry> {
        self.transactions
            .read()
            .expect("transactions lock poisoned")
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No transaction for key: {}", key)))
    }

    fn meta_from(key: &ObjectKey, tx: &TxEntry) -> ObjectMeta {
        let mut metadata = BTreeMap::new();
        metadata.insert("tx_id".to_string(), tx.id.clone());
        ObjectMeta {
            key: key.clone(),
            size: tx.size,
            content_type: Some(tx.content_type.clone()),
            modified: tx.posted,
            etag: Some(tx.id.clone()),
            metadata,
        }
    }
}

impl Default for ArweaveProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for ArweaveProvider {
    fn name(&self) -> &str {
        "arweave"
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
        let config: ArweaveConfig = serde_json::from_value(config)
            .map_err(|e| Error::Configuration(format!("arweave provider config: {}", e)))?;
        Url::parse(&config.gateway_url).map_err(|e| {
            Error::Configuration(format!("arweave gateway_url is not a valid URL: {}", e))
        })?;

        self.set_state(ConnectionState::Connecting);

        let url = format!("{}/info", config.gateway_url.trim_end_matches('/'));
        let response = self.http.get(&url).send().await.map_err(|e| {
            self.set_state(ConnectionState::Error);
            Error::Network(format!("Arweave gateway unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            self.set_state(ConnectionState::Error);
            let status = response.status();
            return Err(Error::Network(format!(
                "Arweave info request failed: {}",
                status
            )));
        }

        let info: GatewayInfo = response.json().await.map_err(|e| {
            self.set_state(ConnectionState::Error);
            Error::Network(format!("Failed to parse gateway info: {}", e))
        })?;
        debug!(network = %info.network, height = info.height, "arweave provider connected");

        *self.config.write().expect("config lock poisoned") = Some(config);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.config.write().expect("config lock poisoned") = None;
        self.transactions
            .write()
            .expect("transactions lock poisoned")
            .clear();
        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, data: Vec<u8>) -> Result<UploadReceipt> {
        let gateway = self.gateway()?;
        let size = data.len() as u64;
        let content_type = guess_content_type(key).to_string();
        let tx_id = Self::transaction_id(&data);

        let transaction = serde_json::json!({
            "id": tx_id,
            "data": URL_SAFE_NO_PAD.encode(&data),
            "tags": [
                { "name": "Content-Type", "value": content_type },
                { "name": "Path", "value": key.as_str() },
            ],
        });

        let response = self
            .http
            .post(format!("{}/tx", gateway))
            .json(&transaction)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Transaction post failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "Transaction post failed: {} - {}",
                status, body
            )));
        }

        let now = Utc::now();
        self.transactions
            .write()
            .expect("transactions lock poisoned")
            .insert(
                key.as_str().to_string(),
                TxEntry {
                    id: tx_id.clone(),
                    size,
                    content_type,
                    posted: now,
                },
            );

        Ok(UploadReceipt {
            key: key.clone(),
            size,
            hash: tx_id.clone(),
            url: Some(format!("{}/{}", gateway, tx_id)),
            uploaded_at: now,
        })
    }

    async fn download(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let gateway = self.gateway()?;
        let tx = self.tx_for(key)?;

        let response = self
            .http
            .get(format!("{}/{}", gateway, tx.id))
            .send()
            .await
            .map_err(|e| Error::Network(format!("Transaction fetch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!(
                "Transaction fetch failed for {}: {}",
                tx.id, status
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read transaction body: {}", e)))
    }

    /// Arweave is append-only; deletion is semantically impossible.
    /// Always resolves to `false`, by contract never an error.
    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        warn!(key = %key, "delete is not supported on arweave; transactions are permanent");
        Ok(false)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.gateway()?;
        let transactions = self.transactions.read().expect("transactions lock poisoned");
        let mut results = Vec::new();
        for (key_str, tx) in transactions.iter() {
            if key_str.starts_with(prefix) {
                let key = ObjectKey::parse(key_str)?;
                results.push(Self::meta_from(&key, tx));
            }
        }
        results.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(results)
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        self.gateway()?;
        Ok(self
            .transactions
            .read()
            .expect("transactions lock poisoned")
            .contains_key(key.as_str()))
    }

    async fn metadata(&self, key: &ObjectKey) -> Result<ObjectMeta> {
        self.gateway()?;
        let tx = self.tx_for(key)?;
        Ok(Self::meta_from(key, &tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_never_rejects() {
        let provider = ArweaveProvider::new();
        let key = ObjectKey::parse("a.txt").unwrap();
        assert_eq!(provider.delete(&key).await.unwrap(), false);
    }

    #[test]
    fn test_transaction_id_is_content_derived() {
        let a = ArweaveProvider::transaction_id(b"data");
        let b = ArweaveProvider::transaction_id(b"data");
        assert_eq!(a, b);
        assert_ne!(a, ArweaveProvider::transaction_id(b"other"));
        // base64url, no padding
        assert!(!a.contains('='));
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
    }

    #[tokio::test]
    async fn test_data_operations_fail_fast_when_disconnected() {
        let provider = ArweaveProvider::new();
        let key = ObjectKey::parse("a.txt").unwrap();

        assert!(matches!(
            provider.upload(&key, vec![1]).await,
            Err(Error::NotConnected(_))
        ));
        assert!(matches!(
            provider.metadata(&key).await,
            Err(Error::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_config() {
        let provider = ArweaveProvider::new();
        let result = provider
            .connect(serde_json::json!({"gateway_url": "not a url"}))
            .await;
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert_eq!(provider.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_liveness_check_sets_error_state() {
        // Port 1 is closed; the provider must land in Error, not stay
        // stuck in Connecting.
        let provider = ArweaveProvider::new();
        let result = provider
            .connect(serde_json::json!({"gateway_url": "http://127.0.0.1:1"}))
            .await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(provider.state(), ConnectionState::Error);
    }
}

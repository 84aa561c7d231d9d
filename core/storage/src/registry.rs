//! Provider registry: instance ownership, connection tracking, events.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use wasmpress_common::{Error, EventBus, ObjectKey, Result};

use crate::events::StorageEvent;
use crate::provider::{
    Capabilities, ConnectionState, ProviderKind, StorageProvider, UploadReceipt,
};

/// Constructor function for a provider instance.
pub type ProviderFactory = Box<dyn Fn() -> Arc<dyn StorageProvider> + Send + Sync>;

/// Metadata snapshot of a registered provider, safe to hand to UI layers.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub kind: ProviderKind,
    pub capabilities: Capabilities,
    pub state: ConnectionState,
}

/// Registry owning all provider instances.
///
/// An explicit context object: create one per application (or per test) and
/// pass it where needed; there is no process-wide registry. Providers are
/// instantiated once at registration; callers reference them by name and
/// never hold constructors themselves.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn StorageProvider>>,
    events: EventBus<StorageEvent>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            events: EventBus::new(),
        }
    }

    /// Register a provider under a name, instantiating it immediately.
    ///
    /// Registration is idempotent by name: registering the same name again
    /// replaces the previous instance (last registration wins).
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) {
        let name = name.into();
        if self.providers.contains_key(&name) {
            warn!(provider = %name, "re-registering provider, previous instance dropped");
        }
        debug!(provider = %name, "registering storage provider");
        self.providers.insert(name, factory());
    }

    /// Metadata snapshot of every registered provider.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut out: Vec<ProviderDescriptor> = self
            .providers
            .iter()
            .map(|(name, p)| ProviderDescriptor {
                name: name.clone(),
                kind: p.kind(),
                capabilities: p.capabilities(),
                state: p.state(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Get a provider instance by name.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if no provider is registered under the name
    pub fn get(&self, name: &str) -> Result<Arc<dyn StorageProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Provider '{}' is not registered", name)))
    }

    /// Whether a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Whether a provider is currently connected.
    pub fn is_connected(&self, name: &str) -> bool {
        self.providers
            .get(name)
            .map(|p| p.state() == ConnectionState::Connected)
            .unwrap_or(false)
    }

    /// Connect a provider and broadcast `ProviderConnected` on success.
    pub async fn connect(&self, name: &str, config: serde_json::Value) -> Result<()> {
        let provider = self.get(name)?;
        provider.connect(config).await?;
        self.events.publish(&StorageEvent::ProviderConnected {
            provider: name.to_string(),
        });
        Ok(())
    }

    /// Disconnect a provider and broadcast `ProviderDisconnected`.
    pub async fn disconnect(&self, name: &str) -> Result<()> {
        let provider = self.get(name)?;
        provider.disconnect().await?;
        self.events.publish(&StorageEvent::ProviderDisconnected {
            provider: name.to_string(),
        });
        Ok(())
    }

    /// Upload through a named provider, broadcasting upload lifecycle events.
    pub async fn upload_via(
        &self,
        name: &str,
        key: &ObjectKey,
        data: Vec<u8>,
    ) -> Result<UploadReceipt> {
        let provider = self.get(name)?;
        self.events.publish(&StorageEvent::UploadStarted {
            provider: name.to_string(),
            key: key.clone(),
            size: data.len() as u64,
        });

        match provider.upload(key, data).await {
            Ok(receipt) => {
                self.events.publish(&StorageEvent::UploadCompleted {
                    provider: name.to_string(),
                    receipt: receipt.clone(),
                });
                Ok(receipt)
            }
            Err(err) => {
                self.events.publish(&StorageEvent::UploadFailed {
                    provider: name.to_string(),
                    key: key.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// The registry's event bus.
    pub fn events(&self) -> &EventBus<StorageEvent> {
        &self.events
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with every built-in provider registered.
pub fn default_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.register("memory", Box::new(|| Arc::new(crate::memory::MemoryProvider::new())));
    registry.register("local", Box::new(|| Arc::new(crate::local::LocalProvider::new())));
    registry.register("s3", Box::new(|| Arc::new(crate::s3::S3Provider::new())));
    registry.register("cloud", Box::new(|| Arc::new(crate::cloud::CloudProvider::new())));
    registry.register("ipfs", Box::new(|| Arc::new(crate::ipfs::IpfsProvider::new())));
    registry.register("arweave", Box::new(|| Arc::new(crate::arweave::ArweaveProvider::new())));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory_factory() -> ProviderFactory {
        Box::new(|| Arc::new(MemoryProvider::new()))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        registry.register("mem", memory_factory());

        let provider = registry.get("mem").unwrap();
        assert_eq!(provider.name(), "memory");
        assert_eq!(provider.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ProviderRegistry::new();
        registry.register("mem", memory_factory());
        let first = registry.get("mem").unwrap();

        registry.register("mem", memory_factory());
        let second = registry.get("mem").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_get_unknown_fails() {
        let registry = ProviderRegistry::new();
        assert!(matches!(registry.get("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_descriptors_snapshot() {
        let registry = default_registry();
        let descriptors = registry.descriptors();

        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["arweave", "cloud", "ipfs", "local", "memory", "s3"]);

        for d in &descriptors {
            assert_eq!(d.state, ConnectionState::Disconnected);
        }

        let ipfs = descriptors.iter().find(|d| d.name == "ipfs").unwrap();
        assert_eq!(ipfs.kind, ProviderKind::Web3);
        assert!(!ipfs.capabilities.delete);
    }

    #[tokio::test]
    async fn test_connect_publishes_event() {
        let mut registry = ProviderRegistry::new();
        registry.register("mem", memory_factory());

        let connected = Arc::new(AtomicUsize::new(0));
        let connected_clone = connected.clone();
        registry.events().subscribe(move |event| {
            if matches!(event, StorageEvent::ProviderConnected { provider } if provider == "mem") {
                connected_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        registry.connect("mem", serde_json::json!({})).await.unwrap();
        assert!(registry.is_connected("mem"));
        assert_eq!(connected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_via_events() {
        let mut registry = ProviderRegistry::new();
        registry.register("mem", memory_factory());
        registry.connect("mem", serde_json::json!({})).await.unwrap();

        let log: Arc<std::sync::Mutex<Vec<&'static str>>> = Arc::default();
        let log_clone = log.clone();
        registry.events().subscribe(move |event| {
            let tag = match event {
                StorageEvent::UploadStarted { .. } => "started",
                StorageEvent::UploadCompleted { .. } => "completed",
                StorageEvent::UploadFailed { .. } => "failed",
                _ => return,
            };
            log_clone.lock().unwrap().push(tag);
        });

        let key = ObjectKey::parse("a.txt").unwrap();
        let receipt = registry.upload_via("mem", &key, b"hi".to_vec()).await.unwrap();
        assert_eq!(receipt.size, 2);
        assert_eq!(*log.lock().unwrap(), vec!["started", "completed"]);
    }

    #[tokio::test]
    async fn test_upload_via_disconnected_fails_with_event() {
        let mut registry = ProviderRegistry::new();
        registry.register("mem", memory_factory());

        let failed = Arc::new(AtomicUsize::new(0));
        let failed_clone = failed.clone();
        registry.events().subscribe(move |event| {
            if matches!(event, StorageEvent::UploadFailed { .. }) {
                failed_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        let key = ObjectKey::parse("a.txt").unwrap();
        let result = registry.upload_via("mem", &key, b"hi".to_vec()).await;
        assert!(matches!(result, Err(Error::NotConnected(_))));
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }
}

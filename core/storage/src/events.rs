//! Lifecycle events broadcast by the provider registry.

use wasmpress_common::ObjectKey;

use crate::provider::UploadReceipt;

/// Events published on the registry's bus.
#[derive(Debug, Clone)]
pub enum StorageEvent {
    ProviderConnected {
        provider: String,
    },
    ProviderDisconnected {
        provider: String,
    },
    UploadStarted {
        provider: String,
        key: ObjectKey,
        size: u64,
    },
    UploadCompleted {
        provider: String,
        receipt: UploadReceipt,
    },
    UploadFailed {
        provider: String,
        key: ObjectKey,
        error: String,
    },
}

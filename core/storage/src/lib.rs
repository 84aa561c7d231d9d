//! Storage provider abstraction for wasmpress.
//!
//! This module provides a trait-based interface for the storage backends a
//! builder project can be persisted to (in-memory, local filesystem,
//! S3-compatible object stores, a proprietary cloud object API, IPFS,
//! Arweave) and a provider registry that owns instances, tracks connection
//! state and broadcasts lifecycle events.
//!
//! # Design Principles
//! - Closed interface: every backend implements the same trait; what a
//!   backend can do is declared in a static capability descriptor, never
//!   probed at runtime
//! - Fail fast: data operations on a disconnected provider error out before
//!   any network I/O
//! - No hidden retries: network failures surface as errors carrying the
//!   HTTP status and body text, exactly once

pub mod arweave;
pub mod cloud;
pub mod events;
pub mod ipfs;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod s3;

pub use arweave::ArweaveProvider;
pub use cloud::CloudProvider;
pub use events::StorageEvent;
pub use ipfs::IpfsProvider;
pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{
    Capabilities, ConnectionState, Content, ContentFormat, ObjectMeta, ProviderKind,
    SecretString, StorageProvider, UploadReceipt,
};
pub use registry::{ProviderDescriptor, ProviderFactory, ProviderRegistry, default_registry};
pub use s3::S3Provider;

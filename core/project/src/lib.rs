//! WasmPress Project Persistence
//!
//! This crate persists builder projects and application settings, including:
//! - The project document model (component tree, theme, configuration)
//! - Schema versioning for forward-compatibility checks
//! - A project store writing JSON documents through any storage provider
//! - A JSON-file-backed settings store for small key/value state

pub mod model;
pub mod settings;
pub mod store;

// Re-export main types
pub use model::{ComponentNode, Project, SchemaVersion, Theme};
pub use settings::{SettingsStore, BUILDER_SETTINGS_KEY, LAST_PROJECT_KEY};
pub use store::ProjectStore;

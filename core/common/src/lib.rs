//! Common utilities and types shared across wasmpress modules.
//!
//! This module provides foundational types that are used throughout the
//! codebase, ensuring consistency and type safety.

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventBus, SubscriberId};
pub use types::{ObjectKey, ProjectId};

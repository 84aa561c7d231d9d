//! WasmPress Module Framework
//!
//! This crate provides the module system for WasmPress, including:
//! - Module descriptors with declared dependencies and async loaders
//! - A lifecycle state machine (registered, loading, active, error, disabled)
//! - Dependency-ordered loading with cycle detection
//! - Lifecycle events published on a typed event bus

pub mod framework;
pub mod module;

// Re-export main types
pub use framework::ModuleFramework;
pub use module::{ModuleDescriptor, ModuleEvent, ModuleLoader, ModuleState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Verify all main types are accessible
        let _framework = ModuleFramework::new();
        let _state = ModuleState::Registered;
    }
}

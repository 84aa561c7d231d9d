//! Module descriptors, lifecycle states, and lifecycle events.

use std::fmt;

use futures::future::BoxFuture;

use wasmpress_common::Result;

/// Async initialization routine run when a module is loaded.
pub type ModuleLoader = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Lifecycle state of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Known to the framework but not yet loaded.
    Registered,
    /// Loader is currently running.
    Loading,
    /// Loader completed successfully.
    Active,
    /// Loader failed; the error was reported through the event bus.
    Error,
    /// Manually disabled; load requests are refused.
    Disabled,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Registered => "registered",
            ModuleState::Loading => "loading",
            ModuleState::Active => "active",
            ModuleState::Error => "error",
            ModuleState::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

/// Static description of a module: identity, dependencies, and loader.
pub struct ModuleDescriptor {
    /// Unique module identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Identifiers of modules that must be active before this one loads.
    pub dependencies: Vec<String>,
    /// Async initialization routine.
    pub loader: ModuleLoader,
}

impl ModuleDescriptor {
    /// Create a descriptor with no dependencies and a no-op loader.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dependencies: Vec::new(),
            loader: Box::new(|| Box::pin(async { Ok(()) })),
        }
    }

    /// Declare a dependency on another module.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Set the loader run when the module is loaded.
    pub fn with_loader(
        mut self,
        loader: impl Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    ) -> Self {
        self.loader = Box::new(loader);
        self
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Lifecycle event published by the framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    /// A module was registered with the framework.
    Registered { id: String },
    /// A module's loader completed and the module is active.
    Loaded { id: String },
    /// A module's loader failed.
    Failed { id: String, message: String },
    /// A module was unloaded and returned to the registered state.
    Unloaded { id: String },
}

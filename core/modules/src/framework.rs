//! Module lifecycle orchestration with dependency-ordered loading.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use wasmpress_common::{Error, EventBus, Result};

use crate::module::{ModuleDescriptor, ModuleEvent, ModuleState};

struct ModuleEntry {
    descriptor: Arc<ModuleDescriptor>,
    state: ModuleState,
}

/// Central registry and lifecycle manager for modules.
///
/// Loading a module loads its declared dependencies first, recursively.
/// A dependency's loader resolves before the dependent's loader runs, and
/// a cycle in the declared dependencies is reported as
/// [`Error::DependencyCycle`] rather than looping.
pub struct ModuleFramework {
    // Lock is never held across an await; loader futures are taken out
    // of the map before being polled.
    modules: RwLock<HashMap<String, ModuleEntry>>,
    events: EventBus<ModuleEvent>,
}

impl ModuleFramework {
    pub fn new() -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            events: EventBus::new(),
        }
    }

    /// Event bus carrying lifecycle events.
    pub fn events(&self) -> &EventBus<ModuleEvent> {
        &self.events
    }

    /// Register a module. Re-registering an id replaces the descriptor and
    /// resets the module to `Registered`.
    pub fn register(&self, descriptor: ModuleDescriptor) {
        let id = descriptor.id.clone();
        {
            let mut modules = self.modules.write().expect("modules lock poisoned");
            modules.insert(
                id.clone(),
                ModuleEntry {
                    descriptor: Arc::new(descriptor),
                    state: ModuleState::Registered,
                },
            );
        }
        debug!(module = %id, "module registered");
        self.events.publish(&ModuleEvent::Registered { id });
    }

    /// Current lifecycle state, or `None` for an unknown id.
    pub fn state(&self, id: &str) -> Option<ModuleState> {
        let modules = self.modules.read().expect("modules lock poisoned");
        modules.get(id).map(|entry| entry.state)
    }

    /// All registered modules with their states, sorted by id.
    pub fn modules(&self) -> Vec<(String, ModuleState)> {
        let modules = self.modules.read().expect("modules lock poisoned");
        let mut out: Vec<(String, ModuleState)> = modules
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Load a module and everything it depends on.
    ///
    /// Already-active modules are not reloaded. A loader failure puts that
    /// module into the `Error` state, publishes a `Failed` event, and
    /// propagates the error; modules loaded earlier in the plan stay active.
    ///
    /// # Errors
    ///
    /// - [`Error::Module`] for an unknown or disabled module in the chain
    /// - [`Error::DependencyCycle`] naming the cycle path
    /// - the loader's own error on failure
    pub async fn load(&self, id: &str) -> Result<()> {
        let plan = {
            let modules = self.modules.read().expect("modules lock poisoned");
            let mut visiting = Vec::new();
            let mut order = Vec::new();
            Self::plan(&modules, id, &mut visiting, &mut order)?;
            order
        };

        for module_id in plan {
            let (descriptor, skip) = {
                let mut modules = self.modules.write().expect("modules lock poisoned");
                let entry = modules
                    .get_mut(&module_id)
                    .ok_or_else(|| Error::Module(format!("unknown module '{}'", module_id)))?;
                if entry.state == ModuleState::Active {
                    (Arc::clone(&entry.descriptor), true)
                } else {
                    entry.state = ModuleState::Loading;
                    (Arc::clone(&entry.descriptor), false)
                }
            };
            if skip {
                continue;
            }

            debug!(module = %module_id, "loading module");
            let result = (descriptor.loader)().await;
            match result {
                Ok(()) => {
                    self.set_state(&module_id, ModuleState::Active);
                    debug!(module = %module_id, "module active");
                    self.events.publish(&ModuleEvent::Loaded {
                        id: module_id.clone(),
                    });
                }
                Err(e) => {
                    self.set_state(&module_id, ModuleState::Error);
                    warn!(module = %module_id, error = %e, "module loader failed");
                    self.events.publish(&ModuleEvent::Failed {
                        id: module_id.clone(),
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Unload an active module.
    ///
    /// Returns `Ok(false)` without touching any state while another active
    /// module lists `id` as a dependency, or when the module is not active.
    /// Otherwise the module returns to `Registered` and an `Unloaded` event
    /// is published.
    pub fn unload(&self, id: &str) -> Result<bool> {
        {
            let mut modules = self.modules.write().expect("modules lock poisoned");
            let entry = modules
                .get(id)
                .ok_or_else(|| Error::Module(format!("unknown module '{}'", id)))?;
            if entry.state != ModuleState::Active {
                return Ok(false);
            }
            let dependents: Vec<&str> = modules
                .values()
                .filter(|other| {
                    other.state == ModuleState::Active
                        && other.descriptor.dependencies.iter().any(|d| d == id)
                })
                .map(|other| other.descriptor.id.as_str())
                .collect();
            if !dependents.is_empty() {
                debug!(module = %id, dependents = ?dependents, "unload refused");
                return Ok(false);
            }
            if let Some(entry) = modules.get_mut(id) {
                entry.state = ModuleState::Registered;
            }
        }
        debug!(module = %id, "module unloaded");
        self.events.publish(&ModuleEvent::Unloaded { id: id.to_string() });
        Ok(true)
    }

    /// Disable a module so load requests are refused.
    ///
    /// An active module is unloaded first; if the unload is refused because
    /// active modules still depend on it, disabling fails.
    pub fn disable(&self, id: &str) -> Result<()> {
        if self.state(id) == Some(ModuleState::Active) && !self.unload(id)? {
            return Err(Error::Module(format!(
                "cannot disable '{}': active modules depend on it",
                id
            )));
        }
        let mut modules = self.modules.write().expect("modules lock poisoned");
        let entry = modules
            .get_mut(id)
            .ok_or_else(|| Error::Module(format!("unknown module '{}'", id)))?;
        entry.state = ModuleState::Disabled;
        Ok(())
    }

    /// Re-enable a disabled module, returning it to `Registered`.
    pub fn enable(&self, id: &str) -> Result<()> {
        let mut modules = self.modules.write().expect("modules lock poisoned");
        let entry = modules
            .get_mut(id)
            .ok_or_else(|| Error::Module(format!("unknown module '{}'", id)))?;
        if entry.state == ModuleState::Disabled {
            entry.state = ModuleState::Registered;
        }
        Ok(())
    }

    fn set_state(&self, id: &str, state: ModuleState) {
        let mut modules = self.modules.write().expect("modules lock poisoned");
        if let Some(entry) = modules.get_mut(id) {
            entry.state = state;
        }
    }

    // Post-order walk of the dependency graph. `visiting` holds the path
    // from the load root to the current module, so a revisit means a cycle.
    fn plan(
        modules: &HashMap<String, ModuleEntry>,
        id: &str,
        visiting: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if order.iter().any(|m| m == id) {
            return Ok(());
        }
        let entry = modules
            .get(id)
            .ok_or_else(|| Error::Module(format!("unknown module '{}'", id)))?;
        match entry.state {
            ModuleState::Active => return Ok(()),
            ModuleState::Disabled => {
                return Err(Error::Module(format!("module '{}' is disabled", id)));
            }
            _ => {}
        }
        if let Some(start) = visiting.iter().position(|m| m == id) {
            let mut path: Vec<&str> = visiting[start..].iter().map(String::as_str).collect();
            path.push(id);
            return Err(Error::DependencyCycle(path.join(" -> ")));
        }
        visiting.push(id.to_string());
        for dep in &entry.descriptor.dependencies {
            Self::plan(modules, dep, visiting, order)?;
        }
        visiting.pop();
        order.push(id.to_string());
        Ok(())
    }
}

impl Default for ModuleFramework {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_module(
        id: &str,
        deps: &[&str],
        log: Arc<Mutex<Vec<String>>>,
    ) -> ModuleDescriptor {
        let mut desc = ModuleDescriptor::new(id, id);
        for dep in deps {
            desc = desc.with_dependency(*dep);
        }
        let id = id.to_string();
        desc.with_loader(move || {
            let log = Arc::clone(&log);
            let id = id.clone();
            Box::pin(async move {
                log.lock().unwrap().push(id);
                Ok(())
            })
        })
    }

    fn capture_events(framework: &ModuleFramework) -> Arc<Mutex<Vec<ModuleEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        framework.events().subscribe(move |event: &ModuleEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        events
    }

    #[tokio::test]
    async fn test_dependency_loads_before_dependent() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));

        framework.load("b").await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(framework.state("a"), Some(ModuleState::Active));
        assert_eq!(framework.state("b"), Some(ModuleState::Active));
    }

    #[tokio::test]
    async fn test_active_module_not_reloaded() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));

        framework.load("a").await.unwrap();
        framework.load("a").await.unwrap();

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &["b"], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));

        let err = framework.load("a").await.unwrap_err();
        match err {
            Error::DependencyCycle(path) => {
                assert!(path.contains("a"));
                assert!(path.contains("b"));
            }
            other => panic!("expected DependencyCycle, got {:?}", other),
        }
        // Nothing was loaded.
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(framework.state("a"), Some(ModuleState::Registered));
    }

    #[tokio::test]
    async fn test_self_cycle_is_detected() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &["a"], Arc::clone(&log)));

        assert!(matches!(
            framework.load("a").await,
            Err(Error::DependencyCycle(_))
        ));
    }

    #[tokio::test]
    async fn test_loader_failure_sets_error_state() {
        let framework = ModuleFramework::new();
        let events = capture_events(&framework);
        framework.register(ModuleDescriptor::new("broken", "Broken").with_loader(|| {
            Box::pin(async { Err(Error::Module("init failed".to_string())) })
        }));

        assert!(framework.load("broken").await.is_err());
        assert_eq!(framework.state("broken"), Some(ModuleState::Error));

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            ModuleEvent::Failed { id, .. } if id == "broken"
        )));
    }

    #[tokio::test]
    async fn test_dependency_failure_stops_dependent() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(ModuleDescriptor::new("base", "Base").with_loader(|| {
            Box::pin(async { Err(Error::Module("boom".to_string())) })
        }));
        framework.register(recording_module("app", &["base"], Arc::clone(&log)));

        assert!(framework.load("app").await.is_err());
        assert_eq!(framework.state("base"), Some(ModuleState::Error));
        assert_eq!(framework.state("app"), Some(ModuleState::Registered));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unload_refused_with_active_dependent() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));
        framework.load("b").await.unwrap();

        assert!(!framework.unload("a").unwrap());
        assert_eq!(framework.state("a"), Some(ModuleState::Active));
        assert_eq!(framework.state("b"), Some(ModuleState::Active));
    }

    #[tokio::test]
    async fn test_unload_after_dependent_unloads() {
        let framework = ModuleFramework::new();
        let events = capture_events(&framework);
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));
        framework.load("b").await.unwrap();

        assert!(framework.unload("b").unwrap());
        assert!(framework.unload("a").unwrap());
        assert_eq!(framework.state("a"), Some(ModuleState::Registered));

        let events = events.lock().unwrap();
        let unloaded: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ModuleEvent::Unloaded { id } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(unloaded, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unload_inactive_module_is_noop() {
        let framework = ModuleFramework::new();
        framework.register(ModuleDescriptor::new("a", "A"));
        assert!(!framework.unload("a").unwrap());
        assert_eq!(framework.state("a"), Some(ModuleState::Registered));
    }

    #[tokio::test]
    async fn test_disabled_module_refuses_load() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.disable("a").unwrap();

        assert!(matches!(framework.load("a").await, Err(Error::Module(_))));
        assert_eq!(framework.state("a"), Some(ModuleState::Disabled));

        framework.enable("a").unwrap();
        framework.load("a").await.unwrap();
        assert_eq!(framework.state("a"), Some(ModuleState::Active));
    }

    #[tokio::test]
    async fn test_disabled_dependency_refuses_load() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));
        framework.disable("a").unwrap();

        assert!(framework.load("b").await.is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disable_active_with_dependents_fails() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("a", &[], Arc::clone(&log)));
        framework.register(recording_module("b", &["a"], Arc::clone(&log)));
        framework.load("b").await.unwrap();

        assert!(framework.disable("a").is_err());
        assert_eq!(framework.state("a"), Some(ModuleState::Active));
    }

    #[tokio::test]
    async fn test_register_publishes_event() {
        let framework = ModuleFramework::new();
        let events = capture_events(&framework);
        framework.register(ModuleDescriptor::new("a", "A"));

        let events = events.lock().unwrap();
        assert_eq!(
            events.as_slice(),
            &[ModuleEvent::Registered {
                id: "a".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_load_unknown_module() {
        let framework = ModuleFramework::new();
        assert!(matches!(
            framework.load("missing").await,
            Err(Error::Module(_))
        ));
    }

    #[tokio::test]
    async fn test_diamond_dependency_loads_once() {
        let framework = ModuleFramework::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        framework.register(recording_module("base", &[], Arc::clone(&log)));
        framework.register(recording_module("left", &["base"], Arc::clone(&log)));
        framework.register(recording_module("right", &["base"], Arc::clone(&log)));
        framework.register(recording_module(
            "top",
            &["left", "right"],
            Arc::clone(&log),
        ));

        framework.load("top").await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], "base");
        assert_eq!(log[3], "top");
    }
}

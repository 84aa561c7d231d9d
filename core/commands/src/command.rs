//! Command definition.

use std::fmt;
use std::sync::Arc;

use wasmpress_common::Result;

/// Action executed when a command is invoked.
pub type CommandAction = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// An invocable palette entry.
#[derive(Clone)]
pub struct Command {
    /// Stable identifier, unique within a registry.
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Extra search terms beyond name and description.
    pub keywords: Vec<String>,
    /// UI contexts this command is visible in; empty means everywhere.
    pub contexts: Vec<String>,
    /// Id of the module that registered the command, if any.
    pub module: Option<String>,
    pub shortcut: Option<String>,
    pub icon: Option<String>,
    pub action: CommandAction,
}

impl Command {
    /// Create a command with the given id and display name.
    ///
    /// Everything else starts empty; chain the builder methods to fill it
    /// in. The default action is a no-op.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            keywords: Vec::new(),
            contexts: Vec::new(),
            module: None,
            shortcut: None,
            icon: None,
            action: Arc::new(|| Ok(())),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts = contexts.into_iter().map(Into::into).collect();
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn shortcut(mut self, shortcut: impl Into<String>) -> Self {
        self.shortcut = Some(shortcut.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.action = Arc::new(action);
        self
    }

    /// Whether this command is visible in the given UI context.
    pub fn visible_in(&self, context: &str) -> bool {
        self.contexts.is_empty() || self.contexts.iter().any(|c| c == context)
    }

    /// Run the command's action.
    pub fn execute(&self) -> Result<()> {
        (self.action)()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}

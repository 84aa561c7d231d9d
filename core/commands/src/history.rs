//! Execution history and favorites.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use wasmpress_common::{Error, Result};

/// Settings-store key under which the history list is persisted.
pub const HISTORY_KEY: &str = "cmdPalette_history";
/// Settings-store key under which the favorites counters are persisted.
pub const FAVORITES_KEY: &str = "cmdPalette_favorites";

/// Maximum number of retained history entries.
const HISTORY_LIMIT: usize = 20;

/// Per-user command usage: a capped most-recent-first history list plus
/// per-command execution counters ("favorites").
///
/// The serialized shapes match what the original wrote to browser storage:
/// history is a JSON array of ids, favorites a JSON object of id to count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandUsage {
    history: Vec<String>,
    favorites: HashMap<String, u32>,
}

impl CommandUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution: the id moves to the front of the history
    /// (deduplicated, capped at 20) and its favorite counter increments.
    pub fn record_execution(&mut self, id: &str) {
        self.history.retain(|h| h != id);
        self.history.insert(0, id.to_string());
        self.history.truncate(HISTORY_LIMIT);

        *self.favorites.entry(id.to_string()).or_insert(0) += 1;
    }

    /// History ids, most recent first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// The `count` most recent ids.
    pub fn recent(&self, count: usize) -> Vec<&str> {
        self.history.iter().take(count).map(String::as_str).collect()
    }

    /// The `count` most frequently executed ids, ties broken by id for
    /// deterministic ordering.
    pub fn top_favorites(&self, count: usize) -> Vec<&str> {
        let mut entries: Vec<(&str, u32)> = self
            .favorites
            .iter()
            .map(|(id, n)| (id.as_str(), *n))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().take(count).map(|(id, _)| id).collect()
    }

    /// Execution count for an id.
    pub fn frequency(&self, id: &str) -> u32 {
        self.favorites.get(id).copied().unwrap_or(0)
    }

    /// Serialize to the two persisted JSON values (history, favorites).
    pub fn to_values(&self) -> Result<(serde_json::Value, serde_json::Value)> {
        Ok((
            serde_json::to_value(&self.history)?,
            serde_json::to_value(&self.favorites)?,
        ))
    }

    /// Rebuild from the two persisted JSON values. Missing values yield the
    /// empty state; malformed values are an error.
    pub fn from_values(
        history: Option<serde_json::Value>,
        favorites: Option<serde_json::Value>,
    ) -> Result<Self> {
        let history: Vec<String> = match history {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Serialization(format!("command history: {}", e)))?,
            None => Vec::new(),
        };
        let favorites: HashMap<String, u32> = match favorites {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| Error::Serialization(format!("command favorites: {}", e)))?,
            None => HashMap::new(),
        };
        let mut usage = Self { history, favorites };
        usage.history.truncate(HISTORY_LIMIT);
        Ok(usage)
    }
}

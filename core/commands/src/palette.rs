//! Command registry with palette search.

use tracing::debug;

use crate::command::Command;
use crate::history::CommandUsage;
use crate::score::score_command;

/// Default result-list truncation.
const DEFAULT_MAX_RESULTS: usize = 10;
/// How many favorites / recents lead the zero-query view.
const TOP_FAVORITES: usize = 5;
const TOP_RECENTS: usize = 5;

/// Registry of palette commands, scoped to a UI context.
///
/// An explicit context object: the application owns one (tests own their
/// own), commands are registered into it, and `search` ranks them against
/// the active context and query.
pub struct CommandRegistry {
    commands: Vec<Command>,
    context: String,
    max_results: usize,
}

impl CommandRegistry {
    /// Create an empty registry with the default context `"global"`.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            context: "global".to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Override the result-list cap.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Register a command. Registration is idempotent by id: registering an
    /// id again replaces the previous command (last registration wins).
    pub fn register(&mut self, command: Command) {
        if let Some(existing) = self.commands.iter_mut().find(|c| c.id == command.id) {
            debug!(id = %command.id, "replacing registered command");
            *existing = command;
        } else {
            self.commands.push(command);
        }
    }

    /// Remove a command by id. Returns whether anything was removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.commands.len();
        self.commands.retain(|c| c.id != id);
        self.commands.len() != before
    }

    /// Look up a command by id.
    pub fn get(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Set the active UI context used to filter visibility.
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    /// Search commands visible in the active context.
    ///
    /// Two filter shorthands: a leading `#` restricts to a category, a
    /// leading `@` restricts to the registering module's id; the remainder
    /// after the first space (if any) is the query within that subset.
    /// Results are sorted by descending score (stable: registration order
    /// breaks ties) and truncated to the configured maximum.
    pub fn search(&self, query: &str) -> Vec<&Command> {
        self.search_scored(query)
            .into_iter()
            .map(|(command, _)| command)
            .collect()
    }

    /// Like [`search`], returning the score per hit.
    ///
    /// [`search`]: CommandRegistry::search
    pub fn search_scored(&self, query: &str) -> Vec<(&Command, f32)> {
        let query = query.trim();
        let (filter, query) = parse_shorthand(query);

        let mut hits: Vec<(&Command, f32)> = self
            .commands
            .iter()
            .filter(|c| c.visible_in(&self.context))
            .filter(|c| match &filter {
                Shorthand::Category(cat) => c.category.eq_ignore_ascii_case(cat),
                Shorthand::Module(module) => {
                    c.module.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(module))
                }
                Shorthand::None => true,
            })
            .filter_map(|c| {
                let score = score_command(c, query);
                (score > 0.0).then_some((c, score))
            })
            .collect();

        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(self.max_results);
        hits
    }

    /// Zero-query "top commands" view: favorites first (top 5 by
    /// frequency), then recents (top 5), then commands declaring the active
    /// context, then filler, deduplicated and capped at the result limit.
    pub fn top_commands(&self, usage: &CommandUsage) -> Vec<&Command> {
        let mut candidates: Vec<&Command> = Vec::new();
        for id in usage.top_favorites(TOP_FAVORITES) {
            if let Some(command) = self.get(id) {
                candidates.push(command);
            }
        }
        for id in usage.recent(TOP_RECENTS) {
            if let Some(command) = self.get(id) {
                candidates.push(command);
            }
        }
        for command in &self.commands {
            if command.contexts.iter().any(|c| c == &self.context) {
                candidates.push(command);
            }
        }
        candidates.extend(self.commands.iter());

        let mut out: Vec<&Command> = Vec::new();
        for command in candidates {
            if out.len() >= self.max_results {
                break;
            }
            if !command.visible_in(&self.context) {
                continue;
            }
            if out.iter().any(|c| c.id == command.id) {
                continue;
            }
            out.push(command);
        }
        out
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

enum Shorthand {
    None,
    Category(String),
    Module(String),
}

/// Split a leading `#category` or `@module` token off the query.
fn parse_shorthand(query: &str) -> (Shorthand, &str) {
    let Some(first) = query.chars().next() else {
        return (Shorthand::None, query);
    };
    if first != '#' && first != '@' {
        return (Shorthand::None, query);
    }

    let (token, rest) = match query.find(char::is_whitespace) {
        Some(index) => (&query[1..index], query[index..].trim_start()),
        None => (&query[1..], ""),
    };
    if token.is_empty() {
        return (Shorthand::None, rest);
    }

    match first {
        '#' => (Shorthand::Category(token.to_string()), rest),
        _ => (Shorthand::Module(token.to_string()), rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(
            Command::new("save", "Save Project")
                .description("Persist the current project")
                .category("project")
                .module("builder"),
        );
        registry.register(
            Command::new("open", "Open Project")
                .description("Load a project from storage")
                .category("project")
                .module("builder"),
        );
        registry.register(
            Command::new("connect-s3", "Connect S3 Storage")
                .description("Connect the S3 provider")
                .category("storage")
                .module("storage"),
        );
        registry.register(
            Command::new("preview-only", "Toggle Device Frame")
                .category("view")
                .contexts(["preview"]),
        );
        registry
    }

    #[test]
    fn test_register_last_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("x", "First"));
        registry.register(Command::new("x", "Second"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().name, "Second");
    }

    #[test]
    fn test_search_ranks_by_score() {
        let registry = registry();
        let hits = registry.search_scored("save project");

        // Exact name match outranks everything else.
        assert_eq!(hits[0].0.id, "save");
        assert_eq!(hits[0].1, 100.0);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_search_filters_by_context() {
        let mut registry = registry();
        assert!(registry.search("toggle").is_empty());

        registry.set_context("preview");
        let hits = registry.search("toggle");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "preview-only");
    }

    #[test]
    fn test_category_shorthand() {
        let registry = registry();
        let hits = registry.search("#storage");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "connect-s3");

        // Trailing query searches within the category.
        let hits = registry.search("#project open");
        assert_eq!(hits[0].id, "open");
        assert!(hits.iter().all(|c| c.category == "project"));
    }

    #[test]
    fn test_module_shorthand() {
        let registry = registry();
        let hits = registry.search("@storage");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "connect-s3");
    }

    #[test]
    fn test_empty_query_matches_all_visible() {
        let registry = registry();
        // "preview-only" is filtered out by context; the rest match with 1.
        let hits = registry.search_scored("");
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|(_, s)| *s == 1.0));
    }

    #[test]
    fn test_results_are_truncated() {
        let mut registry = CommandRegistry::new().with_max_results(3);
        for i in 0..10 {
            registry.register(Command::new(format!("cmd-{}", i), format!("Command {}", i)));
        }
        assert_eq!(registry.search("command").len(), 3);
    }

    #[test]
    fn test_top_commands_merge_order() {
        let mut registry = registry();
        registry.set_context("preview");

        let mut usage = CommandUsage::new();
        usage.record_execution("open");
        usage.record_execution("save");
        usage.record_execution("open");

        let top = registry.top_commands(&usage);
        let ids: Vec<&str> = top.iter().map(|c| c.id.as_str()).collect();

        // Favorites by frequency (open twice, save once), then recents are
        // already covered, then the context-declaring command, then filler.
        assert_eq!(ids, vec!["open", "save", "preview-only", "connect-s3"]);
    }

    #[test]
    fn test_top_commands_capped() {
        let mut registry = CommandRegistry::new().with_max_results(4);
        for i in 0..10 {
            registry.register(Command::new(format!("cmd-{}", i), format!("Command {}", i)));
        }
        let usage = CommandUsage::new();
        assert_eq!(registry.top_commands(&usage).len(), 4);
    }

    #[test]
    fn test_unregister() {
        let mut registry = registry();
        assert!(registry.unregister("save"));
        assert!(!registry.unregister("save"));
        assert!(registry.get("save").is_none());
    }
}

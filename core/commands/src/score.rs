//! Palette ranking algorithm.
//!
//! The score tiers are a fixed contract (history entries and UI snapshots
//! depend on stable ordering): exact name 100, name prefix 90, exact
//! keyword 85, name substring 80, description substring 70, multi-word
//! partial at most 60, ordered-subsequence fuzzy at most 30, no match 0.
//! The empty query matches everything with score 1.

use crate::command::Command;

/// Per-word weights for multi-word partial matching.
const NAME_WORD_WEIGHT: f32 = 1.0;
const KEYWORD_WORD_WEIGHT: f32 = 0.7;
const DESCRIPTION_WORD_WEIGHT: f32 = 0.5;

/// Score a command against a query. Deterministic; higher is better.
pub fn score_command(command: &Command, query: &str) -> f32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 1.0;
    }

    let name = command.name.to_lowercase();
    let description = command.description.to_lowercase();

    if name == query {
        return 100.0;
    }
    if name.starts_with(&query) {
        return 90.0;
    }
    if command.keywords.iter().any(|k| k.to_lowercase() == query) {
        return 85.0;
    }
    if name.contains(&query) {
        return 80.0;
    }
    if !description.is_empty() && description.contains(&query) {
        return 70.0;
    }

    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() > 1 {
        let keywords: Vec<String> = command.keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut matched_weight = 0.0;
        for word in &words {
            matched_weight += if name.contains(word) {
                NAME_WORD_WEIGHT
            } else if keywords.iter().any(|k| k.contains(word)) {
                KEYWORD_WORD_WEIGHT
            } else if description.contains(word) {
                DESCRIPTION_WORD_WEIGHT
            } else {
                0.0
            };
        }
        if matched_weight > 0.0 {
            return 60.0 * matched_weight / words.len() as f32;
        }
    }

    fuzzy_score(&name, &query)
}

/// Ordered-subsequence match: each query character must appear in the name
/// at a strictly increasing position. Unmatched characters are skipped and
/// simply do not count.
fn fuzzy_score(name: &str, query: &str) -> f32 {
    let name_chars: Vec<char> = name.chars().collect();
    let query_len = query.chars().count();
    let mut position = 0;
    let mut matched = 0usize;

    for ch in query.chars() {
        if let Some(offset) = name_chars[position..].iter().position(|&c| c == ch) {
            position += offset + 1;
            matched += 1;
        }
    }

    if matched == 0 {
        return 0.0;
    }
    30.0 * matched as f32 / query_len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        Command::new("save-project", "Save Project")
            .description("Persist the current project to storage")
            .category("project")
            .keywords(["persist", "write", "store"])
    }

    #[test]
    fn test_empty_query_scores_one() {
        assert_eq!(score_command(&command(), ""), 1.0);
        assert_eq!(score_command(&command(), "   "), 1.0);
        assert_eq!(score_command(&Command::new("x", "X"), ""), 1.0);
    }

    #[test]
    fn test_exact_name_match() {
        assert_eq!(score_command(&command(), "save project"), 100.0);
        assert_eq!(score_command(&command(), "SAVE PROJECT"), 100.0);
    }

    #[test]
    fn test_prefix_match() {
        assert_eq!(score_command(&command(), "save"), 90.0);
        assert_eq!(score_command(&command(), "sav"), 90.0);
    }

    #[test]
    fn test_exact_keyword_match() {
        assert_eq!(score_command(&command(), "persist"), 85.0);
    }

    #[test]
    fn test_name_substring() {
        assert_eq!(score_command(&command(), "project"), 80.0);
        assert_eq!(score_command(&command(), "ve pro"), 80.0);
    }

    #[test]
    fn test_description_substring() {
        assert_eq!(score_command(&command(), "current"), 70.0);
        assert_eq!(score_command(&command(), "storage"), 70.0);
    }

    #[test]
    fn test_multi_word_partial() {
        // "save" hits the name (1.0), "storage" hits the description (0.5):
        // 60 * 1.5 / 2 = 45.
        let score = score_command(&command(), "save storage");
        assert!((score - 45.0).abs() < 1e-5);

        // "save" name (1.0), "store" keyword (0.7): 60 * 1.7 / 2 = 51.
        let score = score_command(&command(), "save store");
        assert!((score - 51.0).abs() < 1e-5);
    }

    #[test]
    fn test_multi_word_never_exceeds_sixty() {
        let score = score_command(&command(), "save project now"); // capped by unmatched word
        assert!(score <= 60.0);
    }

    #[test]
    fn test_fuzzy_subsequence() {
        // s, v, p, t all appear in order in "save project".
        let score = score_command(&command(), "svpt");
        assert_eq!(score, 30.0);

        // Half of "szpz" matches ('s', 'p').
        let score = score_command(&command(), "szpz");
        assert!((score - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_fuzzy_requires_increasing_positions() {
        // "ps" needs a 'p' before an 's': in "save project" the only 'p' sits
        // after the final 's', so just one character matches.
        let cmd = Command::new("x", "save project");
        let score = score_command(&cmd, "ps");
        assert!((score - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_no_match_scores_zero() {
        assert_eq!(score_command(&command(), "zzzz"), 0.0);
    }

    #[test]
    fn test_tier_ordering_invariant() {
        let cmd = command();
        let exact = score_command(&cmd, "save project");
        let prefix = score_command(&cmd, "save");
        let keyword = score_command(&cmd, "persist");
        let name_sub = score_command(&cmd, "project");
        let desc_sub = score_command(&cmd, "current");
        let multi = score_command(&cmd, "save storage");
        let fuzzy = score_command(&cmd, "svpt");
        let none = score_command(&cmd, "qqqq");

        assert!(exact > prefix);
        assert!(prefix > keyword);
        assert!(keyword > name_sub);
        assert!(name_sub > desc_sub);
        assert!(desc_sub > multi);
        assert!(multi <= 60.0);
        assert!(multi > fuzzy);
        assert!(fuzzy <= 30.0);
        assert!(fuzzy > none);
        assert_eq!(none, 0.0);
    }
}

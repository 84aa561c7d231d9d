//! Common types used throughout wasmpress.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a builder project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new ProjectId from a string.
    ///
    /// # Preconditions
    /// - `id` must be non-empty and consist of `[A-Za-z0-9._-]` only,
    ///   because it is embedded into storage keys and filenames
    ///
    /// # Errors
    /// - Returns error if id is empty or contains other characters
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "ProjectId cannot be empty".to_string(),
            ));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(crate::Error::InvalidInput(format!(
                "ProjectId contains invalid characters: {}",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A logical storage key, independent of the underlying backend.
///
/// Keys are flat, `/`-separated strings (`projects/demo.json`). Providers
/// map them onto whatever namespacing they support; listing is by string
/// prefix, not by directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Parse a key string.
    ///
    /// # Preconditions
    /// - Non-empty, no leading or trailing `/`
    /// - No empty, `.` or `..` segments, no backslashes
    ///
    /// # Errors
    /// - Returns error if any rule is violated
    pub fn parse(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Object key cannot be empty".to_string(),
            ));
        }
        if key.starts_with('/') || key.ends_with('/') {
            return Err(crate::Error::InvalidInput(format!(
                "Object key cannot start or end with '/': {}",
                key
            )));
        }
        if key.contains('\\') {
            return Err(crate::Error::InvalidInput(format!(
                "Object key cannot contain backslashes: {}",
                key
            )));
        }
        for segment in key.split('/') {
            if segment.is_empty() {
                return Err(crate::Error::InvalidInput(format!(
                    "Object key contains an empty segment: {}",
                    key
                )));
            }
            if segment == "." || segment == ".." {
                return Err(crate::Error::InvalidInput(format!(
                    "Object key cannot contain relative segments: {}",
                    key
                )));
            }
        }
        Ok(Self(key.to_string()))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the key (the object's file name).
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Append a child segment to this key.
    pub fn join(&self, segment: &str) -> crate::Result<Self> {
        Self::parse(&format!("{}/{}", self.0, segment))
    }

    /// Whether this key starts with the given string prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_project_id_creation() {
        let id = ProjectId::new("my-project_1.2").unwrap();
        assert_eq!(id.as_str(), "my-project_1.2");
    }

    #[test]
    fn test_project_id_rejects_empty_and_separators() {
        assert!(ProjectId::new("").is_err());
        assert!(ProjectId::new("a/b").is_err());
        assert!(ProjectId::new("a b").is_err());
    }

    #[test]
    fn test_object_key_parse() {
        let key = ObjectKey::parse("projects/demo.json").unwrap();
        assert_eq!(key.as_str(), "projects/demo.json");
        assert_eq!(key.name(), "demo.json");
        assert!(key.starts_with("projects/"));
    }

    #[test]
    fn test_object_key_rejects_invalid() {
        assert!(ObjectKey::parse("").is_err());
        assert!(ObjectKey::parse("/abs").is_err());
        assert!(ObjectKey::parse("trailing/").is_err());
        assert!(ObjectKey::parse("a//b").is_err());
        assert!(ObjectKey::parse("a/../b").is_err());
        assert!(ObjectKey::parse("a\\b").is_err());
    }

    #[test]
    fn test_object_key_join() {
        let key = ObjectKey::parse("projects").unwrap().join("demo.json").unwrap();
        assert_eq!(key.as_str(), "projects/demo.json");
        assert!(ObjectKey::parse("projects").unwrap().join("..").is_err());
    }

    #[test]
    fn test_object_key_serde_round_trip() {
        let key = ObjectKey::parse("a/b/c.txt").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"a/b/c.txt\"");
        let back: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        // Invalid keys are rejected at deserialization time.
        assert!(serde_json::from_str::<ObjectKey>("\"/abs\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_segments_always_parse(
            segments in proptest::collection::vec("[a-z0-9_.-]{1,8}", 1..5)
        ) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            let key = segments.join("/");
            let parsed = ObjectKey::parse(&key).unwrap();
            prop_assert_eq!(parsed.as_str(), key.as_str());
            prop_assert_eq!(parsed.name(), segments.last().unwrap().as_str());
        }
    }
}

//! Project document model: component tree, theme, and metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use wasmpress_common::ProjectId;

/// Project document format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    /// Current project document format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if a stored document can be read by this build.
    pub fn is_compatible(&self) -> bool {
        self.major <= Self::CURRENT.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// A node in the builder's component tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Unique node identifier.
    pub id: String,
    /// Component type name (e.g. "heading", "container").
    pub component_type: String,
    /// Component properties.
    #[serde(default)]
    pub props: serde_json::Map<String, serde_json::Value>,
    /// Nested child components.
    #[serde(default)]
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    /// Create a node of the given type with a generated id.
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            component_type: component_type.into(),
            props: serde_json::Map::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: &str) -> Option<&ComponentNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Total number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ComponentNode::node_count)
            .sum::<usize>()
    }
}

/// Theme applied to a project: a named set of design variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Theme name.
    pub name: String,
    /// Design variables (e.g. "primary-color" -> "#1a73e8").
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            variables: BTreeMap::new(),
        }
    }
}

/// A builder project document.
///
/// This structure is what the project store serializes to
/// `projects/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Document format version.
    pub schema_version: SchemaVersion,
    /// Unique project identifier.
    pub id: ProjectId,
    /// Human-readable project name.
    pub name: String,
    /// Root components of the page tree.
    #[serde(default)]
    pub components: Vec<ComponentNode>,
    /// Active theme.
    #[serde(default)]
    pub theme: Theme,
    /// Project-level configuration.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,
}

impl Project {
    /// Create an empty project.
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SchemaVersion::CURRENT,
            id,
            name: name.into(),
            components: Vec::new(),
            theme: Theme::default(),
            config: serde_json::Map::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Mark the project as modified now.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

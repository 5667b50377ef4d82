//! Lorebook entry definitions.

mod extensions;

pub use extensions::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::options::Position;

/// Unique identifier for lorebook entries.
///
/// Imported books carry numeric or string ids; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "IdRepr")]
pub struct EntryId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(i64),
    Text(String),
}

impl From<IdRepr> for EntryId {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Number(n) => Self(n.to_string()),
            IdRepr::Text(s) => Self(s),
        }
    }
}

impl EntryId {
    /// Create a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an entry ID from any string-like value.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_true() -> bool {
    true
}

/// A keyed snippet of text eligible for conditional injection into a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoreEntry {
    #[serde(default)]
    pub id: EntryId,

    /// Primary keys. An entry without primary keys only activates when constant.
    #[serde(default)]
    pub keys: Vec<String>,

    #[serde(default)]
    pub secondary_keys: Vec<String>,

    pub content: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher orders sort first within a book.
    #[serde(default)]
    pub insertion_order: i64,

    /// Treat every key as a regex literal even without `/.../` delimiters.
    #[serde(default)]
    pub use_regex: bool,

    #[serde(default)]
    pub case_sensitive: Option<bool>,

    #[serde(default)]
    pub constant: Option<bool>,

    #[serde(default)]
    pub priority: Option<i64>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub selective: bool,

    #[serde(default)]
    pub position: Position,

    #[serde(default)]
    pub extensions: EntryExtensions,
}

impl LoreEntry {
    /// Create a new enabled entry with the given primary keys and content.
    pub fn new<K, S>(keys: K, content: impl Into<String>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: EntryId::new(),
            keys: keys.into_iter().map(Into::into).collect(),
            secondary_keys: Vec::new(),
            content: content.into(),
            enabled: true,
            insertion_order: 100,
            use_regex: false,
            case_sensitive: None,
            constant: None,
            priority: None,
            name: None,
            comment: None,
            selective: false,
            position: Position::default(),
            extensions: EntryExtensions::default(),
        }
    }

    /// Set the entry ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = EntryId::from_string(id);
        self
    }

    /// Set secondary keys and mark the entry selective.
    pub fn with_secondary_keys<K, S>(mut self, keys: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_keys = keys.into_iter().map(Into::into).collect();
        self.selective = true;
        self
    }

    /// Set the insertion order.
    pub fn with_order(mut self, order: i64) -> Self {
        self.insertion_order = order;
        self
    }

    /// Mark the entry constant (always active, no matching).
    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = Some(constant);
        self
    }

    /// Set the explicit priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the comment (used as the display name).
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the entry name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the insertion position.
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Enable or disable the entry.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the extension payload.
    pub fn with_extensions(mut self, extensions: EntryExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Whether the entry bypasses matching.
    pub fn is_constant(&self) -> bool {
        self.constant.unwrap_or(false)
    }

    /// Inclusion groups this entry belongs to.
    pub fn groups(&self) -> Vec<String> {
        self.extensions.group_names()
    }

    /// Display label: comment, else name, else `None`.
    pub fn label(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.name.as_deref().filter(|n| !n.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = LoreEntry::new(["dragon"], "Dragons hoard gold.");
        assert_eq!(entry.keys, vec!["dragon".to_string()]);
        assert!(entry.enabled);
        assert!(!entry.is_constant());
        assert!(!entry.selective);
    }

    #[test]
    fn test_entry_builder() {
        let entry = LoreEntry::new(["castle"], "The castle is old.")
            .with_id("7")
            .with_secondary_keys(["king", "queen"])
            .with_order(42)
            .with_comment("Castle lore");

        assert_eq!(entry.id.as_str(), "7");
        assert!(entry.selective);
        assert_eq!(entry.secondary_keys.len(), 2);
        assert_eq!(entry.insertion_order, 42);
        assert_eq!(entry.label(), Some("Castle lore"));
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let entry = LoreEntry::new(["x"], "x").with_comment("  ").with_name("Named");
        assert_eq!(entry.label(), Some("Named"));

        let bare = LoreEntry::new(["x"], "x");
        assert_eq!(bare.label(), None);
    }

    #[test]
    fn test_entry_id_from_number() {
        let entry: LoreEntry =
            serde_json::from_str(r#"{"id": 12, "keys": ["a"], "content": "b"}"#).unwrap();
        assert_eq!(entry.id, EntryId::from_string("12"));
        assert!(entry.enabled);
    }
}

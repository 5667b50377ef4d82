//! Entry options: selective logic, insertion positions, roles, and book ordering.

use serde::{Deserialize, Serialize};

/// How secondary keys combine with a primary match.
///
/// Stored either by name or by its legacy numeric code (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "LogicRepr")]
pub enum SelectiveLogic {
    /// Any secondary key must match.
    #[default]
    AndAny,
    /// At least one secondary key must fail to match.
    NotAll,
    /// No secondary key may match.
    NotAny,
    /// Every secondary key must match.
    AndAll,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogicRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<LogicRepr> for SelectiveLogic {
    type Error = String;

    fn try_from(repr: LogicRepr) -> Result<Self, Self::Error> {
        match repr {
            LogicRepr::Code(0) => Ok(Self::AndAny),
            LogicRepr::Code(1) => Ok(Self::NotAll),
            LogicRepr::Code(2) => Ok(Self::NotAny),
            LogicRepr::Code(3) => Ok(Self::AndAll),
            LogicRepr::Code(other) => Err(format!("unknown selective logic code {other}")),
            LogicRepr::Name(name) => match name.as_str() {
                "and_any" => Ok(Self::AndAny),
                "not_all" => Ok(Self::NotAll),
                "not_any" => Ok(Self::NotAny),
                "and_all" => Ok(Self::AndAll),
                _ => Err(format!("unknown selective logic '{name}'")),
            },
        }
    }
}

/// Message role an activated entry is injected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "RoleRepr")]
pub enum Role {
    #[default]
    System,
    User,
    Assistant,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<RoleRepr> for Role {
    type Error = String;

    fn try_from(repr: RoleRepr) -> Result<Self, Self::Error> {
        match repr {
            RoleRepr::Code(0) => Ok(Self::System),
            RoleRepr::Code(1) => Ok(Self::User),
            RoleRepr::Code(2) => Ok(Self::Assistant),
            RoleRepr::Code(other) => Err(format!("unknown role code {other}")),
            RoleRepr::Name(name) => Role::parse(&name).ok_or_else(|| format!("unknown role '{name}'")),
        }
    }
}

impl Role {
    /// Parse a role name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" | "bot" | "char" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Where an activated entry is placed in the assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    /// Before the character definition.
    #[default]
    BeforeChar,
    /// After the character definition.
    AfterChar,
    /// Top of the author's note.
    AuthorsNoteTop,
    /// Bottom of the author's note.
    AuthorsNoteBottom,
    /// Inserted into chat history at a message depth.
    AtDepth,
    /// Before example messages.
    ExampleTop,
    /// After example messages.
    ExampleBottom,
    /// Collected into a named outlet rather than placed in the prompt.
    Outlet,
    /// A prompt-template slot the downstream assembler knows by name.
    Custom(String),
}

impl Position {
    /// Canonical name of the position.
    pub fn as_str(&self) -> &str {
        match self {
            Position::BeforeChar => "before_char",
            Position::AfterChar => "after_char",
            Position::AuthorsNoteTop => "an_top",
            Position::AuthorsNoteBottom => "an_bottom",
            Position::AtDepth => "at_depth",
            Position::ExampleTop => "em_top",
            Position::ExampleBottom => "em_bottom",
            Position::Outlet => "outlet",
            Position::Custom(name) => name,
        }
    }
}

impl From<String> for Position {
    fn from(name: String) -> Self {
        match name.as_str() {
            "before_char" | "before_desc" => Position::BeforeChar,
            "after_char" | "after_desc" => Position::AfterChar,
            "an_top" => Position::AuthorsNoteTop,
            "an_bottom" => Position::AuthorsNoteBottom,
            "at_depth" | "depth" => Position::AtDepth,
            "em_top" => Position::ExampleTop,
            "em_bottom" => Position::ExampleBottom,
            "outlet" => Position::Outlet,
            _ => Position::Custom(name.strip_prefix("pt_").unwrap_or(&name).to_string()),
        }
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        match position {
            Position::Custom(name) => format!("pt_{name}"),
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How global and character books are interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionStrategy {
    /// Character lore, then global lore.
    #[default]
    CharacterLoreFirst,
    /// Global lore, then character lore.
    GlobalLoreFirst,
    /// Global and character lore re-sorted together by order.
    Evenly,
}

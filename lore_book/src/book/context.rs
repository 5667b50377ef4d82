//! External strings an entry may opt into scanning.

use serde::{Deserialize, Serialize};

use crate::entry::EntryExtensions;

/// Character and persona text supplied by the caller for one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanContext {
    #[serde(default)]
    pub persona_description: String,
    #[serde(default)]
    pub character_description: String,
    #[serde(default)]
    pub character_personality: String,
    #[serde(default)]
    pub character_depth_prompt: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub creator_notes: String,
}

/// Which [`ScanContext`] fields an entry wants folded into its scan text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchScope {
    pub persona_description: bool,
    pub character_description: bool,
    pub character_personality: bool,
    pub character_depth_prompt: bool,
    pub scenario: bool,
    pub creator_notes: bool,
}

impl MatchScope {
    /// Scope declared by an entry's extensions.
    pub fn from_extensions(ext: &EntryExtensions) -> Self {
        Self {
            persona_description: ext.match_persona_description,
            character_description: ext.match_character_description,
            character_personality: ext.match_character_personality,
            character_depth_prompt: ext.match_character_depth_prompt,
            scenario: ext.match_scenario,
            creator_notes: ext.match_creator_notes,
        }
    }
}

impl ScanContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields selected by `scope`, in a fixed order, skipping empty ones.
    pub fn selected(&self, scope: &MatchScope) -> Vec<&str> {
        [
            (scope.persona_description, self.persona_description.as_str()),
            (scope.character_description, self.character_description.as_str()),
            (scope.character_personality, self.character_personality.as_str()),
            (scope.character_depth_prompt, self.character_depth_prompt.as_str()),
            (scope.scenario, self.scenario.as_str()),
            (scope.creator_notes, self.creator_notes.as_str()),
        ]
        .into_iter()
        .filter(|(wanted, text)| *wanted && !text.is_empty())
        .map(|(_, text)| text)
        .collect()
    }
}

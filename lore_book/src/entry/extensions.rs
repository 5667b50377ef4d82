//! Typed extension payload carried by lorebook entries.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::options::{Role, SelectiveLogic};

/// Weight a group member gets when none is declared.
pub const DEFAULT_GROUP_WEIGHT: u32 = 100;

/// Known extension fields plus a residual map for everything else.
///
/// Field names follow the snake_case export format; the camelCase spellings
/// used by some editors are accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryExtensions {
    /// Comma-separated inclusion group names.
    #[serde(default)]
    pub group: String,

    #[serde(default, alias = "groupWeight")]
    pub group_weight: Option<u32>,

    #[serde(default, alias = "groupOverride")]
    pub group_override: bool,

    /// Per-entry opt-in to group scoring; `None` defers to the engine default.
    #[serde(default, alias = "useGroupScoring")]
    pub use_group_scoring: Option<bool>,

    #[serde(default, alias = "selectiveLogic")]
    pub selective_logic: SelectiveLogic,

    /// Scan depth override for this entry.
    #[serde(default, alias = "scanDepth")]
    pub scan_depth: Option<usize>,

    #[serde(default, alias = "caseSensitive")]
    pub case_sensitive: Option<bool>,

    #[serde(default, alias = "matchWholeWords")]
    pub match_whole_words: Option<bool>,

    #[serde(default, alias = "matchPersonaDescription")]
    pub match_persona_description: bool,

    #[serde(default, alias = "matchCharacterDescription")]
    pub match_character_description: bool,

    #[serde(default, alias = "matchCharacterPersonality")]
    pub match_character_personality: bool,

    #[serde(default, alias = "matchCharacterDepthPrompt")]
    pub match_character_depth_prompt: bool,

    #[serde(default, alias = "matchScenario")]
    pub match_scenario: bool,

    #[serde(default, alias = "matchCreatorNotes")]
    pub match_creator_notes: bool,

    /// Skip this entry during recursive passes.
    #[serde(default, alias = "excludeRecursion")]
    pub exclude_recursion: bool,

    /// Keep this entry's content out of the recursion buffer.
    #[serde(default, alias = "preventRecursion")]
    pub prevent_recursion: bool,

    /// Recursion level this entry waits for. `true` means level 1.
    #[serde(
        default,
        alias = "delayUntilRecursion",
        deserialize_with = "deserialize_delay_level"
    )]
    pub delay_until_recursion: Option<u32>,

    #[serde(default, alias = "ignoreBudget")]
    pub ignore_budget: bool,

    /// Activation chance in percent.
    #[serde(default)]
    pub probability: Option<u8>,

    #[serde(default, alias = "useProbability")]
    pub use_probability: bool,

    /// Chat depth used with the at-depth position.
    #[serde(default)]
    pub depth: Option<usize>,

    #[serde(default)]
    pub role: Option<Role>,

    /// Outlet name used with the outlet position.
    #[serde(default, alias = "outletName")]
    pub outlet_name: Option<String>,

    /// Unrecognized fields, preserved for passthrough.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl EntryExtensions {
    /// Group names, trimmed, empties removed.
    pub fn group_names(&self) -> Vec<String> {
        self.group
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Declared group weight or the default.
    pub fn group_weight(&self) -> u32 {
        self.group_weight.unwrap_or(DEFAULT_GROUP_WEIGHT)
    }

    /// Set the inclusion group(s).
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the group weight.
    pub fn with_group_weight(mut self, weight: u32) -> Self {
        self.group_weight = Some(weight);
        self
    }

    /// Mark this entry as its group's override winner.
    pub fn with_group_override(mut self, group_override: bool) -> Self {
        self.group_override = group_override;
        self
    }

    /// Set the selective logic.
    pub fn with_selective_logic(mut self, logic: SelectiveLogic) -> Self {
        self.selective_logic = logic;
        self
    }

    /// Set the scan depth override.
    pub fn with_scan_depth(mut self, depth: usize) -> Self {
        self.scan_depth = Some(depth);
        self
    }

    /// Set whether the entry ignores the token budget.
    pub fn with_ignore_budget(mut self, ignore_budget: bool) -> Self {
        self.ignore_budget = ignore_budget;
        self
    }

    /// Set the recursion level this entry waits for.
    pub fn with_delay_until_recursion(mut self, level: u32) -> Self {
        self.delay_until_recursion = Some(level);
        self
    }

    /// Skip this entry during recursive passes.
    pub fn with_exclude_recursion(mut self, exclude: bool) -> Self {
        self.exclude_recursion = exclude;
        self
    }

    /// Keep this entry's content out of the recursion buffer.
    pub fn with_prevent_recursion(mut self, prevent: bool) -> Self {
        self.prevent_recursion = prevent;
        self
    }

    /// Opt into or out of group scoring.
    pub fn with_group_scoring(mut self, enabled: bool) -> Self {
        self.use_group_scoring = Some(enabled);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DelayRepr {
    Flag(bool),
    Level(u32),
}

fn deserialize_delay_level<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<DelayRepr>::deserialize(deserializer)?;
    Ok(match repr {
        None | Some(DelayRepr::Flag(false)) | Some(DelayRepr::Level(0)) => None,
        Some(DelayRepr::Flag(true)) => Some(1),
        Some(DelayRepr::Level(level)) => Some(level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_names() {
        let ext = EntryExtensions::default().with_group("weather, mood ,,");
        assert_eq!(ext.group_names(), vec!["weather".to_string(), "mood".to_string()]);
        assert_eq!(ext.group_weight(), DEFAULT_GROUP_WEIGHT);
    }

    #[test]
    fn test_camel_case_aliases_and_passthrough() {
        let ext: EntryExtensions = serde_json::from_str(
            r#"{
                "group": "g",
                "groupWeight": 3,
                "selectiveLogic": 2,
                "delayUntilRecursion": true,
                "display_index": 4
            }"#,
        )
        .unwrap();

        assert_eq!(ext.group_weight(), 3);
        assert_eq!(ext.selective_logic, SelectiveLogic::NotAny);
        assert_eq!(ext.delay_until_recursion, Some(1));
        assert_eq!(ext.other.get("display_index"), Some(&Value::from(4)));
    }

    #[test]
    fn test_delay_level_false_is_unset() {
        let ext: EntryExtensions =
            serde_json::from_str(r#"{"delay_until_recursion": false}"#).unwrap();
        assert_eq!(ext.delay_until_recursion, None);

        let ext: EntryExtensions =
            serde_json::from_str(r#"{"delay_until_recursion": 3}"#).unwrap();
        assert_eq!(ext.delay_until_recursion, Some(3));
    }
}

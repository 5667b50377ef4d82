//! Rule dialects: turn a stored entry into an activation candidate.
//!
//! Both dialects share one contract. An evaluator looks at a single entry in
//! isolation and either rejects it or returns an [`Active`] describing how
//! the entry should be matched and placed. Matching itself happens later,
//! in the engine, against the scan buffer.

mod decorated;
mod plain;

pub use decorated::*;
pub use plain::*;

use serde::{Deserialize, Serialize};

use lore_book::{BookSource, LoreEntry, MatchScope, Position, Role};

use crate::collaborators::{MatchFlags, TokenEstimator};
use crate::matching::{is_regex_literal, MatchOptions, SearchQuery};

/// How an injecting entry merges into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectOperation {
    Append,
    Prepend,
    Replace,
}

/// Instruction to merge this entry's content into another active entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inject {
    pub operation: InjectOperation,
    /// Source name of the target.
    pub location: String,
    /// Substring replaced by [`InjectOperation::Replace`].
    pub param: String,
    /// The target must be another activated lore entry.
    pub lore: bool,
}

/// Override of the match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceState {
    #[default]
    None,
    Activate,
    Deactivate,
}

/// An activation candidate derived from one entry for one activation call.
#[derive(Debug, Clone)]
pub struct Active<'e> {
    pub entry: &'e LoreEntry,
    pub book: BookSource,

    /// Content with directives removed.
    pub content: String,
    pub depth: Option<usize>,
    /// Count `depth` from the start of the chat instead of the end.
    pub reverse_depth: bool,
    pub position: Position,
    pub role: Role,
    pub order: i64,
    pub priority: i64,
    pub tokens: usize,
    /// Display name: comment, entry name, or book label.
    pub source: String,
    pub inject: Option<Inject>,
    pub outlet: Option<String>,

    /// Primary keys, with regex wrapping applied when the entry asks for it.
    pub keys: Vec<String>,
    pub secondary_keys: Vec<String>,
    pub search_queries: Vec<SearchQuery>,
    pub scan_depth: Option<usize>,
    pub scope: MatchScope,
    pub case_sensitive: bool,
    pub full_word_match: bool,

    pub dont_search_when_recursive: bool,
    pub recursive_override: Option<bool>,
    pub exclude_recursion: bool,
    pub delay_until_recursion: Option<u32>,

    pub force_state: ForceState,
    pub keep_activate_after_match: bool,
    pub dont_activate_after_match: bool,
    /// Activation chance in percent; `None` means always.
    pub probability: Option<f64>,
    pub ignore_budget: bool,
    pub groups: Vec<String>,
}

impl<'e> Active<'e> {
    pub fn id(&self) -> &str {
        self.entry.id.as_str()
    }

    pub fn is_constant(&self) -> bool {
        self.entry.is_constant()
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive,
            whole_word: self.full_word_match,
        }
    }

    /// Whether this entry's content should feed later passes.
    pub fn feeds_recursion(&self, recursion_enabled: bool) -> bool {
        !self.dont_search_when_recursive && self.recursive_override.unwrap_or(recursion_enabled)
    }

    /// Whether a group scoring pass applies to this entry.
    pub fn uses_group_scoring(&self, engine_default: bool) -> bool {
        self.entry
            .extensions
            .use_group_scoring
            .unwrap_or(engine_default)
    }

    pub fn group_weight(&self) -> u32 {
        self.entry.extensions.group_weight()
    }

    pub fn group_override(&self) -> bool {
        self.entry.extensions.group_override
    }

    /// Whether a persisted after-match flag should be written for this entry.
    pub fn tracks_match(&self) -> bool {
        self.keep_activate_after_match || self.dont_activate_after_match
    }
}

/// Engine-wide matching defaults an entry falls back on.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchDefaults {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Everything an evaluator may read about the entry's surroundings.
pub struct EvalContext<'a> {
    pub book: BookSource,
    /// Fallback display label for entries without a comment or name.
    pub book_label: &'a str,
    pub book_scan_depth: Option<usize>,
    /// Number of messages in the chat so far.
    pub chat_length: usize,
    pub defaults: MatchDefaults,
    pub estimator: &'a dyn TokenEstimator,
    pub match_flags: &'a dyn MatchFlags,
}

/// A rule dialect.
pub trait DirectiveEvaluator {
    fn name(&self) -> &'static str;

    /// Build a candidate for `entry`, or `None` when the entry is rejected.
    fn evaluate<'e>(&self, entry: &'e LoreEntry, ctx: &EvalContext<'_>) -> Option<Active<'e>>;
}

/// Candidate with every field taken from the entry and its extensions.
pub(crate) fn base_active<'e>(
    entry: &'e LoreEntry,
    content: String,
    ctx: &EvalContext<'_>,
) -> Active<'e> {
    let ext = &entry.extensions;
    let case_sensitive = ext
        .case_sensitive
        .or(entry.case_sensitive)
        .unwrap_or(ctx.defaults.case_sensitive);

    let source = entry
        .label()
        .map(str::to_string)
        .unwrap_or_else(|| ctx.book_label.to_string());

    let outlet = match entry.position {
        Position::Outlet => ext.outlet_name.clone().filter(|n| !n.trim().is_empty()),
        _ => None,
    };

    Active {
        entry,
        book: ctx.book,
        tokens: ctx.estimator.estimate(&content),
        content,
        depth: ext.depth,
        reverse_depth: false,
        position: entry.position.clone(),
        role: ext.role.unwrap_or_default(),
        order: entry.insertion_order,
        priority: entry.priority.unwrap_or(0),
        source,
        inject: None,
        outlet,
        keys: normalize_keys(&entry.keys, entry.use_regex, case_sensitive),
        secondary_keys: normalize_keys(&entry.secondary_keys, entry.use_regex, case_sensitive),
        search_queries: Vec::new(),
        scan_depth: ext.scan_depth.or(ctx.book_scan_depth),
        scope: MatchScope::from_extensions(ext),
        case_sensitive,
        full_word_match: ext.match_whole_words.unwrap_or(ctx.defaults.whole_word),
        dont_search_when_recursive: ext.prevent_recursion,
        recursive_override: None,
        exclude_recursion: ext.exclude_recursion,
        delay_until_recursion: ext.delay_until_recursion,
        force_state: ForceState::None,
        keep_activate_after_match: false,
        dont_activate_after_match: false,
        probability: None,
        ignore_budget: ext.ignore_budget,
        groups: entry.groups(),
    }
}

/// Trim keys, drop blanks, and wrap bare patterns as literals when the entry
/// treats keys as regexes.
pub(crate) fn normalize_keys(keys: &[String], use_regex: bool, case_sensitive: bool) -> Vec<String> {
    keys.iter()
        .map(|key| key.trim())
        .filter(|key| !key.is_empty())
        .map(|key| {
            if use_regex && !is_regex_literal(key) {
                let flags = if case_sensitive { "" } else { "i" };
                format!("/{key}/{flags}")
            } else {
                key.to_string()
            }
        })
        .collect()
}

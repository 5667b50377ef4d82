//! Decorator dialect: `@@directive args` lines at the top of entry content.
//!
//! ```text
//! @@depth 4
//! @@role assistant
//! @@additional_keys storm, thunder
//! The harbor floods when storms roll in.
//! ```
//!
//! Directive lines are stripped before the content is used. A directive with
//! a missing or malformed argument rejects the entry; unknown directives are
//! ignored.

use lore_book::{LoreEntry, Position, Role};
use tracing::trace;

use super::{
    base_active, secondary_query, Active, DirectiveEvaluator, EvalContext, ForceState, Inject,
    InjectOperation,
};
use crate::matching::SearchQuery;

/// Priority given by `@@ignore_on_max_context`, so the entry is trimmed first.
pub const IGNORE_ON_MAX_CONTEXT_PRIORITY: i64 = -1000;

/// One parsed `@@name args` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
}

impl Directive {
    fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    fn number<T: std::str::FromStr>(&self) -> Option<T> {
        self.arg(0)?.parse().ok()
    }

    /// All arguments rejoined and split on commas.
    fn key_list(&self) -> Option<Vec<String>> {
        let keys: Vec<String> = self
            .args
            .join(" ")
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        (!keys.is_empty()).then_some(keys)
    }
}

/// Split leading directive lines from the body.
pub fn parse_directives(content: &str) -> (Vec<Directive>, String) {
    let mut directives = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.peek() {
        let Some(rest) = line.trim_start().strip_prefix("@@") else {
            break;
        };
        let mut parts = rest.split_whitespace();
        if let Some(name) = parts.next() {
            directives.push(Directive {
                name: name.to_ascii_lowercase(),
                args: parts.map(str::to_string).collect(),
            });
        }
        lines.next();
    }

    (directives, lines.collect::<Vec<_>>().join("\n"))
}

/// Evaluates entries written with inline `@@` directives.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoratedDialect;

impl DecoratedDialect {
    pub fn new() -> Self {
        Self
    }
}

impl DirectiveEvaluator for DecoratedDialect {
    fn name(&self) -> &'static str {
        "decorated"
    }

    fn evaluate<'e>(&self, entry: &'e LoreEntry, ctx: &EvalContext<'_>) -> Option<Active<'e>> {
        if !entry.enabled {
            return None;
        }

        let (directives, content) = parse_directives(&entry.content);
        let mut active = base_active(entry, content, ctx);
        active.priority = entry.priority.unwrap_or(entry.insertion_order);

        if entry.selective && !active.secondary_keys.is_empty() {
            let query = secondary_query(&active.secondary_keys, entry.extensions.selective_logic);
            active.search_queries.push(query);
        }

        for directive in &directives {
            if apply(&mut active, directive, ctx).is_none() {
                trace!(entry = %entry.id, directive = %directive.name, "directive rejected entry");
                return None;
            }
        }

        let matched_before = ctx.match_flags.get(entry.id.as_str()) == Some(true);
        if matched_before && active.keep_activate_after_match {
            active.force_state = ForceState::Activate;
        } else if matched_before && active.dont_activate_after_match {
            active.force_state = ForceState::Deactivate;
        }

        Some(active)
    }
}

/// Apply one directive. `None` rejects the entry.
fn apply(active: &mut Active<'_>, directive: &Directive, ctx: &EvalContext<'_>) -> Option<()> {
    match directive.name.as_str() {
        "activate_only_after" => {
            let after: usize = directive.number()?;
            if ctx.chat_length < after {
                return None;
            }
        }
        "activate_only_every" => {
            let every: usize = directive.number()?;
            if every == 0 || ctx.chat_length % every != 0 {
                return None;
            }
        }
        "activate" => active.force_state = ForceState::Activate,
        "dont_activate" => active.force_state = ForceState::Deactivate,
        "keep_activate_after_match" => active.keep_activate_after_match = true,
        "dont_activate_after_match" => active.dont_activate_after_match = true,
        "depth" => {
            active.depth = Some(directive.number()?);
            active.reverse_depth = false;
            active.position = Position::AtDepth;
        }
        "reverse_depth" => {
            active.depth = Some(directive.number()?);
            active.reverse_depth = true;
            active.position = Position::AtDepth;
        }
        "role" => active.role = Role::parse(directive.arg(0)?)?,
        "scan_depth" => active.scan_depth = Some(directive.number()?),
        "position" => {
            let position = Position::from(directive.arg(0)?.to_string());
            if position == Position::Outlet {
                active.outlet = Some(directive.arg(1)?.to_string());
            }
            active.position = position;
        }
        "outlet" => {
            active.outlet = Some(directive.arg(0)?.to_string());
            active.position = Position::Outlet;
        }
        "additional_keys" => {
            let keys = directive.key_list()?;
            active.search_queries.push(SearchQuery::new(keys, false, false));
        }
        "exclude_keys" => {
            let keys = directive.key_list()?;
            active.search_queries.push(SearchQuery::new(keys, true, false));
        }
        "exclude_keys_all" => {
            let keys = directive.key_list()?;
            active.search_queries.push(SearchQuery::new(keys, true, true));
        }
        "match_full_word" => active.full_word_match = true,
        "match_partial_word" => active.full_word_match = false,
        "priority" => active.priority = directive.number()?,
        "ignore_on_max_context" => active.priority = IGNORE_ON_MAX_CONTEXT_PRIORITY,
        "recursive" => active.recursive_override = Some(true),
        "unrecursive" => active.recursive_override = Some(false),
        "no_recursive_search" => active.exclude_recursion = true,
        "probability" => {
            let percent: f64 = directive.number()?;
            if !(0.0..=100.0).contains(&percent) {
                return None;
            }
            active.probability = (percent < 100.0).then_some(percent);
        }
        "inject_at" => active.inject = Some(inject(InjectOperation::Append, directive, false)?),
        "inject_prepend" => {
            active.inject = Some(inject(InjectOperation::Prepend, directive, false)?)
        }
        "inject_replace" => {
            active.inject = Some(inject(InjectOperation::Replace, directive, false)?)
        }
        "inject_lore" => active.inject = Some(inject(InjectOperation::Append, directive, true)?),
        other => trace!(directive = other, "unknown directive ignored"),
    }
    Some(())
}

fn inject(operation: InjectOperation, directive: &Directive, lore: bool) -> Option<Inject> {
    let location = directive.arg(0)?.to_string();
    let param = match operation {
        InjectOperation::Replace => directive.args[1..].join(" "),
        _ => String::new(),
    };
    if operation == InjectOperation::Replace && param.is_empty() {
        return None;
    }
    Some(Inject {
        operation,
        location,
        param,
        lore,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CharRatioEstimator, MatchFlags, NoMatchFlags};
    use crate::dialect::tests::context;
    use lore_book::{EntryExtensions, SelectiveLogic};
    use std::collections::HashMap;

    fn evaluate<'e>(entry: &'e LoreEntry, chat_length: usize, flags: &dyn MatchFlags) -> Option<Active<'e>> {
        let estimator = CharRatioEstimator::default();
        let ctx = context(&estimator, flags, chat_length);
        DecoratedDialect.evaluate(entry, &ctx)
    }

    #[test]
    fn test_parse_directives_strips_leading_block() {
        let (directives, body) = parse_directives("@@depth 3\n  @@role user\nBody line\n@@not_a_directive");
        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].name, "depth");
        assert_eq!(directives[0].args, vec!["3".to_string()]);
        assert_eq!(body, "Body line\n@@not_a_directive");
    }

    #[test]
    fn test_placement_directives() {
        let entry = LoreEntry::new(["harbor"], "@@depth 4\n@@role assistant\n@@priority 9\nThe harbor floods.");
        let active = evaluate(&entry, 0, &NoMatchFlags).unwrap();

        assert_eq!(active.content, "The harbor floods.");
        assert_eq!(active.depth, Some(4));
        assert_eq!(active.position, Position::AtDepth);
        assert_eq!(active.role, Role::Assistant);
        assert_eq!(active.priority, 9);
    }

    #[test]
    fn test_invalid_argument_rejects() {
        for content in ["@@depth deep\nx", "@@role narrator\nx", "@@probability 150\nx", "@@additional_keys\nx"] {
            let entry = LoreEntry::new(["x"], content);
            assert!(evaluate(&entry, 0, &NoMatchFlags).is_none(), "{content}");
        }
    }

    #[test]
    fn test_activation_windows() {
        let after = LoreEntry::new(["x"], "@@activate_only_after 3\nx");
        assert!(evaluate(&after, 2, &NoMatchFlags).is_none());
        assert!(evaluate(&after, 3, &NoMatchFlags).is_some());

        let every = LoreEntry::new(["x"], "@@activate_only_every 2\nx");
        assert!(evaluate(&every, 3, &NoMatchFlags).is_none());
        assert!(evaluate(&every, 4, &NoMatchFlags).is_some());

        let never = LoreEntry::new(["x"], "@@activate_only_every 0\nx");
        assert!(evaluate(&never, 0, &NoMatchFlags).is_none());
    }

    #[test]
    fn test_key_queries_and_match_modes() {
        let entry = LoreEntry::new(
            ["storm"],
            "@@additional_keys thunder, rain\n@@exclude_keys calm\n@@match_full_word\nStorms.",
        );
        let active = evaluate(&entry, 0, &NoMatchFlags).unwrap();

        assert_eq!(active.search_queries.len(), 2);
        assert_eq!(active.search_queries[0].keys, vec!["thunder".to_string(), "rain".to_string()]);
        assert!(active.search_queries[1].negative);
        assert!(active.full_word_match);
    }

    #[test]
    fn test_selective_logic_shapes_secondary_query() {
        let entry = LoreEntry::new(["castle"], "@@additional_keys banner\nOld walls.")
            .with_secondary_keys(["king", "queen"])
            .with_extensions(EntryExtensions::default().with_selective_logic(SelectiveLogic::NotAny));
        let active = evaluate(&entry, 0, &NoMatchFlags).unwrap();

        assert_eq!(
            active.search_queries[0],
            SearchQuery::new(vec!["king".to_string(), "queen".to_string()], true, false)
        );
        assert_eq!(active.search_queries[1].keys, vec!["banner".to_string()]);
        assert!(!active.search_queries[1].negative);
    }

    #[test]
    fn test_after_match_flags_force_state() {
        let mut flags = HashMap::new();
        flags.insert("keep".to_string(), true);
        flags.insert("drop".to_string(), true);

        let keep = LoreEntry::new(["x"], "@@keep_activate_after_match\nx").with_id("keep");
        assert_eq!(evaluate(&keep, 0, &flags).unwrap().force_state, ForceState::Activate);
        assert_eq!(evaluate(&keep, 0, &NoMatchFlags).unwrap().force_state, ForceState::None);

        let drop = LoreEntry::new(["x"], "@@activate\n@@dont_activate_after_match\nx").with_id("drop");
        assert_eq!(evaluate(&drop, 0, &flags).unwrap().force_state, ForceState::Deactivate);
        assert_eq!(evaluate(&drop, 0, &NoMatchFlags).unwrap().force_state, ForceState::Activate);
    }

    #[test]
    fn test_inject_directives() {
        let entry = LoreEntry::new(["x"], "@@inject_replace Kingdom old king\nnew queen");
        let active = evaluate(&entry, 0, &NoMatchFlags).unwrap();
        let inject = active.inject.unwrap();
        assert_eq!(inject.operation, InjectOperation::Replace);
        assert_eq!(inject.location, "Kingdom");
        assert_eq!(inject.param, "old king");

        let missing_param = LoreEntry::new(["x"], "@@inject_replace Kingdom\nx");
        assert!(evaluate(&missing_param, 0, &NoMatchFlags).is_none());

        let lore = LoreEntry::new(["x"], "@@inject_lore Kingdom\nx");
        assert!(evaluate(&lore, 0, &NoMatchFlags).unwrap().inject.unwrap().lore);
    }

    #[test]
    fn test_recursion_and_probability_directives() {
        let entry = LoreEntry::new(["x"], "@@unrecursive\n@@no_recursive_search\n@@probability 25\nx");
        let active = evaluate(&entry, 0, &NoMatchFlags).unwrap();
        assert_eq!(active.recursive_override, Some(false));
        assert!(active.exclude_recursion);
        assert_eq!(active.probability, Some(25.0));
    }

    #[test]
    fn test_default_priority_is_insertion_order() {
        let entry = LoreEntry::new(["x"], "x").with_order(55);
        assert_eq!(evaluate(&entry, 0, &NoMatchFlags).unwrap().priority, 55);

        let ignored = LoreEntry::new(["x"], "@@ignore_on_max_context\nx");
        assert_eq!(
            evaluate(&ignored, 0, &NoMatchFlags).unwrap().priority,
            IGNORE_ON_MAX_CONTEXT_PRIORITY
        );
    }
}

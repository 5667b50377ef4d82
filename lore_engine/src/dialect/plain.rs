//! Plain keyword dialect: keys, selective logic, and typed extensions only.

use lore_book::{LoreEntry, SelectiveLogic};
use tracing::trace;

use super::{base_active, Active, DirectiveEvaluator, EvalContext};
use crate::matching::SearchQuery;

/// Activation is `enabled && (constant || keys match)`. Content is used
/// verbatim; there is no inline directive language.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDialect;

impl PlainDialect {
    pub fn new() -> Self {
        Self
    }
}

/// Express selective logic over secondary keys as a search query.
pub fn secondary_query(secondary: &[String], logic: SelectiveLogic) -> SearchQuery {
    let (negative, all) = match logic {
        SelectiveLogic::AndAny => (false, false),
        SelectiveLogic::AndAll => (false, true),
        SelectiveLogic::NotAny => (true, false),
        SelectiveLogic::NotAll => (true, true),
    };
    SearchQuery::new(secondary.to_vec(), negative, all)
}

impl DirectiveEvaluator for PlainDialect {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn evaluate<'e>(&self, entry: &'e LoreEntry, ctx: &EvalContext<'_>) -> Option<Active<'e>> {
        if !entry.enabled {
            trace!(entry = %entry.id, "disabled");
            return None;
        }

        let mut active = base_active(entry, entry.content.clone(), ctx);

        if entry.selective && !active.secondary_keys.is_empty() {
            let query = secondary_query(&active.secondary_keys, entry.extensions.selective_logic);
            active.search_queries.push(query);
        }

        let ext = &entry.extensions;
        if ext.use_probability {
            active.probability = ext.probability.map(f64::from).filter(|p| *p < 100.0);
        }

        Some(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CharRatioEstimator, NoMatchFlags};
    use crate::dialect::tests::context;
    use lore_book::EntryExtensions;

    #[test]
    fn test_disabled_entry_is_rejected() {
        let estimator = CharRatioEstimator::default();
        let ctx = context(&estimator, &NoMatchFlags, 0);
        let entry = LoreEntry::new(["wolf"], "Wolves.").with_enabled(false);
        assert!(PlainDialect.evaluate(&entry, &ctx).is_none());
    }

    #[test]
    fn test_selective_entry_gets_secondary_query() {
        let estimator = CharRatioEstimator::default();
        let ctx = context(&estimator, &NoMatchFlags, 0);
        let entry = LoreEntry::new(["castle"], "Old walls.")
            .with_secondary_keys(["king", "queen"])
            .with_extensions(
                EntryExtensions::default().with_selective_logic(SelectiveLogic::NotAll),
            );

        let active = PlainDialect.evaluate(&entry, &ctx).unwrap();
        assert_eq!(
            active.search_queries,
            vec![SearchQuery::new(
                vec!["king".to_string(), "queen".to_string()],
                true,
                true
            )]
        );
        assert_eq!(active.content, "Old walls.");
    }

    #[test]
    fn test_non_selective_ignores_secondary_keys() {
        let estimator = CharRatioEstimator::default();
        let ctx = context(&estimator, &NoMatchFlags, 0);
        let mut entry = LoreEntry::new(["castle"], "x").with_secondary_keys(["king"]);
        entry.selective = false;

        let active = PlainDialect.evaluate(&entry, &ctx).unwrap();
        assert!(active.search_queries.is_empty());
    }

    #[test]
    fn test_probability_only_when_enabled() {
        let estimator = CharRatioEstimator::default();
        let ctx = context(&estimator, &NoMatchFlags, 0);

        let mut ext = EntryExtensions {
            probability: Some(40),
            ..EntryExtensions::default()
        };
        let entry = LoreEntry::new(["x"], "x").with_extensions(ext.clone());
        assert_eq!(PlainDialect.evaluate(&entry, &ctx).unwrap().probability, None);

        ext.use_probability = true;
        let entry = LoreEntry::new(["x"], "x").with_extensions(ext);
        assert_eq!(PlainDialect.evaluate(&entry, &ctx).unwrap().probability, Some(40.0));
    }

    #[test]
    fn test_secondary_query_mapping() {
        let keys = vec!["a".to_string()];
        assert_eq!(secondary_query(&keys, SelectiveLogic::AndAny), SearchQuery::new(keys.clone(), false, false));
        assert_eq!(secondary_query(&keys, SelectiveLogic::NotAny), SearchQuery::new(keys.clone(), true, false));
        assert_eq!(secondary_query(&keys, SelectiveLogic::AndAll), SearchQuery::new(keys, false, true));
    }
}

//! Final shaping of activated entries: inject merging and outlet extraction.

use std::collections::BTreeMap;

use lore_book::Position;
use tracing::trace;

use crate::collaborators::TokenEstimator;
use crate::dialect::{Active, InjectOperation};

/// Result of one activation call.
#[derive(Debug, Clone, Default)]
pub struct Activation<'e> {
    /// Activated entries, highest priority first, within budget.
    pub entries: Vec<Active<'e>>,
    /// Content of outlet-positioned entries, by outlet name.
    pub outlets: BTreeMap<String, Vec<String>>,
    /// After-match flags the caller should persist, by entry id.
    pub flag_updates: BTreeMap<String, bool>,
    /// Number of scan passes run.
    pub passes: usize,
}

impl<'e> Activation<'e> {
    /// Ids of the activated entries, in output order.
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|active| active.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|active| active.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.outlets.is_empty()
    }

    /// Total estimated tokens of the activated entries.
    pub fn tokens(&self) -> usize {
        self.entries.iter().map(|active| active.tokens).sum()
    }
}

/// Merge injecting entries into the entry whose source matches their
/// location.
///
/// A merged injector is removed. An injector whose target is missing is
/// dropped when it targets lore, and otherwise kept for downstream placement.
pub fn merge_injects<'e>(
    mut entries: Vec<Active<'e>>,
    estimator: &dyn TokenEstimator,
) -> Vec<Active<'e>> {
    let mut removed = vec![false; entries.len()];

    for injector in 0..entries.len() {
        let Some(inject) = entries[injector].inject.clone() else {
            continue;
        };

        let target = (0..entries.len()).find(|&t| {
            t != injector
                && !removed[t]
                && entries[t].inject.is_none()
                && entries[t].source == inject.location
        });

        let Some(target) = target else {
            if inject.lore {
                trace!(entry = entries[injector].id(), location = %inject.location, "inject target not active");
                removed[injector] = true;
            }
            continue;
        };

        let text = entries[injector].content.clone();
        let merged = &mut entries[target];
        merged.content = match inject.operation {
            InjectOperation::Append => format!("{}\n{}", merged.content, text),
            InjectOperation::Prepend => format!("{}\n{}", text, merged.content),
            InjectOperation::Replace => merged.content.replace(&inject.param, &text),
        };
        merged.tokens = estimator.estimate(&merged.content);
        removed[injector] = true;
    }

    entries
        .into_iter()
        .zip(removed)
        .filter(|(_, removed)| !removed)
        .map(|(active, _)| active)
        .collect()
}

/// Move outlet-positioned entries out of the list, grouped by outlet name.
///
/// Outlet entries without a name are discarded.
pub fn extract_outlets(
    entries: Vec<Active<'_>>,
) -> (Vec<Active<'_>>, BTreeMap<String, Vec<String>>) {
    let mut outlets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut kept = Vec::with_capacity(entries.len());

    for active in entries {
        if active.position != Position::Outlet {
            kept.push(active);
            continue;
        }
        match &active.outlet {
            Some(name) => outlets
                .entry(name.clone())
                .or_default()
                .push(active.content.clone()),
            None => trace!(entry = active.id(), "outlet entry without a name"),
        }
    }

    (kept, outlets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CharRatioEstimator, NoMatchFlags};
    use crate::dialect::{DirectiveEvaluator, EvalContext, Inject, MatchDefaults, PlainDialect};
    use lore_book::{BookSource, EntryExtensions, LoreEntry};

    fn evaluate(entry: &LoreEntry) -> Active<'_> {
        let estimator = CharRatioEstimator::default();
        let ctx = EvalContext {
            book: BookSource::Chat,
            book_label: "book",
            book_scan_depth: None,
            chat_length: 0,
            defaults: MatchDefaults::default(),
            estimator: &estimator,
            match_flags: &NoMatchFlags,
        };
        PlainDialect.evaluate(entry, &ctx).unwrap()
    }

    fn inject(operation: InjectOperation, location: &str, param: &str, lore: bool) -> Option<Inject> {
        Some(Inject {
            operation,
            location: location.to_string(),
            param: param.to_string(),
            lore,
        })
    }

    #[test]
    fn test_append_and_prepend() {
        let target = LoreEntry::new(["k"], "base").with_id("t").with_comment("Castle");
        let after = LoreEntry::new(["k"], "after").with_id("a");
        let before = LoreEntry::new(["k"], "before").with_id("b");

        let mut appending = evaluate(&after);
        appending.inject = inject(InjectOperation::Append, "Castle", "", true);
        let mut prepending = evaluate(&before);
        prepending.inject = inject(InjectOperation::Prepend, "Castle", "", true);

        let merged = merge_injects(
            vec![evaluate(&target), appending, prepending],
            &CharRatioEstimator::default(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "before\nbase\nafter");
        assert_eq!(merged[0].tokens, 5);
    }

    #[test]
    fn test_replace() {
        let target = LoreEntry::new(["k"], "The king is NAME.").with_id("t").with_comment("Court");
        let name = LoreEntry::new(["k"], "Aldric").with_id("n");

        let mut replacing = evaluate(&name);
        replacing.inject = inject(InjectOperation::Replace, "Court", "NAME", false);

        let merged = merge_injects(vec![evaluate(&target), replacing], &CharRatioEstimator::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "The king is Aldric.");
    }

    #[test]
    fn test_missing_target() {
        let lore = LoreEntry::new(["k"], "x").with_id("l");
        let prompt = LoreEntry::new(["k"], "y").with_id("p");

        let mut to_lore = evaluate(&lore);
        to_lore.inject = inject(InjectOperation::Append, "Nowhere", "", true);
        let mut to_prompt = evaluate(&prompt);
        to_prompt.inject = inject(InjectOperation::Append, "description", "", false);

        let merged = merge_injects(vec![to_lore, to_prompt], &CharRatioEstimator::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id(), "p");
        assert!(merged[0].inject.is_some());
    }

    #[test]
    fn test_extract_outlets() {
        let named = LoreEntry::new(["k"], "Rain.")
            .with_id("w")
            .with_position(Position::Outlet)
            .with_extensions(EntryExtensions {
                outlet_name: Some("weather".to_string()),
                ..EntryExtensions::default()
            });
        let unnamed = LoreEntry::new(["k"], "Lost.")
            .with_id("u")
            .with_position(Position::Outlet);
        let plain = LoreEntry::new(["k"], "Stays.").with_id("s");

        let (kept, outlets) = extract_outlets(vec![evaluate(&named), evaluate(&unnamed), evaluate(&plain)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "s");
        assert_eq!(outlets.get("weather"), Some(&vec!["Rain.".to_string()]));
        assert_eq!(outlets.len(), 1);
    }
}

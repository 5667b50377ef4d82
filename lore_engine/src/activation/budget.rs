//! Token-budget trimming of the final ordered list.

use tracing::debug;

use crate::dialect::Active;

/// Anything the allocator can weigh.
pub trait Budgeted {
    fn tokens(&self) -> usize;
    fn ignores_budget(&self) -> bool;
}

impl Budgeted for Active<'_> {
    fn tokens(&self) -> usize {
        self.tokens
    }

    fn ignores_budget(&self) -> bool {
        self.ignore_budget
    }
}

/// Token allowance for `max_context`: a percentage of the context, at
/// least 1, capped by `budget_cap` when positive.
pub fn token_budget(max_context: usize, budget_percent: f64, budget_cap: usize) -> usize {
    let budget = (budget_percent * max_context as f64 / 100.0).round();
    let budget = if budget.is_finite() && budget >= 1.0 {
        budget as usize
    } else {
        1
    };
    if budget_cap > 0 {
        budget.min(budget_cap)
    } else {
        budget
    }
}

/// Trim `entries` (already in priority order) to the budget.
///
/// Ignore-budget entries are always kept and still count toward the total.
/// Any other entry is dropped once `used + tokens` would reach the budget.
pub fn apply_budget<T: Budgeted>(
    entries: Vec<T>,
    max_context: usize,
    budget_percent: f64,
    budget_cap: usize,
) -> Vec<T> {
    let budget = token_budget(max_context, budget_percent, budget_cap);
    let mut used = 0usize;
    let mut dropped = 0usize;

    let kept: Vec<T> = entries
        .into_iter()
        .filter(|entry| {
            let tokens = entry.tokens();
            if entry.ignores_budget() {
                used = used.saturating_add(tokens);
                return true;
            }
            if used.saturating_add(tokens) >= budget {
                dropped += 1;
                return false;
            }
            used += tokens;
            true
        })
        .collect();

    if dropped > 0 {
        debug!(budget, used, dropped, "budget trimmed entries");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        tokens: usize,
        ignore: bool,
    }

    impl Budgeted for Item {
        fn tokens(&self) -> usize {
            self.tokens
        }

        fn ignores_budget(&self) -> bool {
            self.ignore
        }
    }

    fn item(name: &'static str, tokens: usize) -> Item {
        Item {
            name,
            tokens,
            ignore: false,
        }
    }

    fn names(items: &[Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.name).collect()
    }

    #[test]
    fn test_token_budget() {
        assert_eq!(token_budget(1000, 10.0, 0), 100);
        assert_eq!(token_budget(1000, 10.0, 60), 60);
        assert_eq!(token_budget(10, 1.0, 0), 1);
        assert_eq!(token_budget(0, 25.0, 0), 1);
        assert_eq!(token_budget(999, 25.0, 0), 250);
    }

    #[test]
    fn test_third_entry_reaching_budget_is_dropped() {
        let items = vec![item("a", 40), item("b", 40), item("c", 40)];
        let kept = apply_budget(items, 1000, 10.0, 0);
        assert_eq!(names(&kept), vec!["a", "b"]);
    }

    #[test]
    fn test_smaller_entry_after_drop_still_fits() {
        let items = vec![item("a", 60), item("b", 50), item("c", 30)];
        let kept = apply_budget(items, 1000, 10.0, 0);
        assert_eq!(names(&kept), vec!["a", "c"]);
    }

    #[test]
    fn test_ignore_budget_is_kept_and_counted() {
        let mut big = item("big", 500);
        big.ignore = true;
        let items = vec![big, item("a", 10)];
        let kept = apply_budget(items, 1000, 10.0, 0);
        assert_eq!(names(&kept), vec!["big"]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn kept_entries_fit_budget(
                entries in prop::collection::vec((0usize..200, any::<bool>()), 0..30),
                max_context in 1usize..4000,
                percent in 1.0f64..100.0,
                cap in 0usize..500,
            ) {
                let items: Vec<Item> = entries
                    .iter()
                    .map(|(tokens, ignore)| Item { name: "x", tokens: *tokens, ignore: *ignore })
                    .collect();
                let ignored = items.iter().filter(|i| i.ignore).count();
                let budget = token_budget(max_context, percent, cap);

                let kept = apply_budget(items, max_context, percent, cap);

                let spent: usize = kept.iter().filter(|i| !i.ignore).map(|i| i.tokens).sum();
                prop_assert!(spent <= budget);
                prop_assert_eq!(kept.iter().filter(|i| i.ignore).count(), ignored);
            }
        }
    }
}

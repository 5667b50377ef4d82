//! Black-box collaborators the engine reads through narrow interfaces.
//!
//! The engine never owns persisted state: timed effects and after-match
//! flags are read here and any changes are reported back to the caller in
//! the activation result.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use lore_book::LoreEntry;

/// Estimates the token cost of a piece of text.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;
}

/// Rough estimator: one token per `chars_per_token` characters, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    pub chars_per_token: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count();
        chars.div_ceil(self.chars_per_token.max(1))
    }
}

impl<F> TokenEstimator for F
where
    F: Fn(&str) -> usize,
{
    fn estimate(&self, text: &str) -> usize {
        self(text)
    }
}

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn rand(&mut self) -> f64;
}

/// Seedable RNG for reproducible activation.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn rand(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Counts draws so tests can assert the RNG was left untouched.
#[derive(Debug, Clone)]
pub struct FixedRandom {
    values: Vec<f64>,
    draws: usize,
}

impl FixedRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            draws: 0,
        }
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RandomSource for FixedRandom {
    fn rand(&mut self) -> f64 {
        let value = if self.values.is_empty() {
            0.0
        } else {
            self.values[self.draws % self.values.len()]
        };
        self.draws += 1;
        value
    }
}

/// Persisted sticky/cooldown/delay state, owned by the caller.
pub trait TimedEffects {
    fn sticky_active(&self, entry_id: &str) -> bool;
    fn cooldown_active(&self, entry_id: &str) -> bool;
    fn delay_active(&self, entry: &LoreEntry) -> bool;
}

/// No entry has any timed effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimedEffects;

impl TimedEffects for NoTimedEffects {
    fn sticky_active(&self, _entry_id: &str) -> bool {
        false
    }

    fn cooldown_active(&self, _entry_id: &str) -> bool {
        false
    }

    fn delay_active(&self, _entry: &LoreEntry) -> bool {
        false
    }
}

/// Set-backed timed effects, keyed by entry id.
#[derive(Debug, Clone, Default)]
pub struct StaticTimedEffects {
    pub sticky: HashSet<String>,
    pub cooldown: HashSet<String>,
    pub delayed: HashSet<String>,
}

impl StaticTimedEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sticky(mut self, entry_id: impl Into<String>) -> Self {
        self.sticky.insert(entry_id.into());
        self
    }

    pub fn with_cooldown(mut self, entry_id: impl Into<String>) -> Self {
        self.cooldown.insert(entry_id.into());
        self
    }

    pub fn with_delay(mut self, entry_id: impl Into<String>) -> Self {
        self.delayed.insert(entry_id.into());
        self
    }
}

impl TimedEffects for StaticTimedEffects {
    fn sticky_active(&self, entry_id: &str) -> bool {
        self.sticky.contains(entry_id)
    }

    fn cooldown_active(&self, entry_id: &str) -> bool {
        self.cooldown.contains(entry_id)
    }

    fn delay_active(&self, entry: &LoreEntry) -> bool {
        self.delayed.contains(entry.id.as_str())
    }
}

/// Best-effort warning sink. Implementations must never panic.
pub trait Warner {
    /// Report `message` once per distinct `key`.
    fn warn(&self, key: &str, message: &str);
}

/// Logs each distinct warning once through `tracing`.
#[derive(Debug, Default)]
pub struct TracingWarner {
    seen: Mutex<HashSet<String>>,
}

impl TracingWarner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct warnings emitted.
    pub fn emitted(&self) -> usize {
        self.seen.lock().len()
    }
}

impl Warner for TracingWarner {
    fn warn(&self, key: &str, message: &str) {
        if self.seen.lock().insert(key.to_string()) {
            warn!(key, "{message}");
        }
    }
}

/// Persisted per-entry "matched before" flags used by the
/// keep/dont-activate-after-match directives.
pub trait MatchFlags {
    fn get(&self, entry_id: &str) -> Option<bool>;
}

impl MatchFlags for HashMap<String, bool> {
    fn get(&self, entry_id: &str) -> Option<bool> {
        HashMap::get(self, entry_id).copied()
    }
}

/// No flags have been persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMatchFlags;

impl MatchFlags for NoMatchFlags {
    fn get(&self, _entry_id: &str) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_estimator_rounds_up() {
        let estimator = CharRatioEstimator::default();
        assert_eq!(estimator.estimate(""), 0);
        assert_eq!(estimator.estimate("abcd"), 1);
        assert_eq!(estimator.estimate("abcde"), 2);
    }

    #[test]
    fn test_closure_estimator() {
        let words = |text: &str| text.split_whitespace().count();
        assert_eq!(words.estimate("three small words"), 3);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mut a = SeededRandom::new(7);
        let mut b = SeededRandom::new(7);
        for _ in 0..5 {
            let x = a.rand();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.rand());
        }
    }

    #[test]
    fn test_fixed_random_cycles_and_counts() {
        let mut rng = FixedRandom::new(vec![0.25, 0.75]);
        assert_eq!(rng.rand(), 0.25);
        assert_eq!(rng.rand(), 0.75);
        assert_eq!(rng.rand(), 0.25);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn test_static_timed_effects() {
        let effects = StaticTimedEffects::new().with_sticky("a").with_cooldown("b");
        assert!(effects.sticky_active("a"));
        assert!(!effects.sticky_active("b"));
        assert!(effects.cooldown_active("b"));
        assert!(!effects.delay_active(&LoreEntry::new(["x"], "x").with_id("a")));
    }

    #[test]
    fn test_tracing_warner_deduplicates() {
        let warner = TracingWarner::new();
        warner.warn("regex:/a(/", "bad regex");
        warner.warn("regex:/a(/", "bad regex");
        warner.warn("regex:/b(/", "bad regex");
        assert_eq!(warner.emitted(), 2);
    }

    #[test]
    fn test_match_flags_map() {
        let mut flags = HashMap::new();
        flags.insert("e1".to_string(), true);
        assert_eq!(MatchFlags::get(&flags, "e1"), Some(true));
        assert_eq!(MatchFlags::get(&flags, "e2"), None);
        assert_eq!(NoMatchFlags.get("e1"), None);
    }
}

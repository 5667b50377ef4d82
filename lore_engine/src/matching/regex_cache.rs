//! Compiled cache for slash-delimited regex keys (`/pattern/flags`).
//!
//! Keys are written in the JavaScript literal syntax lorebook editors use.
//! The `i`, `m`, `s` and `x` flags map to inline regex flags; `g`, `y`, `u`,
//! `d` and `v` have no effect on a single `is_match` test and are accepted.
//! Patterns the `regex` crate cannot express (lookaround, backreferences)
//! fail to compile and are cached as failures.

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// Default number of distinct literals kept.
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 500;

/// Compiled program size limit for a single key.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Outcome of a cache lookup.
#[derive(Debug, Clone)]
pub enum CachedRegex {
    Compiled(Regex),
    /// The literal was well-formed but did not compile.
    Invalid(String),
}

struct CacheInner {
    entries: HashMap<String, CachedRegex>,
    access_order: Vec<String>,
    hits: u64,
    misses: u64,
}

/// LRU cache of compiled regex literals, shareable across engines.
pub struct RegexCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl std::fmt::Debug for RegexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RegexCache")
            .field("capacity", &self.capacity)
            .field("len", &inner.entries.len())
            .field("hits", &inner.hits)
            .field("misses", &inner.misses)
            .finish()
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_CAPACITY)
    }
}

impl RegexCache {
    /// Create a cache holding at most `capacity` literals (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                access_order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Look up or compile `literal`. Returns `None` when the text is not a
    /// regex literal at all.
    pub fn get(&self, literal: &str) -> Option<CachedRegex> {
        let (pattern, flags) = split_literal(literal)?;

        let mut inner = self.inner.lock();
        if let Some(found) = inner.entries.get(literal).cloned() {
            inner.hits += 1;
            inner.access_order.retain(|k| k != literal);
            inner.access_order.push(literal.to_string());
            return Some(found);
        }
        inner.misses += 1;

        let compiled = match compile(pattern, flags) {
            Ok(regex) => CachedRegex::Compiled(regex),
            Err(err) => CachedRegex::Invalid(err.to_string()),
        };

        while inner.entries.len() >= self.capacity && !inner.access_order.is_empty() {
            let oldest = inner.access_order.remove(0);
            drop(inner.entries.remove(&oldest));
        }
        drop(inner.entries.insert(literal.to_string(), compiled.clone()));
        inner.access_order.push(literal.to_string());

        Some(compiled)
    }

    /// Number of cached literals.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit and miss counters.
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.access_order.clear();
    }
}

/// Whether `text` looks like a `/pattern/flags` literal.
pub fn is_regex_literal(text: &str) -> bool {
    split_literal(text).is_some()
}

/// Split `/pattern/flags` into its parts. The pattern must be non-empty and
/// the flags drawn from the JavaScript flag set.
fn split_literal(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (pattern, flags) = (&rest[..close], &rest[close + 1..]);
    if pattern.is_empty() || !flags.chars().all(|c| "dgimsuvyx".contains(c)) {
        return None;
    }
    Some((pattern, flags))
}

fn compile(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
}

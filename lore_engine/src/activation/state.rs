//! Per-call bookkeeping for the activation loop.

use std::collections::{BTreeMap, HashSet};

use crate::dialect::Active;

/// An evaluated entry waiting to be matched, with its position in the
/// sorted entry list.
#[derive(Debug, Clone)]
pub struct Candidate<'e> {
    /// Index in the sorted entry list; lower sorts first.
    pub index: usize,
    pub active: Active<'e>,
    /// Recursion setting of the book the entry came from.
    pub book_recursive: bool,
}

impl<'e> Candidate<'e> {
    pub fn new(index: usize, active: Active<'e>, book_recursive: bool) -> Self {
        Self {
            index,
            active,
            book_recursive,
        }
    }

    pub fn id(&self) -> &str {
        self.active.id()
    }
}

/// Tracks what has been activated across the passes of one call.
#[derive(Debug, Default)]
pub struct ActivationState<'e> {
    activated: Vec<Candidate<'e>>,
    ids: HashSet<String>,
    failed_probability: HashSet<String>,
    flag_updates: BTreeMap<String, bool>,
}

impl<'e> ActivationState<'e> {
    /// Create a new empty activation state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activated candidate.
    pub fn activate(&mut self, candidate: Candidate<'e>) {
        if self.ids.insert(candidate.id().to_string()) {
            self.activated.push(candidate);
        }
    }

    pub fn is_activated(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Remember that an entry lost its probability roll this call.
    pub fn fail_probability(&mut self, id: &str) {
        self.failed_probability.insert(id.to_string());
    }

    pub fn failed_probability(&self, id: &str) -> bool {
        self.failed_probability.contains(id)
    }

    /// Whether the entry can still be considered this call.
    pub fn is_open(&self, id: &str) -> bool {
        !self.is_activated(id) && !self.failed_probability(id)
    }

    /// Persist that an after-match entry matched this turn.
    pub fn record_match(&mut self, id: &str) {
        self.flag_updates.insert(id.to_string(), true);
    }

    /// Whether any activated entry belongs to `group`.
    pub fn group_has_winner(&self, group: &str) -> bool {
        self.activated
            .iter()
            .any(|c| c.active.groups.iter().any(|g| g == group))
    }

    pub fn activated(&self) -> &[Candidate<'e>] {
        &self.activated
    }

    pub fn len(&self) -> usize {
        self.activated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activated.is_empty()
    }

    /// Consume the state into activated candidates and flag updates.
    pub fn finish(self) -> (Vec<Candidate<'e>>, BTreeMap<String, bool>) {
        (self.activated, self.flag_updates)
    }
}

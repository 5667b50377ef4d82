//! Scan-state machine and pass scheduling for recursive scanning.

use crate::dialect::Active;
use crate::scan::PassKind;

/// Upper bound on passes per call, whatever the configuration says.
pub const HARD_PASS_LIMIT: usize = 1000;

/// Whether an entry takes part in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Eligible,
    /// Waiting for a deeper recursion level.
    Delayed,
    /// Opted out of recursive passes.
    Excluded,
}

/// Scan state of `active` for a pass at recursion level `depth`.
///
/// Initial and minimum-activation passes count as non-recursive.
pub fn scan_state(active: &Active<'_>, pass: PassKind, depth: u32) -> ScanState {
    if !pass.is_recursive() {
        return match active.delay_until_recursion {
            Some(level) if level > depth => ScanState::Delayed,
            _ => ScanState::Eligible,
        };
    }

    if active.exclude_recursion {
        return ScanState::Excluded;
    }
    match active.delay_until_recursion {
        Some(level) if level > depth => ScanState::Delayed,
        _ => ScanState::Eligible,
    }
}

/// Decides what runs after each pass.
#[derive(Debug, Clone)]
pub struct RecursionController {
    max_passes: usize,
    min_activations: usize,
    /// Depth at which minimum-activation passes stop widening.
    min_depth_limit: usize,
    passes: usize,
    depth: u32,
    pass: PassKind,
}

/// What happened in the pass just finished.
#[derive(Debug, Clone, Copy)]
pub struct PassOutcome {
    /// Entries activated by this pass.
    pub activated: usize,
    /// Entries whose content was added to the recursion buffer.
    pub fed_recursion: usize,
    /// Entries activated so far this call.
    pub total_activated: usize,
    /// Scan depth currently in effect.
    pub scan_depth: usize,
    /// Lowest delay level above the current depth still waiting, when
    /// recursion is enabled at all.
    pub pending_delay: Option<u32>,
}

impl RecursionController {
    /// `max_passes` of 0 means no configured limit.
    pub fn new(max_passes: usize, min_activations: usize, min_depth_limit: usize) -> Self {
        let max_passes = if max_passes == 0 {
            HARD_PASS_LIMIT
        } else {
            max_passes.min(HARD_PASS_LIMIT)
        };
        Self {
            max_passes,
            min_activations,
            min_depth_limit,
            passes: 0,
            depth: 0,
            pass: PassKind::Initial,
        }
    }

    /// Kind of the pass about to run.
    pub fn pass(&self) -> PassKind {
        self.pass
    }

    /// Current recursion level.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Record a finished pass and pick the next one. `None` halts.
    pub fn next(&mut self, outcome: PassOutcome) -> Option<PassKind> {
        self.passes += 1;
        if self.passes >= self.max_passes {
            return None;
        }

        if outcome.activated > 0 && outcome.fed_recursion > 0 {
            self.depth += 1;
            self.pass = PassKind::Recursion;
            return Some(self.pass);
        }

        if let Some(level) = outcome.pending_delay.filter(|level| *level > self.depth) {
            self.depth = level;
            self.pass = PassKind::Recursion;
            return Some(self.pass);
        }

        if self.min_activations > 0
            && outcome.total_activated < self.min_activations
            && outcome.scan_depth < self.min_depth_limit
        {
            self.pass = PassKind::MinActivations;
            return Some(self.pass);
        }

        None
    }
}

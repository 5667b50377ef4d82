//! Activation engine - decides which lore entries apply to the current turn.
//!
//! One call to [`LoreEngine::activate`] works as follows:
//! 1. **Sort**: Merge all books into evaluation order
//! 2. **Evaluate**: Let the dialect turn each entry into a candidate
//! 3. **Scan**: Match candidates against the scan buffer, pass after pass,
//!    feeding activated content back in while recursion is on
//! 4. **Resolve**: Keep at most one winner per inclusion group
//! 5. **Order**: Sort by priority and trim to the token budget
//! 6. **Shape**: Merge injects and pull out outlet content

mod budget;
mod groups;
mod output;
mod recursion;
mod sort;
mod state;

pub use budget::*;
pub use groups::*;
pub use output::*;
pub use recursion::*;
pub use sort::*;
pub use state::*;

use std::collections::HashSet;
use std::sync::Arc;

use lore_book::{BookSet, InsertionStrategy, ScanContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::collaborators::{
    CharRatioEstimator, MatchFlags, RandomSource, TimedEffects, TokenEstimator, TracingWarner,
    Warner,
};
use crate::dialect::{Active, DirectiveEvaluator, EvalContext, ForceState, MatchDefaults};
use crate::error::{ConfigError, Result};
use crate::matching::{score, Matcher, RegexCache, DEFAULT_REGEX_CACHE_CAPACITY};
use crate::scan::{PassKind, ScanBuffer, MAX_SCAN_DEPTH};

/// Configuration for activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Messages scanned when an entry does not override it.
    pub scan_depth: usize,

    /// Share of the context window available to lore, in percent.
    pub budget_percent: f64,

    /// Absolute token cap; 0 disables it.
    pub budget_cap: i64,

    /// Feed activated content into further passes.
    pub recursive: bool,

    /// Maximum number of passes; 0 means no limit beyond [`HARD_PASS_LIMIT`].
    pub max_recursion_steps: usize,

    pub case_sensitive: bool,

    pub match_whole_words: bool,

    /// Break group ties by match score.
    pub use_group_scoring: bool,

    pub insertion_strategy: InsertionStrategy,

    /// Keep widening the scan until this many entries are active.
    pub min_activations: usize,

    /// Depth where minimum-activation widening stops; 0 means the chat length.
    pub min_activations_depth_max: usize,

    pub regex_cache_capacity: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            scan_depth: 2,
            budget_percent: 25.0,
            budget_cap: 0,
            recursive: false,
            max_recursion_steps: 0,
            case_sensitive: false,
            match_whole_words: false,
            use_group_scoring: false,
            insertion_strategy: InsertionStrategy::CharacterLoreFirst,
            min_activations: 0,
            min_activations_depth_max: 0,
            regex_cache_capacity: DEFAULT_REGEX_CACHE_CAPACITY,
        }
    }
}

impl ActivationConfig {
    /// Parse and validate a TOML configuration. Missing keys take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject misconfiguration before any pass runs.
    pub fn validate(&self) -> Result<()> {
        if !(self.budget_percent > 0.0 && self.budget_percent <= 100.0) {
            return Err(ConfigError::BudgetPercent(self.budget_percent));
        }
        if self.budget_cap < 0 {
            return Err(ConfigError::NegativeBudgetCap(self.budget_cap));
        }
        if self.regex_cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "regex_cache_capacity must be positive".to_string(),
            ));
        }
        if self.scan_depth > MAX_SCAN_DEPTH {
            return Err(ConfigError::InvalidValue(format!(
                "scan_depth {} exceeds {}",
                self.scan_depth, MAX_SCAN_DEPTH
            )));
        }
        Ok(())
    }

    fn match_defaults(&self) -> MatchDefaults {
        MatchDefaults {
            case_sensitive: self.case_sensitive,
            whole_word: self.match_whole_words,
        }
    }
}

/// Inputs describing the current turn.
#[derive(Debug, Clone, Copy)]
pub struct ActivationRequest<'a> {
    pub books: &'a BookSet,
    /// Chat messages, oldest first.
    pub messages: &'a [String],
    pub context: &'a ScanContext,
    /// Extra text scanned on every pass.
    pub injects: &'a [String],
    /// Context window of the model, in tokens.
    pub max_context: usize,
}

/// Per-call mutable and persisted state owned by the caller.
pub struct Collaborators<'c> {
    pub rng: &'c mut dyn RandomSource,
    pub effects: &'c dyn TimedEffects,
    pub match_flags: &'c dyn MatchFlags,
}

/// The activation engine, parameterized over a rule dialect.
pub struct LoreEngine<D> {
    config: ActivationConfig,
    dialect: D,
    cache: Arc<RegexCache>,
    estimator: Arc<dyn TokenEstimator>,
    warner: Arc<dyn Warner>,
}

impl<D: DirectiveEvaluator> LoreEngine<D> {
    /// Create an engine after validating `config`.
    pub fn new(config: ActivationConfig, dialect: D) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: Arc::new(RegexCache::new(config.regex_cache_capacity)),
            config,
            dialect,
            estimator: Arc::new(CharRatioEstimator::default()),
            warner: Arc::new(TracingWarner::new()),
        })
    }

    /// Create an engine with the default configuration.
    pub fn with_defaults(dialect: D) -> Self {
        let config = ActivationConfig::default();
        Self {
            cache: Arc::new(RegexCache::new(config.regex_cache_capacity)),
            config,
            dialect,
            estimator: Arc::new(CharRatioEstimator::default()),
            warner: Arc::new(TracingWarner::new()),
        }
    }

    /// Share a regex cache with other engines.
    pub fn with_regex_cache(mut self, cache: Arc<RegexCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Arc::new(estimator);
        self
    }

    pub fn with_warner(mut self, warner: Arc<dyn Warner>) -> Self {
        self.warner = warner;
        self
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        &self.cache
    }

    /// Run every scan pass for one turn and return the activated entries.
    pub fn activate<'b>(
        &self,
        request: ActivationRequest<'b>,
        collaborators: Collaborators<'_>,
    ) -> Activation<'b> {
        let Collaborators {
            rng,
            effects,
            match_flags,
        } = collaborators;
        let config = &self.config;

        let candidates = self.evaluate(&request, match_flags);
        let recursion_enabled = config.recursive
            || candidates
                .iter()
                .any(|c| c.book_recursive || c.active.recursive_override == Some(true));

        let mut buffer = ScanBuffer::new(request.messages, request.context, config.scan_depth);
        for inject in request.injects {
            buffer.add_inject(inject.clone());
        }

        let matcher = Matcher::new(&self.cache, self.warner.as_ref());
        let resolver = GroupResolver::new(effects, config.use_group_scoring);
        let min_depth_limit = if config.min_activations_depth_max > 0 {
            config.min_activations_depth_max
        } else {
            buffer.len()
        };
        let mut controller = RecursionController::new(
            config.max_recursion_steps,
            config.min_activations,
            min_depth_limit,
        );
        let mut state = ActivationState::new();

        debug!(
            dialect = self.dialect.name(),
            candidates = candidates.len(),
            messages = buffer.len(),
            "starting activation"
        );

        loop {
            let pass = controller.pass();
            let depth = controller.depth();

            let mut matched = Vec::new();
            let mut key_matches: HashSet<&str> = HashSet::new();
            for candidate in &candidates {
                if !state.is_open(candidate.id()) {
                    continue;
                }
                let Some(by_keys) =
                    self.decide(&candidate.active, pass, depth, &buffer, &matcher, effects)
                else {
                    continue;
                };
                if by_keys && candidate.active.tracks_match() {
                    key_matches.insert(candidate.id());
                }
                matched.push(candidate.clone());
            }
            let considered = matched.len();

            let resolved = resolver.resolve(
                matched,
                |group| state.group_has_winner(group),
                rng,
                |active| {
                    let text = buffer.get(active.scan_depth, &active.scope, pass);
                    score(
                        &matcher,
                        &text,
                        &active.keys,
                        &active.secondary_keys,
                        active.entry.extensions.selective_logic,
                        active.match_options(),
                    )
                },
            );

            let mut activated = 0;
            let mut fed_recursion = 0;
            for candidate in resolved {
                let id = candidate.id();
                if let Some(chance) = candidate.active.probability {
                    if !effects.sticky_active(id) {
                        let roll = rng.rand() * 100.0;
                        if roll >= chance {
                            trace!(entry = id, roll, chance, "probability check failed");
                            state.fail_probability(id);
                            continue;
                        }
                    }
                }

                if key_matches.contains(id) {
                    state.record_match(id);
                }
                if candidate
                    .active
                    .feeds_recursion(candidate.book_recursive || config.recursive)
                    && !candidate.active.content.is_empty()
                {
                    buffer.add_recurse(&candidate.active.content);
                    fed_recursion += 1;
                }
                activated += 1;
                state.activate(candidate);
            }

            debug!(?pass, depth, considered, activated, fed_recursion, "scan pass");

            let pending_delay = if recursion_enabled {
                candidates
                    .iter()
                    .filter(|c| state.is_open(c.id()))
                    .filter_map(|c| c.active.delay_until_recursion)
                    .filter(|level| *level > depth)
                    .min()
            } else {
                None
            };

            let outcome = PassOutcome {
                activated,
                fed_recursion,
                total_activated: state.len(),
                scan_depth: buffer.depth(),
                pending_delay,
            };
            match controller.next(outcome) {
                Some(_) => buffer.advance_scan(),
                None => break,
            }
        }

        let passes = controller.passes();
        let (mut activated, flag_updates) = state.finish();
        activated.sort_by(|a, b| {
            b.active
                .priority
                .cmp(&a.active.priority)
                .then_with(|| a.index.cmp(&b.index))
        });
        let entries: Vec<Active<'b>> = activated.into_iter().map(|c| c.active).collect();

        let before_budget = entries.len();
        let entries = apply_budget(
            entries,
            request.max_context,
            config.budget_percent,
            self.budget_cap(request.books),
        );
        let entries = merge_injects(entries, self.estimator.as_ref());
        let (entries, outlets) = extract_outlets(entries);

        debug!(
            passes,
            activated = before_budget,
            kept = entries.len(),
            outlets = outlets.len(),
            "activation finished"
        );

        Activation {
            entries,
            outlets,
            flag_updates,
            passes,
        }
    }

    /// Evaluate every entry once, in sorted order.
    fn evaluate<'b>(
        &self,
        request: &ActivationRequest<'b>,
        match_flags: &dyn MatchFlags,
    ) -> Vec<Candidate<'b>> {
        let sorted = sort_book_set(request.books, self.config.insertion_strategy);
        let defaults = self.config.match_defaults();

        sorted
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let ctx = EvalContext {
                    book: item.source,
                    book_label: item.book.name.as_deref().unwrap_or(item.source.label()),
                    book_scan_depth: item.book.scan_depth,
                    chat_length: request.messages.len(),
                    defaults,
                    estimator: self.estimator.as_ref(),
                    match_flags,
                };
                let active = self.dialect.evaluate(item.entry, &ctx)?;
                Some(Candidate::new(index, active, item.book.recursive_scanning))
            })
            .collect()
    }

    /// Whether a candidate activates in this pass. `Some(true)` means its
    /// keys matched; `Some(false)` means it activated without matching.
    fn decide(
        &self,
        active: &Active<'_>,
        pass: PassKind,
        depth: u32,
        buffer: &ScanBuffer<'_>,
        matcher: &Matcher<'_>,
        effects: &dyn TimedEffects,
    ) -> Option<bool> {
        let id = active.id();
        if effects.delay_active(active.entry) {
            trace!(entry = id, "delayed by timed effect");
            return None;
        }
        let sticky = effects.sticky_active(id);
        if effects.cooldown_active(id) && !sticky {
            trace!(entry = id, "on cooldown");
            return None;
        }
        let scan = scan_state(active, pass, depth);
        if scan != ScanState::Eligible && !sticky {
            trace!(entry = id, ?scan, "skipped this pass");
            return None;
        }

        match active.force_state {
            ForceState::Deactivate => return None,
            ForceState::Activate => return Some(false),
            ForceState::None => {}
        }
        if active.is_constant() || sticky {
            return Some(false);
        }

        let text = buffer.get(active.scan_depth, &active.scope, pass);
        matcher
            .matches_entry(&text, &active.keys, &active.search_queries, active.match_options())
            .then_some(true)
    }

    /// Configured cap, else the smallest budget any book asks for.
    fn budget_cap(&self, books: &BookSet) -> usize {
        if self.config.budget_cap > 0 {
            return usize::try_from(self.config.budget_cap).unwrap_or(usize::MAX);
        }
        books.token_budget().unwrap_or(0)
    }
}

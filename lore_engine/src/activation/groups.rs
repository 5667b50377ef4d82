//! Inclusion-group resolution: at most one winner per group per pass.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use super::state::Candidate;
use crate::collaborators::{RandomSource, TimedEffects};
use crate::dialect::Active;

/// Resolves inclusion groups among the candidates matched in one pass.
pub struct GroupResolver<'a> {
    effects: &'a dyn TimedEffects,
    use_group_scoring: bool,
}

impl<'a> GroupResolver<'a> {
    pub fn new(effects: &'a dyn TimedEffects, use_group_scoring: bool) -> Self {
        Self {
            effects,
            use_group_scoring,
        }
    }

    /// Drop losing group members from `candidates`, keeping input order.
    ///
    /// `prior_winner` reports whether a group already produced a winner in an
    /// earlier pass. `score` rates a member's match strength.
    pub fn resolve<'e>(
        &self,
        candidates: Vec<Candidate<'e>>,
        prior_winner: impl Fn(&str) -> bool,
        rng: &mut dyn RandomSource,
        score: impl Fn(&Active<'e>) -> usize,
    ) -> Vec<Candidate<'e>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (position, candidate) in candidates.iter().enumerate() {
            for group in &candidate.active.groups {
                groups.entry(group.as_str()).or_default().push(position);
            }
        }
        if groups.is_empty() {
            return candidates;
        }

        let mut removed: HashSet<usize> = HashSet::new();
        for (name, members) in &groups {
            let members: Vec<usize> = members
                .iter()
                .copied()
                .filter(|m| !removed.contains(m))
                .collect();
            if members.is_empty() {
                continue;
            }
            let survivors =
                self.resolve_group(name, &members, &candidates, &prior_winner, rng, &score);
            removed.extend(members.into_iter().filter(|m| !survivors.contains(m)));
        }

        candidates
            .into_iter()
            .enumerate()
            .filter(|(position, _)| !removed.contains(position))
            .map(|(_, candidate)| candidate)
            .collect()
    }

    fn resolve_group<'e>(
        &self,
        name: &str,
        members: &[usize],
        candidates: &[Candidate<'e>],
        prior_winner: &impl Fn(&str) -> bool,
        rng: &mut dyn RandomSource,
        score: &impl Fn(&Active<'e>) -> usize,
    ) -> Vec<usize> {
        let active = |m: usize| &candidates[m].active;

        let sticky: Vec<usize> = members
            .iter()
            .copied()
            .filter(|m| self.effects.sticky_active(active(*m).id()))
            .collect();
        if !sticky.is_empty() {
            debug!(group = name, sticky = sticky.len(), "sticky group");
            return sticky;
        }

        let mut members: Vec<usize> = members
            .iter()
            .copied()
            .filter(|m| {
                let member = active(*m);
                !self.effects.cooldown_active(member.id())
                    && !self.effects.delay_active(member.entry)
            })
            .collect();

        let scoring = self.use_group_scoring
            || members
                .iter()
                .any(|m| active(*m).uses_group_scoring(self.use_group_scoring));
        if scoring && members.len() > 1 {
            let scores: Vec<(usize, usize)> =
                members.iter().map(|m| (*m, score(active(*m)))).collect();
            let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
            members.retain(|m| {
                let member = active(*m);
                let member_score = scores
                    .iter()
                    .find(|(position, _)| position == m)
                    .map_or(0, |(_, s)| *s);
                !member.uses_group_scoring(self.use_group_scoring) || member_score >= max
            });
            trace!(group = name, max, kept = members.len(), "group scoring");
        }

        if prior_winner(name) {
            debug!(group = name, "group already has a winner this turn");
            return Vec::new();
        }

        if members.len() <= 1 {
            return members;
        }

        let overrides: Vec<usize> = members
            .iter()
            .copied()
            .filter(|m| active(*m).group_override())
            .collect();
        if let Some(winner) = overrides.into_iter().min_by(|a, b| {
            let (a, b) = (active(*a), active(*b));
            b.order.cmp(&a.order).then_with(|| a.id().cmp(b.id()))
        }) {
            debug!(group = name, winner = active(winner).id(), "group override");
            return vec![winner];
        }

        let total: u64 = members.iter().map(|m| u64::from(active(*m).group_weight())).sum();
        let roll = rng.rand() * total as f64;
        let mut cumulative = 0u64;
        let winner = members
            .iter()
            .copied()
            .find(|m| {
                cumulative += u64::from(active(*m).group_weight());
                cumulative as f64 >= roll
            })
            .or_else(|| members.last().copied());

        match winner {
            Some(winner) => {
                debug!(group = name, winner = active(winner).id(), roll, total, "group roll");
                vec![winner]
            }
            None => Vec::new(),
        }
    }
}

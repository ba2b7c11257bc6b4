//! Queue builders: store state in, deduplicated priority work queue out.
//!
//! The full build scans the whole store — discovery of referenced-but-unknown
//! wrestlers, stale profiles, match-year refreshes, the gender-ambiguous
//! watch list, and promotions. The filtered build runs the same machinery
//! restricted to a caller-supplied id set and skips every expanding pass, so
//! a targeted run cannot grow the frontier.
//!
//! Builders only read; nothing here talks to the network. The queue is
//! rebuilt from scratch each run and holds no cross-run state.

use std::collections::BTreeSet;

use tracing::info;

use super::priority::{
    discovery_priority_with, match_refresh_priority, profile_refresh_priority,
    promotion_refresh_priority, watch_match_priority, PRIORITY_SKIP,
};
use super::queue::{Operation, WorkItem, WorkQueue};
use super::staleness::StalenessPolicy;
use crate::confidence::ConfidenceProvider;
use crate::db::Store;

/// Store + policy bundle answering "does this need fetching" questions.
pub struct Freshness<'a, S: Store> {
    store: &'a S,
    policy: StalenessPolicy,
}

impl<'a, S: Store> Freshness<'a, S> {
    pub fn new(store: &'a S, policy: StalenessPolicy) -> Self {
        Self { store, policy }
    }

    pub fn profile_is_stale(&self, id: i64) -> bool {
        let timestamp = self.store.profile_timestamp(id);
        self.policy
            .profile_is_stale(timestamp, self.store.is_female(id))
    }

    /// Matches in either of the two preceding years.
    pub fn is_recently_active(&self, id: i64) -> bool {
        let years = self.store.available_years(id);
        let year = self.policy.current_year;
        years.contains(&(year - 1)) || years.contains(&(year - 2))
    }

    /// `on_watch_list` bypasses the roster check and activity gating; the
    /// wrestler's classification depends on fresh opponent data.
    pub fn matches_need_refresh(&self, id: i64, year: i32, on_watch_list: bool) -> bool {
        let is_roster = self.store.is_female(id) || on_watch_list;
        let is_active = self.is_recently_active(id) || on_watch_list;
        let timestamp = self.store.matches_timestamp(id, year);
        self.policy
            .matches_are_stale(timestamp, year, is_roster, is_active)
    }

    /// Stale years with their urgency tiers, most urgent first.
    pub fn stale_match_years(&self, id: i64) -> Vec<(i32, i32)> {
        if !self.store.is_female(id) {
            return Vec::new();
        }
        let is_active = self.is_recently_active(id);
        let mut stale: Vec<(i32, i32)> = self
            .store
            .available_years(id)
            .into_iter()
            .filter(|&year| self.matches_need_refresh(id, year, false))
            .map(|year| (year, self.policy.match_year_priority(year, true, is_active)))
            .collect();
        stale.sort_by_key(|&(year, priority)| (priority, year));
        stale
    }

    /// Importance in [0, 1] from activity over the two preceding years:
    /// match volume weighted over opponent diversity.
    pub fn importance(&self, id: i64) -> f64 {
        let mut total_matches = 0u32;
        let mut opponents: BTreeSet<i64> = BTreeSet::new();
        for year in [self.policy.current_year - 1, self.policy.current_year - 2] {
            let info = self.store.match_info(id, year);
            total_matches += info.match_count;
            opponents.extend(info.opponents);
        }
        let match_score = (f64::from(total_matches) / 100.0).min(1.0);
        let opponent_score = (opponents.len() as f64 / 50.0).min(1.0);
        match_score * 0.6 + opponent_score * 0.4
    }
}

/// Three or more stale years collapse into one fetch-everything task, to
/// bound the request count per wrestler and session.
const ALL_YEARS_THRESHOLD: usize = 3;

pub struct QueueBuilder<'a, S: Store, P: ConfidenceProvider + ?Sized> {
    store: &'a S,
    confidence: &'a P,
    fresh: Freshness<'a, S>,
    policy: StalenessPolicy,
    in_transition: bool,
    filter: Option<BTreeSet<i64>>,
    force: bool,
}

impl<'a, S: Store, P: ConfidenceProvider + ?Sized> QueueBuilder<'a, S, P> {
    pub fn new(
        store: &'a S,
        confidence: &'a P,
        policy: StalenessPolicy,
        in_transition: bool,
    ) -> Self {
        Self {
            store,
            confidence,
            fresh: Freshness::new(store, policy),
            policy,
            in_transition,
            filter: None,
            force: false,
        }
    }

    /// Restrict to the given ids: no discovery, no non-roster profiles, no
    /// watch list, no promotions.
    pub fn with_filter(mut self, ids: BTreeSet<i64>) -> Self {
        self.filter = Some(ids);
        self
    }

    /// Bypass staleness checks entirely.
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    fn target_wrestlers(&self) -> Vec<i64> {
        let roster = self.store.female_ids();
        match &self.filter {
            Some(filter) => roster.into_iter().filter(|id| filter.contains(id)).collect(),
            None => roster,
        }
    }

    pub fn build(&self) -> WorkQueue {
        let mut queue = WorkQueue::new();
        let year = self.policy.current_year;

        // 1. Discovery: referenced but never fetched. Connection count sets
        // the base priority; the confidence signal rescales it.
        if self.filter.is_none() {
            for (id, referers) in self.store.missing_referenced() {
                queue.enqueue(WorkItem {
                    priority: discovery_priority_with(referers.len(), id, self.confidence),
                    id,
                    operation: Operation::RefreshProfile,
                    year: None,
                });
            }
        }

        // 2. Stale roster profiles.
        for id in self.target_wrestlers() {
            if self.force || self.fresh.profile_is_stale(id) {
                queue.enqueue(WorkItem {
                    priority: profile_refresh_priority(true),
                    id,
                    operation: Operation::RefreshProfile,
                    year: None,
                });
            }
        }

        // 3. Stale non-roster profiles, on the long cycle.
        if self.filter.is_none() {
            for id in self.store.all_ids() {
                if !self.store.is_female(id) && (self.force || self.fresh.profile_is_stale(id)) {
                    queue.enqueue(WorkItem {
                        priority: profile_refresh_priority(false),
                        id,
                        operation: Operation::RefreshProfile,
                        year: None,
                    });
                }
            }
        }

        // 4. Missing current year, active roster wrestlers only.
        for id in self.target_wrestlers() {
            let years = self.store.available_years(id);
            if !years.contains(&year) || self.force {
                let priority = match_refresh_priority(
                    year,
                    year,
                    self.fresh.is_recently_active(id),
                    self.fresh.importance(id),
                    self.in_transition,
                );
                if self.force || priority < PRIORITY_SKIP {
                    queue.enqueue(WorkItem {
                        priority,
                        id,
                        operation: Operation::RefreshMatchYear,
                        year: Some(year),
                    });
                }
            }
        }

        // 5. Watch list: current year regardless of activity gating.
        if self.filter.is_none() {
            for id in self.store.gender_ambiguous_ids() {
                let years = self.store.available_years(id);
                let missing = !years.contains(&year);
                if missing || self.force || self.fresh.matches_need_refresh(id, year, true) {
                    queue.enqueue(WorkItem {
                        priority: watch_match_priority(self.fresh.importance(id), self.in_transition),
                        id,
                        operation: Operation::RefreshMatchYear,
                        year: Some(year),
                    });
                }
            }
        }

        // 6 & 7. Previous year, then the stale backlog.
        for id in self.target_wrestlers() {
            let years = self.store.available_years(id);
            let is_active = self.fresh.is_recently_active(id);
            let importance = self.fresh.importance(id);

            if !years.contains(&(year - 1)) || self.force {
                queue.enqueue(WorkItem {
                    priority: match_refresh_priority(
                        year - 1,
                        year,
                        is_active,
                        importance,
                        self.in_transition,
                    ),
                    id,
                    operation: Operation::RefreshMatchYear,
                    year: Some(year - 1),
                });
            }

            let stale = if self.force {
                years
                    .iter()
                    .filter(|&&y| y != year && y != year - 1)
                    .map(|&y| (y, self.policy.match_year_priority(y, true, is_active)))
                    .collect()
            } else {
                self.fresh.stale_match_years(id)
            };

            if stale.len() >= ALL_YEARS_THRESHOLD {
                // one paged fetch covers every year; take the best priority
                let best = stale.iter().map(|&(_, p)| p).min().unwrap_or(PRIORITY_SKIP);
                queue.enqueue(WorkItem {
                    priority: best,
                    id,
                    operation: Operation::RefreshAllMatches,
                    year: None,
                });
            } else {
                for (stale_year, priority) in stale {
                    queue.enqueue(WorkItem {
                        priority,
                        id,
                        operation: Operation::RefreshMatchYear,
                        year: Some(stale_year),
                    });
                }
            }
        }

        // 8. Promotions, ranked by how often stored matches reference them.
        if self.filter.is_none() {
            for (id, references) in self.store.promotion_references() {
                if self.force
                    || self
                        .policy
                        .promotion_is_stale(self.store.promotion_timestamp(id))
                {
                    queue.enqueue(WorkItem {
                        priority: promotion_refresh_priority(references),
                        id,
                        operation: Operation::RefreshPromotion,
                        year: None,
                    });
                }
            }
        }

        info!("built work queue with {} items", queue.len());
        queue
    }
}

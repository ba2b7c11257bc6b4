//! Staleness policy: when stored data is old enough to re-fetch.
//!
//! Thresholds are tiered by entity kind and recency. Roster (female) wrestler
//! profiles cycle on 90 days, everyone else on 365. Match years refresh far
//! more eagerly for the current year than for history, and never at all for
//! wrestlers outside the roster — their match lists are reached through roster
//! wrestlers' pages anyway. A timestamp of zero means never fetched and is
//! always stale.

const DAY: i64 = 86_400;
const DAYS_14: i64 = 14 * DAY;
const DAYS_90: i64 = 90 * DAY;
const DAYS_180: i64 = 180 * DAY;
const DAYS_365: i64 = 365 * DAY;

/// Pure staleness checks, pinned to a reference clock and year so scheduling
/// runs are reproducible and tests need no wall clock.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    pub now: i64,
    pub current_year: i32,
}

impl StalenessPolicy {
    pub fn new(now: i64, current_year: i32) -> Self {
        Self { now, current_year }
    }

    /// Profile refresh: 90 days for roster wrestlers, 365 otherwise.
    pub fn profile_is_stale(&self, timestamp: i64, is_roster: bool) -> bool {
        if timestamp == 0 {
            return true;
        }
        let threshold = if is_roster { DAYS_90 } else { DAYS_365 };
        self.now - timestamp > threshold
    }

    /// Match-year refresh.
    ///
    /// Current year: 14 days, active wrestlers only — an inactive wrestler's
    /// current year is never fetched. Previous year: 90 days. Historical:
    /// 180 days while active, 365 once inactive. Non-roster wrestlers: never.
    pub fn matches_are_stale(
        &self,
        timestamp: i64,
        year: i32,
        is_roster: bool,
        is_active: bool,
    ) -> bool {
        if !is_roster {
            return false;
        }
        if timestamp == 0 {
            return true;
        }
        let age = self.now - timestamp;
        if year == self.current_year {
            if !is_active {
                return false;
            }
            age > DAYS_14
        } else if year == self.current_year - 1 {
            age > DAYS_90
        } else {
            let threshold = if is_active { DAYS_180 } else { DAYS_365 };
            age > threshold
        }
    }

    /// Promotions change rarely; yearly refresh.
    pub fn promotion_is_stale(&self, timestamp: i64) -> bool {
        timestamp == 0 || self.now - timestamp > DAYS_365
    }

    /// Urgency tier for a stale match year (0-100, lower is more urgent).
    /// Used to rank already-known stale years against each other.
    pub fn match_year_priority(&self, year: i32, is_roster: bool, is_active: bool) -> i32 {
        if !is_roster {
            return 99;
        }
        if !is_active {
            return if year == self.current_year {
                99
            } else if year >= self.current_year - 2 {
                80
            } else {
                80 + (self.current_year - year).min(19)
            };
        }
        if year == self.current_year {
            10
        } else if year == self.current_year - 1 {
            30
        } else {
            (50 + (self.current_year - year)).min(99)
        }
    }
}

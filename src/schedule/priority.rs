//! Priority calculation for the fetch work queue.
//!
//! Scale is 0-100 with lower numbers more urgent; 999 means "do not
//! schedule". Discovery priority starts from a step function of how connected
//! the unknown wrestler is, then the gender-confidence score rescales it:
//! high confidence compresses toward the urgent band, low confidence floors
//! into a heavily deprioritized band, and the mid range leaves the base
//! untouched. The rescaling is monotone — raising confidence never worsens a
//! priority. Importance (recent activity volume) shaves at most five points.
//!
//! During the first two weeks of January the current and previous year swap
//! urgency: the previous year has just become finalizable while the new year
//! holds almost nothing.

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::confidence::ConfidenceProvider;

pub const PRIORITY_URGENT: i32 = 1;
pub const PRIORITY_HIGH: i32 = 10;
pub const PRIORITY_NORMAL: i32 = 30;
pub const PRIORITY_LOW: i32 = 50;
/// Effectively unschedulable; queue builders drop items at or above this.
pub const PRIORITY_SKIP: i32 = 999;

/// First two weeks of January.
pub fn in_transition_window(today: NaiveDate) -> bool {
    today.month() == 1 && today.day() <= 14
}

/// Shave up to five points for important wrestlers, never below 1.
pub fn adjust_for_importance(base: i32, importance: f64) -> i32 {
    let boost = (importance.clamp(0.0, 1.0) * 5.0) as i32;
    (base - boost).max(1)
}

/// Base priority for a newly discovered wrestler, from connection count.
pub fn discovery_base(n_connections: usize) -> i32 {
    if n_connections >= 20 {
        PRIORITY_URGENT
    } else if n_connections >= 10 {
        PRIORITY_HIGH
    } else {
        PRIORITY_NORMAL + 10 - n_connections as i32
    }
}

/// Discovery priority with optional gender-confidence rescaling.
///
/// `None` (no signal, or the provider failed) leaves the base untouched.
pub fn discovery_priority(n_connections: usize, confidence: Option<f64>) -> i32 {
    let base = discovery_base(n_connections);
    let Some(c) = confidence else {
        return base;
    };
    if c >= 0.9 {
        // almost certainly roster: compress into the urgent band
        (base * 3 / 10).max(1)
    } else if c >= 0.75 {
        (base - 3).max(1)
    } else if c >= 0.4 {
        base
    } else {
        // almost certainly not roster: floor into the deprioritized band
        (70 + base / 2).min(95)
    }
}

/// Discovery priority, consulting a confidence provider. A provider error is
/// caught here and degrades to the unmodified base — a flaky signal must never
/// abort a scheduling run.
pub fn discovery_priority_with<P: ConfidenceProvider + ?Sized>(
    n_connections: usize,
    id: i64,
    provider: &P,
) -> i32 {
    let confidence = match provider.confidence(id) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("{} | confidence provider failed: {:#}", id, e);
            None
        }
    };
    discovery_priority(n_connections, confidence)
}

/// Priority for refreshing a stale profile.
pub fn profile_refresh_priority(is_roster: bool) -> i32 {
    if is_roster {
        PRIORITY_HIGH
    } else {
        PRIORITY_NORMAL
    }
}

/// Priority for refreshing one match year.
pub fn match_refresh_priority(
    year: i32,
    current_year: i32,
    is_active: bool,
    importance: f64,
    in_transition: bool,
) -> i32 {
    if year == current_year {
        if !is_active {
            return PRIORITY_SKIP;
        }
        let base = if in_transition {
            PRIORITY_LOW
        } else {
            PRIORITY_HIGH
        };
        adjust_for_importance(base, importance)
    } else if year == current_year - 1 {
        if in_transition {
            adjust_for_importance(PRIORITY_HIGH, importance)
        } else {
            PRIORITY_NORMAL
        }
    } else {
        (PRIORITY_LOW + (current_year - year)).min(99)
    }
}

/// Current-year priority for watch-list wrestlers (ambiguous roster
/// membership). Checked regardless of activity, since their classification
/// depends on fresh opponent data.
pub fn watch_match_priority(importance: f64, in_transition: bool) -> i32 {
    let base = if in_transition {
        PRIORITY_LOW
    } else {
        PRIORITY_HIGH
    };
    adjust_for_importance(base, importance)
}

/// Promotion refreshes rank by how often the promotion shows up in stored
/// matches.
pub fn promotion_refresh_priority(reference_count: u32) -> i32 {
    if reference_count >= 100 {
        20
    } else if reference_count >= 25 {
        40
    } else {
        60
    }
}

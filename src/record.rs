//! The durable match record format.
//!
//! `MatchRecord` is the interchange format between extraction and storage: the
//! parser emits it, the store persists it as JSON, and every downstream
//! consumer (ranking, network graphs, reports) reads it back. The format
//! carries a version tag so consumers can detect drift; bump `RECORD_VERSION`
//! whenever a field changes meaning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current record format version.
///
/// Version 1 (legacy) carried only flat winner/loser tuples. Version 2 carries
/// a `sides` list with explicit winner marking and named-team attribution.
pub const RECORD_VERSION: u32 = 2;

/// Reserved id for a wrestler that appeared in a match card without a profile
/// link. Distinct unlinked wrestlers are only distinguishable within a single
/// side's list and the name-variant map; the record-level `wrestlers` union
/// necessarily collapses them into one entry.
pub const SENTINEL_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamKind {
    TagTeam,
    Stable,
}

/// A named tag team or stable that appeared with a parenthesized member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub kind: TeamKind,
    pub members: Vec<i64>,
}

/// One contesting side of a match.
///
/// `wrestlers` is sorted; duplicate ids are collapsed except the sentinel,
/// which repeats once per unlinked name on the side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub wrestlers: Vec<i64>,
    pub is_winner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_kind: Option<TeamKind>,
}

/// One parsed match row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub version: u32,
    /// ISO `YYYY-MM-DD`, or `"Unknown"` when the row carried no parseable date.
    pub date: String,
    /// Country the match took place in, or `"Unknown"`.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    /// Union of all participating ids across sides, sorted. All unlinked
    /// wrestlers collapse into a single `SENTINEL_ID` entry here.
    pub wrestlers: Vec<i64>,
    /// Every display-name variant observed per id. Unlinked names accumulate
    /// under `SENTINEL_ID` in order of appearance.
    pub wrestler_names: BTreeMap<i64, Vec<String>>,
    /// First side is the winner iff `is_victory`; on draws no side wins.
    pub sides: Vec<Side>,
    pub is_victory: bool,
    pub teams: BTreeMap<i64, Team>,
    /// Original row HTML, kept so stored records can be re-extracted after
    /// parser changes without re-fetching.
    pub raw_html: String,
}

impl MatchRecord {
    /// Year of the match, when the date was parseable.
    pub fn year(&self) -> Option<i32> {
        self.date.get(..4)?.parse().ok()
    }

    /// True when the parser found no contest structure at all. Callers must
    /// skip these rather than persist them as data-bearing.
    pub fn is_degenerate(&self) -> bool {
        self.sides.is_empty()
    }

    /// Ids on all sides other than `id`, for opponent bookkeeping.
    pub fn opponents_of(&self, id: i64) -> Vec<i64> {
        let mut out: Vec<i64> = Vec::new();
        for side in &self.sides {
            if side.wrestlers.contains(&id) {
                continue;
            }
            for &w in &side.wrestlers {
                if w != SENTINEL_ID && !out.contains(&w) {
                    out.push(w);
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Everyone else in the match, partners included. This is what discovery
    /// follows — a tag partner is as much a lead as an opponent.
    pub fn colleagues_of(&self, id: i64) -> Vec<i64> {
        self.wrestlers
            .iter()
            .copied()
            .filter(|&w| w != id && w != SENTINEL_ID)
            .collect()
    }
}

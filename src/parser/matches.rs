//! Match parser: classified tokens → one normalized `MatchRecord`.
//!
//! The parse state is a bundle of named flags owned exclusively for the
//! duration of one parse call and folded over the token sequence. Metadata
//! tokens (promotion, event, date, stipulation, venue) are honored anywhere in
//! the row; side and participant structure only counts once the card region
//! has been entered.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::tokens::{Paren, Separator, Token};
use crate::record::{MatchRecord, Side, Team, TeamKind, RECORD_VERSION, SENTINEL_ID};

/// Knobs for the unresolved-participant heuristic.
///
/// Free text seen where a participant is expected becomes a sentinel entry
/// when it is short enough and does not open with a dash (which marks result
/// annotations like "- No Contest"). The heuristic is approximate — match
/// times and similar short runs occasionally slip through — and is kept
/// configurable rather than silently tuned.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub unresolved_max_len: usize,
    pub skip_leading_dash: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            unresolved_max_len: 50,
            skip_leading_dash: true,
        }
    }
}

#[derive(Default)]
struct ParseState {
    // metadata scalars, accepted anywhere in the row
    date: Option<NaiveDate>,
    promotion: Option<(i64, String)>,
    event: Option<(i64, String)>,
    match_type: Option<String>,
    country: Option<String>,

    // contest structure
    is_victory: bool,
    found_main_separator: bool,
    saw_contest_separator: bool,
    in_card: bool,
    in_parens: bool,
    expecting_name: bool,

    sides: Vec<Vec<i64>>,
    current_side: Vec<i64>,

    pending_team: Option<(i64, String, TeamKind)>,
    pending_members: Vec<i64>,
    teams: BTreeMap<i64, Team>,
    // side index (at close time) → team id
    side_teams: Vec<(usize, i64)>,

    all_ids: BTreeSet<i64>,
    names: BTreeMap<i64, Vec<String>>,
}

impl ParseState {
    fn add_wrestler(&mut self, id: i64, name: String) {
        self.current_side.push(id);
        self.all_ids.insert(id);
        self.names.entry(id).or_default().push(name);
        self.expecting_name = false;
        if self.in_parens && self.pending_team.is_some() {
            self.pending_members.push(id);
        }
    }

    fn add_unresolved(&mut self, name: &str, opts: &ParserOptions) {
        if name.is_empty() || name.chars().count() >= opts.unresolved_max_len {
            return;
        }
        if opts.skip_leading_dash && name.starts_with('-') {
            return;
        }
        self.current_side.push(SENTINEL_ID);
        self.all_ids.insert(SENTINEL_ID);
        self.names
            .entry(SENTINEL_ID)
            .or_default()
            .push(name.to_string());
        self.expecting_name = false;
        if self.in_parens && self.pending_team.is_some() {
            self.pending_members.push(SENTINEL_ID);
        }
    }

    fn break_side(&mut self) {
        if !self.current_side.is_empty() {
            self.sides.push(std::mem::take(&mut self.current_side));
        }
    }

    fn close_parenthesis(&mut self) {
        self.in_parens = false;
        if let Some((id, name, kind)) = self.pending_team.take() {
            if !self.pending_members.is_empty() {
                let mut members = std::mem::take(&mut self.pending_members);
                members.sort_unstable();
                members.dedup_by(|a, b| a == b && *a != SENTINEL_ID);
                self.teams.insert(id, Team { name, kind, members });
                // the side under construction will close at index sides.len()
                self.side_teams.push((self.sides.len(), id));
            }
        }
        // a member list that never materialized is dropped, not carried over
        self.pending_members.clear();
    }
}

/// Fold a token sequence into a `MatchRecord`.
///
/// A sequence with neither a victory nor a versus separator produces an empty
/// side list with `is_victory = false` — callers treat that as unparseable and
/// skip it; it is never an error.
pub fn parse_tokens(tokens: &[Token], raw_html: String, opts: &ParserOptions) -> MatchRecord {
    let mut state = ParseState {
        expecting_name: true,
        ..ParseState::default()
    };

    for token in tokens {
        match token {
            Token::CardStart => state.in_card = true,

            Token::Promotion { id, name } => state.promotion = Some((*id, name.clone())),
            Token::Event { id, name } => state.event = Some((*id, name.clone())),
            Token::Date(d) => state.date = Some(*d),
            Token::MatchType(t) => state.match_type = Some(t.clone()),
            Token::VenueDetail { country, .. } => state.country = Some(country.clone()),

            // structural tokens outside the card region are narrative noise
            _ if !state.in_card => {}

            Token::Paren(Paren::Open) => state.in_parens = true,
            Token::Paren(Paren::Close) => state.close_parenthesis(),

            Token::NamedTeam { id, name, kind } => {
                state.pending_team = Some((*id, name.clone(), *kind));
            }

            Token::Wrestler { id, name } => state.add_wrestler(*id, name.clone()),

            Token::Text(text) => {
                if state.expecting_name {
                    state.add_unresolved(text, opts);
                }
            }

            Token::Separator(Separator::TeamJoin) => state.expecting_name = true,

            Token::Separator(Separator::Versus) => {
                state.saw_contest_separator = true;
                if !state.in_parens {
                    state.break_side();
                }
                state.expecting_name = true;
            }

            Token::Separator(Separator::SideJoin) => {
                // "and" only separates sides once the main separator has been
                // seen; before that it is connective narrative text
                if state.found_main_separator && !state.in_parens {
                    state.break_side();
                }
                state.expecting_name = true;
            }

            Token::Separator(Separator::Victory) => {
                state.is_victory = true;
                state.found_main_separator = true;
                state.saw_contest_separator = true;
                state.break_side();
                state.expecting_name = true;
            }

            Token::Link { .. } => {}
        }
    }

    state.break_side();

    if !state.saw_contest_separator {
        state.sides.clear();
        state.side_teams.clear();
        state.is_victory = false;
    }

    let is_victory = state.is_victory;
    let sides: Vec<Side> = state
        .sides
        .iter()
        .enumerate()
        .map(|(i, members)| {
            let mut wrestlers = members.clone();
            wrestlers.sort_unstable();
            wrestlers.dedup_by(|a, b| a == b && *a != SENTINEL_ID);
            let team = state
                .side_teams
                .iter()
                .find(|(idx, _)| *idx == i)
                .and_then(|(_, tid)| state.teams.get(tid).map(|t| (*tid, t)));
            Side {
                wrestlers,
                is_winner: is_victory && i == 0,
                team_id: team.map(|(tid, _)| tid),
                team_name: team.map(|(_, t)| t.name.clone()),
                team_kind: team.map(|(_, t)| t.kind),
            }
        })
        .collect();

    MatchRecord {
        version: RECORD_VERSION,
        date: state
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        country: state.country.unwrap_or_else(|| "Unknown".to_string()),
        match_type: state.match_type,
        promotion: state.promotion.as_ref().map(|(id, _)| *id),
        promotion_name: state.promotion.map(|(_, name)| name),
        event: state.event.as_ref().map(|(id, _)| *id),
        event_name: state.event.map(|(_, name)| name),
        wrestlers: state.all_ids.iter().copied().collect(),
        wrestler_names: state.names,
        sides,
        is_victory,
        teams: state.teams,
        raw_html,
    }
}

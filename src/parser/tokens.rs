//! Token stream for match rows.
//!
//! A results row is a loosely structured `<tr>`: profile links, named-team
//! links, free text carrying separators ("&", "and", "vs.", "defeats"),
//! parenthesized member lists, a date cell, and an event line with the venue.
//! Tokenization happens in two passes: a raw walk over the row's cells in
//! document order, then classification of links by href namespace and of free
//! text by lexical rules. A single text node may contain several logical units
//! (e.g. "and Sleepy Ed and"), so classification can split one raw token into
//! many — order is preserved and no unit is dropped.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::countries;
use crate::record::TeamKind;

static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

static FULL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap());
static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})\.(\d{4})$").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());

static VENUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Event|Online Stream|TV-Show|Pay Per View|Dark Match|House Show) @ (.*)$")
        .unwrap()
});

// "vs." uses \s* rather than \s+ so it still matches after a parenthesis has
// been peeled off the front of the text node.
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*&\s*|\band\b|\s*vs\.\s*|\bdefeats?\b").unwrap());

/// Raw node-walk output, before classification.
#[derive(Debug, Clone)]
enum RawToken {
    Text(String),
    Link { href: String, text: String },
    Styled { classes: Vec<String>, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// "&" — the next name is on the same side.
    TeamJoin,
    /// "vs." — closes the current side and opens a new one.
    Versus,
    /// "and" — a side break, but only once the main separator has been seen.
    SideJoin,
    /// "defeat"/"defeats" — the winner/loser boundary.
    Victory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paren {
    Open,
    Close,
}

/// Classified token kinds consumed by the match parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    /// A link whose href matched no known id namespace; passed through as-is.
    Link { href: String, text: String },
    /// Entry into the card region (the `MatchCard` span).
    CardStart,
    MatchType(String),
    Wrestler { id: i64, name: String },
    NamedTeam { id: i64, name: String, kind: TeamKind },
    Promotion { id: i64, name: String },
    Event { id: i64, name: String },
    Separator(Separator),
    Date(NaiveDate),
    Paren(Paren),
    VenueDetail { venue_kind: String, country: String },
}

/// Tokenize one `<tr>` results row into classified tokens.
pub fn tokenize_row(row: ElementRef) -> Vec<Token> {
    let mut raw = Vec::new();
    for td in row.select(&TD) {
        for child in td.children() {
            walk(child, &mut raw);
        }
    }

    let mut tokens = Vec::with_capacity(raw.len());
    for token in raw {
        match token {
            RawToken::Link { href, text } => tokens.push(classify_link(href, text)),
            RawToken::Styled { classes, text } => {
                if classes.iter().any(|c| c == "MatchCard") {
                    tokens.push(Token::CardStart);
                } else if classes.iter().any(|c| c == "MatchType") {
                    let t = text.trim().trim_end_matches(':').trim().to_string();
                    if !t.is_empty() {
                        tokens.push(Token::MatchType(t));
                    }
                }
            }
            RawToken::Text(text) => classify_text(&text, &mut tokens),
        }
    }
    tokens
}

fn walk(node: ego_tree::NodeRef<'_, scraper::Node>, out: &mut Vec<RawToken>) {
    if let Some(el) = ElementRef::wrap(node) {
        match el.value().name() {
            "span" | "div" => {
                out.push(RawToken::Styled {
                    classes: el.value().classes().map(str::to_string).collect(),
                    text: el.text().collect::<String>().trim().to_string(),
                });
                for child in el.children() {
                    walk(child, out);
                }
            }
            "a" => {
                out.push(RawToken::Link {
                    href: el.value().attr("href").unwrap_or("").to_string(),
                    text: el.text().collect::<String>().trim().to_string(),
                });
            }
            // img and friends carry nothing the parser wants
            _ => {}
        }
    } else if let Some(text) = node.value().as_text() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(RawToken::Text(trimmed.to_string()));
        }
    }
}

/// Specialize a link by its href id namespace. Wrestlers live under `id=2`,
/// events under `id=1`, promotions under `id=8`, tag teams and stables under
/// `id=28`/`id=29`. Anything else passes through unchanged.
fn classify_link(href: String, text: String) -> Token {
    let name = || {
        if text.is_empty() {
            "Unknown".to_string()
        } else {
            text.clone()
        }
    };
    if href.contains("id=2&nr=") {
        if let Some(id) = link_nr(&href) {
            return Token::Wrestler { id, name: name() };
        }
    }
    if href.contains("id=8&nr=") {
        if let Some(id) = link_nr(&href) {
            return Token::Promotion { id, name: name() };
        }
    }
    if href.contains("id=1&nr=") {
        if let Some(id) = link_nr(&href) {
            return Token::Event { id, name: name() };
        }
    }
    if href.contains("id=28&nr=") || href.contains("id=29&nr=") {
        if let Some(id) = link_nr(&href) {
            let kind = if href.contains("id=28&nr=") {
                TeamKind::TagTeam
            } else {
                TeamKind::Stable
            };
            return Token::NamedTeam {
                id,
                name: name(),
                kind,
            };
        }
    }
    Token::Link { href, text }
}

fn link_nr(href: &str) -> Option<i64> {
    let after = href.split("nr=").nth(1)?;
    after.split('&').next()?.parse().ok()
}

/// Classify a free-text run, splitting it on separator words/symbols and
/// embedded parentheses. A date short-circuits whole (never split — a name
/// that looks like a bare year would be misread, a known approximation).
pub(crate) fn classify_text(text: &str, out: &mut Vec<Token>) {
    if let Some(date) = parse_flexible_date(text) {
        out.push(Token::Date(date));
        return;
    }

    if let Some(caps) = VENUE_RE.captures(text) {
        let venue_kind = caps[1].to_string();
        let location = &caps[2];
        let raw_country = location.rsplit(',').next().unwrap_or(location);
        out.push(Token::VenueDetail {
            venue_kind,
            country: countries::normalize(raw_country),
        });
        return;
    }

    let mut last_end = 0;
    for m in SEPARATOR_RE.find_iter(text) {
        emit_text_piece(&text[last_end..m.start()], out);
        emit_separator(m.as_str(), out);
        last_end = m.end();
    }
    emit_text_piece(&text[last_end..], out);
}

/// Emit a text piece, peeling embedded parentheses into their own tokens.
fn emit_text_piece(piece: &str, out: &mut Vec<Token>) {
    let mut buf = String::new();
    let mut flush = |buf: &mut String, out: &mut Vec<Token>| {
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            out.push(Token::Text(trimmed.to_string()));
        }
        buf.clear();
    };
    for ch in piece.chars() {
        match ch {
            '(' => {
                flush(&mut buf, out);
                out.push(Token::Paren(Paren::Open));
            }
            ')' => {
                flush(&mut buf, out);
                out.push(Token::Paren(Paren::Close));
            }
            _ => buf.push(ch),
        }
    }
    flush(&mut buf, out);
}

fn emit_separator(matched: &str, out: &mut Vec<Token>) {
    let t = matched.trim();
    let lower = t.to_lowercase();
    let sep = if t == "&" {
        Separator::TeamJoin
    } else if lower == "and" {
        Separator::SideJoin
    } else if lower.contains("vs.") {
        Separator::Versus
    } else {
        Separator::Victory
    };
    out.push(Token::Separator(sep));
}

/// Flexible date parsing: `DD.MM.YYYY`, `MM.YYYY` (day defaults to 1), or
/// `YYYY` (month and day default to 1). Anything else is not a date.
pub fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if let Some(caps) = FULL_DATE_RE.captures(t) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = MONTH_YEAR_RE.captures(t) {
        let month: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    if let Some(caps) = YEAR_RE.captures(t) {
        let year: i32 = caps[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const THREE_WAY_TAG: &str = r#"<tr class="TRow2">
    <td class="TCol AlignCenter TextLowlight">4</td>
    <td class="TCol TColSeparator">18.11.1996</td>
    <td class="TCol TColSeparator">
        <a href="?id=8&amp;nr=2"><img src="/img/2.gif" class="ImagePromotionLogoMini" alt="World Championship Wrestling" title="World Championship Wrestling"></a></td>
    <td class="TCol TColSeparator">
        <span class="MatchType">Dark Three Way: </span>
        <span class="MatchCard">
            <a href="?id=2&amp;nr=1256&amp;name=Ciclope">Ciclope</a> &amp; <a href="?id=2&amp;nr=1007&amp;name=Galaxy">Galaxy</a> vs. <a href="?id=28&amp;nr=452&amp;name=High+Voltage">High Voltage</a> (<a href="?id=2&amp;nr=1681&amp;name=Kenny+Kaos">Kenny Kaos</a> &amp; <a href="?id=2&amp;nr=1682&amp;name=Robbie+Rage">Robbie Rage</a>) vs. <a href="?id=28&amp;nr=67&amp;name=The+Nasty+Boys">The Nasty Boys</a> (<a href="?id=2&amp;nr=633&amp;name=Brian+Knobbs">Brian Knobbs</a> &amp; <a href="?id=2&amp;nr=558&amp;name=Jerry+Sags">Jerry Sags</a>) - No Contest
        </span>
        <div class="MatchEventLine">
            <a href="?id=1&amp;nr=4091">WCW Monday NITRO #62</a> - Dark Match @ Civic Center in Florence, South Carolina, USA
        </div>
        </td></tr>"#;

    const WITH_UNLINKED: &str = r#"<tr class="TRow1"><td class="TCol AlignCenter TextLowlight">1</td><td class="TCol TColSeparator">03.01.2026</td><td class="TCol TColSeparator"><a href="?id=8&amp;nr=710"><img src="/img/710.gif" alt="Game Changer Wrestling"></a></td><td class="TCol TColSeparator">
<span class="MatchCard"><a href="?id=28&amp;nr=9524&amp;name=Bang+and+Matthews">Bang and Matthews</a> (<a href="?id=2&amp;nr=26444&amp;name=August+Matthews">August Matthews</a> &amp; <a href="?id=2&amp;nr=23302&amp;name=Davey+Bang">Davey Bang</a>) defeat <a href="?id=2&amp;nr=25905&amp;name=Anakin+Murphy">Anakin Murphy</a> &amp; Logan Cavazos (9:51)</span><div class="MatchEventLine"><a href="?id=1&amp;nr=439072">GCW One Night Only 2026</a> - Pay Per View @ Berwyn Eagles Club in Berwyn, Illinois, USA</div></td></tr>"#;

    fn parse_doc(row_html: &str) -> Html {
        Html::parse_document(&format!("<table>{row_html}</table>"))
    }

    fn tokens_of(doc: &Html) -> Vec<Token> {
        let tr = Selector::parse("tr").unwrap();
        tokenize_row(doc.select(&tr).next().expect("row"))
    }

    #[test]
    fn extracts_date() {
        let doc = parse_doc(THREE_WAY_TAG);
        let dates: Vec<_> = tokens_of(&doc)
            .into_iter()
            .filter_map(|t| match t {
                Token::Date(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(1996, 11, 18).unwrap()]);
    }

    #[test]
    fn extracts_match_type() {
        let doc = parse_doc(THREE_WAY_TAG);
        let types: Vec<_> = tokens_of(&doc)
            .into_iter()
            .filter_map(|t| match t {
                Token::MatchType(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(types, vec!["Dark Three Way".to_string()]);
    }

    #[test]
    fn extracts_wrestlers_and_teams() {
        let doc = parse_doc(THREE_WAY_TAG);
        let tokens = tokens_of(&doc);
        let names: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Wrestler { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        for expected in [
            "Ciclope",
            "Galaxy",
            "Kenny Kaos",
            "Robbie Rage",
            "Brian Knobbs",
            "Jerry Sags",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        let teams: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::NamedTeam { name, kind, .. } => Some((name.as_str(), *kind)),
                _ => None,
            })
            .collect();
        assert!(teams.contains(&("High Voltage", TeamKind::TagTeam)));
        assert!(teams.contains(&("The Nasty Boys", TeamKind::TagTeam)));
    }

    #[test]
    fn extracts_promotion_and_event() {
        let doc = parse_doc(THREE_WAY_TAG);
        let tokens = tokens_of(&doc);
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Promotion { id: 2, .. })));
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Event { id: 4091, name } if name.contains("NITRO"))));
    }

    #[test]
    fn extracts_separators_and_parens() {
        let doc = parse_doc(THREE_WAY_TAG);
        let tokens = tokens_of(&doc);
        let seps: Vec<_> = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Separator(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert!(seps.contains(&Separator::TeamJoin));
        assert!(seps.contains(&Separator::Versus));
        let parens = tokens
            .iter()
            .filter(|t| matches!(t, Token::Paren(_)))
            .count();
        assert!(parens >= 4);
    }

    #[test]
    fn venue_detail_yields_country() {
        let doc = parse_doc(THREE_WAY_TAG);
        let tokens = tokens_of(&doc);
        assert!(tokens.iter().any(|t| matches!(
            t,
            Token::VenueDetail { venue_kind, country }
                if venue_kind == "Dark Match" && country == "USA"
        )));
    }

    #[test]
    fn splits_text_on_embedded_separators() {
        let mut out = Vec::new();
        classify_text("and Sleepy Ed and", &mut out);
        assert_eq!(
            out,
            vec![
                Token::Separator(Separator::SideJoin),
                Token::Text("Sleepy Ed".into()),
                Token::Separator(Separator::SideJoin),
            ]
        );
    }

    #[test]
    fn splits_text_with_parentheses() {
        let mut out = Vec::new();
        classify_text("Logan Cavazos (9:51)", &mut out);
        assert_eq!(
            out,
            vec![
                Token::Text("Logan Cavazos".into()),
                Token::Paren(Paren::Open),
                Token::Text("9:51".into()),
                Token::Paren(Paren::Close),
            ]
        );
    }

    #[test]
    fn victory_separator_recognized() {
        let mut out = Vec::new();
        classify_text("defeats", &mut out);
        assert_eq!(out, vec![Token::Separator(Separator::Victory)]);
        out.clear();
        classify_text("defeat", &mut out);
        assert_eq!(out, vec![Token::Separator(Separator::Victory)]);
    }

    #[test]
    fn team_name_with_and_is_not_split() {
        let doc = parse_doc(WITH_UNLINKED);
        let tokens = tokens_of(&doc);
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::NamedTeam { name, .. } if name == "Bang and Matthews")));
    }

    #[test]
    fn unlinked_names_stay_text() {
        let doc = parse_doc(WITH_UNLINKED);
        let tokens = tokens_of(&doc);
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Text(s) if s == "Logan Cavazos")));
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Text(s) if s == "9:51")));
    }

    #[test]
    fn unmatched_link_passes_through() {
        let doc = parse_doc(
            r#"<tr><td><span class="MatchType"><a href="?id=5&amp;nr=59">WCW World Tag Team Title</a> Triangle: </span></td></tr>"#,
        );
        let tokens = tokens_of(&doc);
        assert!(tokens
            .iter()
            .any(|t| matches!(t, Token::Link { href, .. } if href.contains("id=5"))));
    }

    #[test]
    fn flexible_dates() {
        assert_eq!(
            parse_flexible_date("18.11.1996"),
            NaiveDate::from_ymd_opt(1996, 11, 18)
        );
        assert_eq!(
            parse_flexible_date("11.1996"),
            NaiveDate::from_ymd_opt(1996, 11, 1)
        );
        assert_eq!(
            parse_flexible_date("1996"),
            NaiveDate::from_ymd_opt(1996, 1, 1)
        );
        assert_eq!(parse_flexible_date("32.13.1996"), None);
        assert_eq!(parse_flexible_date("9:51"), None);
        assert_eq!(parse_flexible_date("not a date"), None);
    }
}

pub mod matches;
pub mod profile;
pub mod promotion;
pub mod tokens;

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

pub use matches::{parse_tokens, ParserOptions};

use crate::record::MatchRecord;

static RESULT_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.TRow1, tr.TRow2").unwrap());
static ANY_ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static YEAR_OPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[name="year"] option"#).unwrap());

/// Extract every match record from a results page. Two-pass pipeline per row:
/// tokenize and classify, then fold through the state machine. Degenerate rows
/// come back too — callers decide whether to skip them.
pub fn parse_results_page(html: &str, opts: &ParserOptions) -> Vec<MatchRecord> {
    let doc = Html::parse_document(html);
    doc.select(&RESULT_ROW)
        .map(|row| parse_tokens(&tokens::tokenize_row(row), row.html(), opts))
        .collect()
}

/// Parse a single results-row fragment. The row is re-hosted in a table so
/// the HTML parser keeps its cell structure.
pub fn parse_fragment(row_html: &str, opts: &ParserOptions) -> Option<MatchRecord> {
    let doc = Html::parse_document(&format!("<table>{row_html}</table>"));
    let row = doc
        .select(&RESULT_ROW)
        .next()
        .or_else(|| doc.select(&ANY_ROW).next())?;
    Some(parse_tokens(&tokens::tokenize_row(row), row.html(), opts))
}

/// Years with match data, read from the page's year dropdown.
pub fn available_years(html: &str) -> BTreeSet<i32> {
    let doc = Html::parse_document(html);
    doc.select(&YEAR_OPTION)
        .filter_map(|opt| opt.value().attr("value"))
        .filter_map(|v| v.parse().ok())
        .collect()
}

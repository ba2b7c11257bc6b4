//! Wrestler profile page parsing.
//!
//! Profile pages are a header plus label/value information rows. Values that
//! look like site dates (`DD.MM.YYYY`) are normalized to ISO on the way in;
//! the "Alter egos" row is kept as a list of linked names.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::tokens::parse_flexible_date;

static HEADER: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1.TextHeader").unwrap());
static INFO_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxRow").unwrap());
static INFO_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxTitle").unwrap());
static INFO_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxContents").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub id: i64,
    /// Page header text, usually the current ring name.
    pub header_name: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub alter_egos: Vec<String>,
}

impl Profile {
    /// Best available display name: current gimmick, then the page header,
    /// then the first alter ego.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.fields.get("Current gimmick") {
            if !name.is_empty() {
                return name.clone();
            }
        }
        if let Some(name) = &self.header_name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        if let Some(first) = self.alter_egos.first() {
            let cleaned = first.split("a.k.a.").next().unwrap_or(first).trim();
            if !cleaned.is_empty() {
                return cleaned.to_string();
            }
        }
        "Unknown".to_string()
    }

    /// Lowercased gender field, empty when the page carried none.
    pub fn gender(&self) -> String {
        self.fields
            .get("Gender")
            .map(|g| g.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn is_female(&self) -> bool {
        self.gender() == "female"
    }

    /// Gender stated but neither male nor female; these wrestlers go on the
    /// scheduler's watch list.
    pub fn gender_is_ambiguous(&self) -> bool {
        let g = self.gender();
        !g.is_empty() && g != "male" && g != "female"
    }

    pub fn promotion(&self) -> String {
        self.fields
            .get("Promotion")
            .cloned()
            .unwrap_or_else(|| "Freelancer".to_string())
    }

    pub fn location(&self) -> Option<String> {
        self.fields.get("Birthplace").cloned()
    }

    pub fn career_start_year(&self) -> Option<i32> {
        year_of(self.fields.get("Beginning of in-ring career")?)
    }

    pub fn career_end_year(&self) -> Option<i32> {
        year_of(self.fields.get("End of in-ring career")?)
    }
}

/// Extract a year from "YYYY", "YYYY-MM-DD", or "DD.MM.YYYY" shapes.
fn year_of(value: &str) -> Option<i32> {
    let v = value.trim();
    if v.len() >= 4 {
        if let Ok(year) = v[..4].parse::<i32>() {
            if (1800..=2100).contains(&year) {
                return Some(year);
            }
        }
    }
    parse_flexible_date(v).map(|d| {
        use chrono::Datelike;
        d.year()
    })
}

/// Parse a wrestler profile page.
pub fn parse_profile_page(id: i64, html: &str) -> Profile {
    let doc = Html::parse_document(html);
    let mut profile = Profile {
        id,
        ..Profile::default()
    };

    if let Some(h1) = doc.select(&HEADER).next() {
        let name = h1.text().collect::<String>().trim().to_string();
        if !name.is_empty() {
            profile.header_name = Some(name);
        }
    }

    for row in doc.select(&INFO_ROW) {
        let (Some(title), Some(value)) =
            (row.select(&INFO_TITLE).next(), row.select(&INFO_VALUE).next())
        else {
            continue;
        };
        let label = title
            .text()
            .collect::<String>()
            .trim()
            .trim_end_matches(':')
            .to_string();
        if label == "Alter egos" {
            profile.alter_egos = value
                .select(&ANCHOR)
                .map(|a| a.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            continue;
        }
        let mut text = value.text().collect::<String>().trim().to_string();
        if let Some(date) = parse_flexible_date(&text) {
            if text.contains('.') {
                text = date.format("%Y-%m-%d").to_string();
            }
        }
        profile.fields.insert(label, text);
    }

    profile
}

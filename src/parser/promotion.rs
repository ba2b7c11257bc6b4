//! Promotion page parsing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};

static INFO_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxTable div.InformationBoxRow").unwrap());
static INFO_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxTitle").unwrap());
static INFO_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InformationBoxContents").unwrap());

#[derive(Debug, Clone, Default)]
pub struct Promotion {
    pub id: i64,
    pub name: Option<String>,
    /// Founding year, from the first half of the "Active Time" range.
    pub founded: Option<String>,
    /// Country, from the trailing component of the location.
    pub country: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl Promotion {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| "Unknown Promotion".to_string())
    }
}

/// Parse a promotion page into its information-box fields.
pub fn parse_promotion_page(id: i64, html: &str) -> Promotion {
    let doc = Html::parse_document(html);
    let mut promotion = Promotion {
        id,
        ..Promotion::default()
    };

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
        let text = value.text().collect::<String>().trim().to_string();

        match label.as_str() {
            "Current name" => promotion.name = Some(text.clone()),
            "Active Time" => {
                // "2011 - today" or "1997 - 2004"
                if let Some(first) = text.split(" - ").next() {
                    let first = first.trim();
                    if !first.is_empty() {
                        promotion.founded = Some(first.to_string());
                    }
                }
            }
            "Location" => {
                if let Some(last) = text.rsplit(',').next() {
                    promotion.country = Some(last.trim().to_string());
                }
            }
            _ => {}
        }
        promotion.fields.insert(label, text);
    }

    promotion
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMOTION_HTML: &str = r#"<html><body>
    <h1 class="TextHeader">Tokyo Joshi Pro-Wrestling</h1>
    <div class="InformationBoxTable">
      <div class="InformationBoxRow">
        <div class="InformationBoxTitle">Current name:</div>
        <div class="InformationBoxContents">Tokyo Joshi Pro-Wrestling</div>
      </div>
      <div class="InformationBoxRow">
        <div class="InformationBoxTitle">Active Time:</div>
        <div class="InformationBoxContents">2013 - today</div>
      </div>
      <div class="InformationBoxRow">
        <div class="InformationBoxTitle">Location:</div>
        <div class="InformationBoxContents">Tokyo, Japan</div>
      </div>
    </div></body></html>"#;

    #[test]
    fn parses_promotion_fields() {
        let p = parse_promotion_page(1467, PROMOTION_HTML);
        assert_eq!(p.display_name(), "Tokyo Joshi Pro-Wrestling");
        assert_eq!(p.founded.as_deref(), Some("2013"));
        assert_eq!(p.country.as_deref(), Some("Japan"));
    }

    #[test]
    fn empty_page_degrades_to_defaults() {
        let p = parse_promotion_page(1, "<html><body></body></html>");
        assert_eq!(p.display_name(), "Unknown Promotion");
        assert!(p.founded.is_none());
        assert!(p.country.is_none());
    }
}

//! Country normalization for venue lines.
//!
//! The site spells countries inconsistently across decades of data; venue
//! parsing takes the trailing comma component and runs it through this table.
//! Unknown spellings pass through unchanged.

use std::collections::HashMap;
use std::sync::LazyLock;

static COUNTRY_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("USA", "USA"),
        ("U.S.A", "USA"),
        ("United States", "USA"),
        ("United States Of America", "USA"),
        ("Japan", "Japan"),
        ("Japon", "Japan"),
        ("UK", "United Kingdom"),
        ("England", "United Kingdom"),
        ("Scotland", "United Kingdom"),
        ("Wales", "United Kingdom"),
        ("Northern Ireland", "United Kingdom"),
        ("Great Britain", "United Kingdom"),
        ("Deutschland", "Germany"),
        ("Germany", "Germany"),
        ("Mexiko", "Mexico"),
        ("Mexico", "Mexico"),
        ("Canada", "Canada"),
        ("Australia", "Australia"),
        ("Oesterreich", "Austria"),
        ("Austria", "Austria"),
        ("South Korea", "South Korea"),
        ("Korea", "South Korea"),
        ("Puerto Rico", "Puerto Rico"),
        ("France", "France"),
        ("Italy", "Italy"),
        ("Spain", "Spain"),
        ("Netherlands", "Netherlands"),
        ("Holland", "Netherlands"),
        ("China", "China"),
        ("Taiwan", "Taiwan"),
        ("Hong Kong", "Hong Kong"),
        ("Singapore", "Singapore"),
        ("New Zealand", "New Zealand"),
        ("India", "India"),
        ("Brazil", "Brazil"),
        ("Ireland", "Ireland"),
    ])
});

/// Normalize a raw country spelling. Trailing periods and whitespace are
/// stripped before lookup; unmapped values come back as given.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('.').trim();
    COUNTRY_MAP
        .get(trimmed)
        .map(|c| (*c).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

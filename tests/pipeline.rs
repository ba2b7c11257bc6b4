//! End-to-end pipeline: extract rows from a results page, persist them,
//! then watch the scheduler react to the new store state. No network —
//! everything below the fetch layer.

use std::collections::BTreeSet;

use ringside::confidence::{Cached, FixedConfidence, MemoryConfidenceCache};
use ringside::db::{Db, Store};
use ringside::parser::{self, profile::parse_profile_page, ParserOptions};
use ringside::schedule::{Operation, QueueBuilder, StalenessPolicy};

// The reference year is pinned so activity gating is deterministic; the
// reference clock tracks the wall clock because the store stamps rows with it.
const YEAR: i32 = 2026;

fn policy_now() -> StalenessPolicy {
    StalenessPolicy::new(chrono::Utc::now().timestamp(), YEAR)
}

const RESULTS_PAGE: &str = r#"<html><body><table>
<tr class="TRow1"><td>1</td><td>03.09.2023</td><td><a href="?id=8&amp;nr=1467"><img alt="TJPW"></a></td><td><span class="MatchCard"><a href="?id=2&amp;nr=27181&amp;name=Toga">Toga</a> defeats <a href="?id=2&amp;nr=27259&amp;name=Shino+Suzuki">Shino Suzuki</a> (6:13)</span><div class="MatchEventLine"><a href="?id=1&amp;nr=375188">TJPW City Circuit '23</a> - Online Stream @ Otemachi Mitsui Hall in Tokyo, Japan</div></td></tr>
<tr class="TRow2"><td>2</td><td>12.09.2023</td><td><a href="?id=8&amp;nr=1467"><img alt="TJPW"></a></td><td><span class="MatchCard"><a href="?id=2&amp;nr=27181&amp;name=Toga">Toga</a> &amp; <a href="?id=2&amp;nr=19649&amp;name=Miu+Watanabe">Miu Watanabe</a> defeat <a href="?id=2&amp;nr=26772&amp;name=HIMAWARI">HIMAWARI</a> &amp; Logan Cavazos (9:27)</span></td></tr>
</table></body></html>"#;

const TOGA_PROFILE: &str = r#"<h1 class="TextHeader">Toga</h1>
<div class="InformationBoxRow"><div class="InformationBoxTitle">Gender:</div>
<div class="InformationBoxContents">female</div></div>"#;

fn populated_db() -> Db {
    let db = Db::open_in_memory().unwrap();
    db.save_profile(&parse_profile_page(27181, TOGA_PROFILE))
        .unwrap();
    let records = parser::parse_results_page(RESULTS_PAGE, &ParserOptions::default());
    assert_eq!(records.len(), 2);
    db.save_matches(27181, 2023, &records).unwrap();
    db
}

#[test]
fn extraction_to_store_round_trip() {
    let db = populated_db();
    let loaded = db.get_matches(27181, 2023).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].date, "2023-09-03");
    assert_eq!(loaded[0].country, "Japan");
    assert!(loaded[0].is_victory);
    // the unlinked partner is only visible in the name-variant map
    assert_eq!(loaded[1].wrestler_names[&-1], vec!["Logan Cavazos"]);

    let info = db.match_info(27181, 2023);
    assert_eq!(info.match_count, 2);
    assert_eq!(info.opponents, vec![26772, 27259]);
}

#[test]
fn scheduler_reacts_to_new_store_state() {
    let db = populated_db();
    let provider = Cached::new(FixedConfidence(0.95), MemoryConfidenceCache::default());
    let policy = policy_now();

    let items = QueueBuilder::new(&db, &provider, policy, false)
        .build()
        .into_sorted_items();

    // opponents are referenced but unprofiled: discovery items, never the
    // sentinel
    let discovered: Vec<i64> = items
        .iter()
        .filter(|i| i.operation == Operation::RefreshProfile && i.id != 27181)
        .map(|i| i.id)
        .collect();
    assert!(discovered.contains(&27259));
    assert!(discovered.contains(&26772));
    assert!(discovered.contains(&19649));
    assert!(!discovered.contains(&-1));

    // profile was just saved: no refresh for Toga herself
    assert!(!items
        .iter()
        .any(|i| i.id == 27181 && i.operation == Operation::RefreshProfile));

    // last matches in 2023 → not recently active → current year is gated out,
    // but the missing previous year is queued
    assert!(!items
        .iter()
        .any(|i| i.id == 27181 && i.year == Some(YEAR)));
    assert!(items
        .iter()
        .any(|i| i.id == 27181
            && i.operation == Operation::RefreshMatchYear
            && i.year == Some(YEAR - 1)));

    // the promotion seen in stored matches is unknown, so it queues too
    assert!(items
        .iter()
        .any(|i| i.id == 1467 && i.operation == Operation::RefreshPromotion));

    // full drain comes out in non-decreasing priority order
    let mut last = i32::MIN;
    for item in &items {
        assert!(item.priority >= last);
        last = item.priority;
    }
}

#[test]
fn filtered_build_stays_inside_the_filter() {
    let db = populated_db();
    let provider = FixedConfidence(0.5);
    let policy = policy_now();

    let items = QueueBuilder::new(&db, &provider, policy, false)
        .with_filter(BTreeSet::from([27181]))
        .build()
        .into_sorted_items();

    assert!(!items.is_empty());
    assert!(items.iter().all(|i| i.id == 27181));
}

#[test]
fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ringside.sqlite");

    {
        let db = Db::open(&path).unwrap();
        db.save_profile(&parse_profile_page(27181, TOGA_PROFILE))
            .unwrap();
        let records = parser::parse_results_page(RESULTS_PAGE, &ParserOptions::default());
        db.save_matches(27181, 2023, &records).unwrap();
    }

    let db = Db::open(&path).unwrap();
    assert!(db.is_female(27181));
    assert_eq!(db.get_matches(27181, 2023).unwrap().len(), 2);
    assert_eq!(
        db.available_years(27181).into_iter().collect::<Vec<_>>(),
        vec![2023]
    );
}

#[test]
fn reparsing_stored_raw_html_is_stable() {
    let db = populated_db();
    let stored = db.get_matches(27181, 2023).unwrap();
    for record in &stored {
        let again = parser::parse_fragment(&record.raw_html, &ParserOptions::default()).unwrap();
        assert_eq!(again.sides, record.sides);
        assert_eq!(again.date, record.date);
        assert_eq!(again.is_victory, record.is_victory);
        assert_eq!(again.wrestlers, record.wrestlers);
    }
}

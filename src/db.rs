//! SQLite store for wrestlers, match years, and promotions.
//!
//! Match records are stored as JSON per (wrestler, year) row alongside derived
//! fields the scheduler needs without deserializing anything: match counts,
//! opponent lists, promotions worked. A normalized `wrestler_opponents` edge
//! table powers discovery (who is referenced but unknown) and importance
//! scoring. A (wrestler, year) row with `last_updated = 0` is a stub: the year
//! is known to exist but has never been fetched, so it reads as stale.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use crate::parser::profile::Profile;
use crate::parser::promotion::Promotion;
use crate::record::MatchRecord;

/// Read contracts the scheduler consumes. A trait so builder tests can run on
/// an in-memory double instead of a populated database.
pub trait Store {
    /// Epoch seconds of the last profile fetch; 0 when never fetched.
    fn profile_timestamp(&self, id: i64) -> i64;
    /// Epoch seconds of the last fetch of one match year; 0 when never.
    fn matches_timestamp(&self, id: i64, year: i32) -> i64;
    fn promotion_timestamp(&self, id: i64) -> i64;
    /// Years known to exist for this wrestler (fetched or stubbed).
    fn available_years(&self, id: i64) -> BTreeSet<i32>;
    fn is_female(&self, id: i64) -> bool;
    fn all_ids(&self) -> Vec<i64>;
    fn female_ids(&self) -> Vec<i64>;
    /// Wrestlers whose profile gender is stated but neither male nor female;
    /// the scheduler's watch list.
    fn gender_ambiguous_ids(&self) -> Vec<i64>;
    /// Ids referenced by stored matches but absent from the wrestlers table,
    /// with the distinct wrestlers referencing each.
    fn missing_referenced(&self) -> Vec<(i64, Vec<i64>)>;
    /// Distinct known wrestlers whose stored matches reference `id`.
    fn referers(&self, id: i64) -> Vec<i64>;
    /// Promotion ids seen in stored matches with their reference counts.
    fn promotion_references(&self) -> Vec<(i64, u32)>;
    fn match_info(&self, id: i64, year: i32) -> MatchYearInfo;
}

#[derive(Debug, Clone, Default)]
pub struct MatchYearInfo {
    pub match_count: u32,
    pub opponents: Vec<i64>,
}

pub struct DbStats {
    pub wrestlers: usize,
    pub female: usize,
    pub match_years: usize,
    pub stub_years: usize,
    pub promotions: usize,
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS wrestlers (
                wrestler_id   INTEGER PRIMARY KEY,
                name          TEXT NOT NULL DEFAULT 'Unknown',
                gender        TEXT NOT NULL DEFAULT '',
                promotion     TEXT,
                location      TEXT,
                career_start  TEXT,
                career_end    TEXT,
                profile_json  TEXT,
                last_updated  INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_wrestlers_gender ON wrestlers(gender);
            CREATE INDEX IF NOT EXISTS idx_wrestlers_updated ON wrestlers(last_updated);

            CREATE TABLE IF NOT EXISTS matches (
                wrestler_id      INTEGER NOT NULL,
                year             INTEGER NOT NULL,
                match_count      INTEGER NOT NULL DEFAULT 0,
                records_json     TEXT NOT NULL DEFAULT '[]',
                opponents_json   TEXT NOT NULL DEFAULT '[]',
                promotions_json  TEXT NOT NULL DEFAULT '{}',
                last_updated     INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (wrestler_id, year)
            );
            CREATE INDEX IF NOT EXISTS idx_matches_year ON matches(year);
            CREATE INDEX IF NOT EXISTS idx_matches_updated ON matches(last_updated);

            CREATE TABLE IF NOT EXISTS wrestler_opponents (
                wrestler_id  INTEGER NOT NULL,
                opponent_id  INTEGER NOT NULL,
                year         INTEGER NOT NULL,
                match_count  INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (wrestler_id, opponent_id, year)
            );
            CREATE INDEX IF NOT EXISTS idx_opponent_lookup
                ON wrestler_opponents(opponent_id, year);

            CREATE TABLE IF NOT EXISTS promotions (
                promotion_id  INTEGER PRIMARY KEY,
                name          TEXT,
                founded       TEXT,
                country       TEXT,
                promotion_json TEXT,
                last_updated  INTEGER NOT NULL DEFAULT 0
            );
            ",
        )?;
        Ok(())
    }

    // ── Wrestlers ──

    /// Register a wrestler id without profile data, e.g. from seeding.
    pub fn insert_wrestler_stub(&self, id: i64, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO wrestlers (wrestler_id, name) VALUES (?1, ?2)",
            rusqlite::params![id, name],
        )?;
        Ok(())
    }

    pub fn wrestler_exists(&self, id: i64) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM wrestlers WHERE wrestler_id = ?1",
                [id],
                |_| Ok(()),
            )
            .is_ok()
    }

    pub fn get_name(&self, id: i64) -> String {
        self.conn
            .query_row(
                "SELECT name FROM wrestlers WHERE wrestler_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let fields_json = serde_json::to_string(&profile.fields)?;
        self.conn.execute(
            "INSERT INTO wrestlers
             (wrestler_id, name, gender, promotion, location, career_start, career_end,
              profile_json, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(wrestler_id) DO UPDATE SET
                name = excluded.name,
                gender = excluded.gender,
                promotion = excluded.promotion,
                location = excluded.location,
                career_start = excluded.career_start,
                career_end = excluded.career_end,
                profile_json = excluded.profile_json,
                last_updated = excluded.last_updated",
            rusqlite::params![
                profile.id,
                profile.display_name(),
                profile.gender(),
                profile.promotion(),
                profile.location(),
                profile.fields.get("Beginning of in-ring career"),
                profile.fields.get("End of in-ring career"),
                fields_json,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    // ── Matches ──

    /// Persist one wrestler-year of match records, updating the derived
    /// fields and the opponent edge table in the same transaction.
    pub fn save_matches(&self, id: i64, year: i32, records: &[MatchRecord]) -> Result<()> {
        let mut opponent_counts: BTreeMap<i64, u32> = BTreeMap::new();
        let mut colleague_counts: BTreeMap<i64, u32> = BTreeMap::new();
        let mut promotion_counts: BTreeMap<i64, u32> = BTreeMap::new();
        for record in records {
            for opponent in record.opponents_of(id) {
                *opponent_counts.entry(opponent).or_default() += 1;
            }
            // the edge table follows everyone in the match, partners too,
            // so discovery can reach them
            for colleague in record.colleagues_of(id) {
                *colleague_counts.entry(colleague).or_default() += 1;
            }
            if let Some(p) = record.promotion {
                *promotion_counts.entry(p).or_default() += 1;
            }
        }
        let opponents: Vec<i64> = opponent_counts.keys().copied().collect();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO matches
             (wrestler_id, year, match_count, records_json, opponents_json,
              promotions_json, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                id,
                year,
                records.len() as i64,
                serde_json::to_string(records)?,
                serde_json::to_string(&opponents)?,
                serde_json::to_string(&promotion_counts)?,
                Utc::now().timestamp(),
            ],
        )?;
        tx.execute(
            "DELETE FROM wrestler_opponents WHERE wrestler_id = ?1 AND year = ?2",
            rusqlite::params![id, year],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO wrestler_opponents (wrestler_id, opponent_id, year, match_count)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (colleague, count) in &colleague_counts {
                stmt.execute(rusqlite::params![id, colleague, year, count])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Mark years as known-but-unfetched so they surface as stale. Existing
    /// rows are left alone.
    pub fn create_stale_stubs(&self, id: i64, years: &BTreeSet<i32>) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut created = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO matches (wrestler_id, year, last_updated)
                 VALUES (?1, ?2, 0)",
            )?;
            for year in years {
                created += stmt.execute(rusqlite::params![id, year])?;
            }
        }
        tx.commit()?;
        Ok(created)
    }

    pub fn get_matches(&self, id: i64, year: i32) -> Result<Vec<MatchRecord>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT records_json FROM matches WHERE wrestler_id = ?1 AND year = ?2",
                rusqlite::params![id, year],
                |r| r.get(0),
            )
            .ok();
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Every non-stub (wrestler, year) row, for bulk reprocessing.
    pub fn all_match_rows(&self) -> Result<Vec<(i64, i32, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT wrestler_id, year, records_json FROM matches
             WHERE last_updated > 0 AND match_count > 0
             ORDER BY wrestler_id, year",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Promotions ──

    pub fn save_promotion(&self, promotion: &Promotion) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO promotions
             (promotion_id, name, founded, country, promotion_json, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                promotion.id,
                promotion.display_name(),
                promotion.founded,
                promotion.country,
                serde_json::to_string(&promotion.fields)?,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn get_promotion_name(&self, id: i64) -> String {
        self.conn
            .query_row(
                "SELECT name FROM promotions WHERE promotion_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap_or_else(|_| format!("Promotion {id}"))
    }

    // ── Stats ──

    pub fn stats(&self) -> Result<DbStats> {
        let count =
            |sql: &str| -> Result<usize> { Ok(self.conn.query_row(sql, [], |r| r.get(0))?) };
        Ok(DbStats {
            wrestlers: count("SELECT COUNT(*) FROM wrestlers")?,
            female: count("SELECT COUNT(*) FROM wrestlers WHERE gender = 'female'")?,
            match_years: count("SELECT COUNT(*) FROM matches WHERE last_updated > 0")?,
            stub_years: count("SELECT COUNT(*) FROM matches WHERE last_updated = 0")?,
            promotions: count("SELECT COUNT(*) FROM promotions")?,
        })
    }

    fn id_query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Vec<i64> {
        let Ok(mut stmt) = self.conn.prepare(sql) else {
            return Vec::new();
        };
        stmt.query_map(params, |r| r.get(0))
            .map(|rows| rows.flatten().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn set_matches_timestamp(&self, id: i64, year: i32, timestamp: i64) {
        self.conn
            .execute(
                "UPDATE matches SET last_updated = ?3 WHERE wrestler_id = ?1 AND year = ?2",
                rusqlite::params![id, year, timestamp],
            )
            .unwrap();
    }
}

impl Store for Db {
    fn profile_timestamp(&self, id: i64) -> i64 {
        self.conn
            .query_row(
                "SELECT last_updated FROM wrestlers WHERE wrestler_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap_or(0)
    }

    fn matches_timestamp(&self, id: i64, year: i32) -> i64 {
        self.conn
            .query_row(
                "SELECT last_updated FROM matches WHERE wrestler_id = ?1 AND year = ?2",
                rusqlite::params![id, year],
                |r| r.get(0),
            )
            .unwrap_or(0)
    }

    fn promotion_timestamp(&self, id: i64) -> i64 {
        self.conn
            .query_row(
                "SELECT last_updated FROM promotions WHERE promotion_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap_or(0)
    }

    fn available_years(&self, id: i64) -> BTreeSet<i32> {
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT year FROM matches WHERE wrestler_id = ?1")
        else {
            return BTreeSet::new();
        };
        stmt.query_map([id], |r| r.get(0))
            .map(|rows| rows.flatten().collect())
            .unwrap_or_default()
    }

    fn is_female(&self, id: i64) -> bool {
        self.conn
            .query_row(
                "SELECT gender = 'female' FROM wrestlers WHERE wrestler_id = ?1",
                [id],
                |r| r.get(0),
            )
            .unwrap_or(false)
    }

    fn all_ids(&self) -> Vec<i64> {
        self.id_query("SELECT wrestler_id FROM wrestlers ORDER BY wrestler_id", [])
    }

    fn female_ids(&self) -> Vec<i64> {
        self.id_query(
            "SELECT wrestler_id FROM wrestlers WHERE gender = 'female' ORDER BY wrestler_id",
            [],
        )
    }

    fn gender_ambiguous_ids(&self) -> Vec<i64> {
        self.id_query(
            "SELECT wrestler_id FROM wrestlers
             WHERE gender NOT IN ('male', 'female') AND gender <> ''
             ORDER BY wrestler_id",
            [],
        )
    }

    fn missing_referenced(&self) -> Vec<(i64, Vec<i64>)> {
        let Ok(mut stmt) = self.conn.prepare(
            "SELECT opponent_id, wrestler_id FROM wrestler_opponents
             WHERE opponent_id NOT IN (SELECT wrestler_id FROM wrestlers)
             ORDER BY opponent_id, wrestler_id",
        ) else {
            return Vec::new();
        };
        let mut by_unknown: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)));
        if let Ok(rows) = rows {
            for (unknown, referer) in rows.flatten() {
                by_unknown.entry(unknown).or_default().insert(referer);
            }
        }
        let mut out: Vec<(i64, Vec<i64>)> = by_unknown
            .into_iter()
            .map(|(id, refs)| (id, refs.into_iter().collect()))
            .collect();
        // most connected first, the order the discovery pass wants
        out.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
        out
    }

    fn referers(&self, id: i64) -> Vec<i64> {
        self.id_query(
            "SELECT DISTINCT wrestler_id FROM wrestler_opponents
             WHERE opponent_id = ?1 ORDER BY wrestler_id",
            [id],
        )
    }

    fn promotion_references(&self) -> Vec<(i64, u32)> {
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT promotions_json FROM matches WHERE last_updated > 0")
        else {
            return Vec::new();
        };
        let mut counts: HashMap<i64, u32> = HashMap::new();
        let rows = stmt.query_map([], |r| r.get::<_, String>(0));
        if let Ok(rows) = rows {
            for json in rows.flatten() {
                if let Ok(worked) = serde_json::from_str::<BTreeMap<i64, u32>>(&json) {
                    for (promotion, n) in worked {
                        *counts.entry(promotion).or_default() += n;
                    }
                }
            }
        }
        let mut out: Vec<(i64, u32)> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    fn match_info(&self, id: i64, year: i32) -> MatchYearInfo {
        let row: Option<(u32, String)> = self
            .conn
            .query_row(
                "SELECT match_count, opponents_json FROM matches
                 WHERE wrestler_id = ?1 AND year = ?2",
                rusqlite::params![id, year],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();
        match row {
            Some((match_count, json)) => MatchYearInfo {
                match_count,
                opponents: serde_json::from_str(&json).unwrap_or_default(),
            },
            None => MatchYearInfo::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_fragment, ParserOptions};

    const TAG_ROW: &str = r#"<tr class="TRow1"><td>1</td><td>04.01.2026</td><td><a href="?id=8&amp;nr=1467"><img alt="TJPW"></a></td><td><span class="MatchCard"><a href="?id=2&amp;nr=27181&amp;name=Toga">Toga</a> &amp; <a href="?id=2&amp;nr=14328&amp;name=Yuna+Manase">Yuna Manase</a> defeat <a href="?id=2&amp;nr=26772&amp;name=HIMAWARI">HIMAWARI</a> &amp; <a href="?id=2&amp;nr=29260&amp;name=Kira+Summer">Kira Summer</a> (9:27)</span></td></tr>"#;

    fn record() -> MatchRecord {
        parse_fragment(TAG_ROW, &ParserOptions::default()).unwrap()
    }

    #[test]
    fn save_and_reload_matches() {
        let db = Db::open_in_memory().unwrap();
        db.save_matches(27181, 2026, &[record()]).unwrap();

        let loaded = db.get_matches(27181, 2026).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].sides[0].wrestlers, vec![14328, 27181]);
        assert!(db.matches_timestamp(27181, 2026) > 0);
        assert_eq!(db.matches_timestamp(27181, 2025), 0);

        let info = db.match_info(27181, 2026);
        assert_eq!(info.match_count, 1);
        assert_eq!(info.opponents, vec![26772, 29260]);
    }

    #[test]
    fn discovery_finds_unprofiled_opponents() {
        let db = Db::open_in_memory().unwrap();
        db.insert_wrestler_stub(27181, "Toga").unwrap();
        db.save_matches(27181, 2026, &[record()]).unwrap();

        let missing = db.missing_referenced();
        let ids: Vec<i64> = missing.iter().map(|(id, _)| *id).collect();
        // everyone but the registered wrestler is unknown
        assert!(ids.contains(&14328));
        assert!(ids.contains(&26772));
        assert!(ids.contains(&29260));
        assert!(!ids.contains(&27181));
        for (_, referers) in &missing {
            assert_eq!(referers, &vec![27181]);
        }
        assert_eq!(db.referers(26772), vec![27181]);
    }

    #[test]
    fn stubs_read_as_never_fetched() {
        let db = Db::open_in_memory().unwrap();
        db.save_matches(1, 2024, &[record()]).unwrap();
        let created = db
            .create_stale_stubs(1, &BTreeSet::from([2023, 2024, 2025]))
            .unwrap();
        // 2024 already exists and is left alone
        assert_eq!(created, 2);
        assert_eq!(db.matches_timestamp(1, 2023), 0);
        assert!(db.matches_timestamp(1, 2024) > 0);
        assert_eq!(
            db.available_years(1).into_iter().collect::<Vec<_>>(),
            vec![2023, 2024, 2025]
        );
    }

    #[test]
    fn profile_save_updates_roster_queries() {
        use crate::parser::profile::parse_profile_page;
        let db = Db::open_in_memory().unwrap();
        let html = r#"<h1 class="TextHeader">Emi Sakura</h1>
            <div class="InformationBoxRow"><div class="InformationBoxTitle">Gender:</div>
            <div class="InformationBoxContents">female</div></div>"#;
        db.save_profile(&parse_profile_page(4629, html)).unwrap();

        assert!(db.is_female(4629));
        assert_eq!(db.female_ids(), vec![4629]);
        assert!(db.gender_ambiguous_ids().is_empty());
        assert_eq!(db.get_name(4629), "Emi Sakura");
        assert!(db.profile_timestamp(4629) > 0);

        let ambiguous = r#"<div class="InformationBoxRow"><div class="InformationBoxTitle">Gender:</div>
            <div class="InformationBoxContents">non-binary</div></div>"#;
        db.save_profile(&parse_profile_page(7, ambiguous)).unwrap();
        assert_eq!(db.gender_ambiguous_ids(), vec![7]);
    }

    #[test]
    fn promotion_round_trip() {
        use crate::parser::promotion::Promotion;
        let db = Db::open_in_memory().unwrap();
        assert_eq!(db.promotion_timestamp(1467), 0);
        db.save_promotion(&Promotion {
            id: 1467,
            name: Some("Tokyo Joshi Pro-Wrestling".into()),
            founded: Some("2013".into()),
            country: Some("Japan".into()),
            fields: BTreeMap::new(),
        })
        .unwrap();
        assert!(db.promotion_timestamp(1467) > 0);
        assert_eq!(db.get_promotion_name(1467), "Tokyo Joshi Pro-Wrestling");
    }

    #[test]
    fn promotion_references_aggregate_counts() {
        let db = Db::open_in_memory().unwrap();
        db.save_matches(27181, 2026, &[record()]).unwrap();
        db.save_matches(14328, 2026, &[record()]).unwrap();
        let refs = db.promotion_references();
        assert_eq!(refs, vec![(1467, 2)]);
    }
}

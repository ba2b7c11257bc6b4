//! Gender-confidence signal for scheduling.
//!
//! The scheduler treats the classifier as an opaque collaborator: anything
//! implementing `ConfidenceProvider` plugs in, and any error it returns is
//! caught at the priority boundary. Scores are expensive to derive and improve
//! as more data lands, so they are cached behind a deliberately short
//! time-to-live. The cache is its own injectable trait so tests (and future
//! backends) can swap it without touching the calculator.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use crate::db::Store;

/// Probability in [0, 1] that a wrestler belongs on the tracked roster.
pub trait ConfidenceProvider {
    fn confidence(&self, id: i64) -> Result<f64>;
}

/// Time-boxed score cache: `get` returns only fresh entries.
pub trait ConfidenceCache {
    fn get(&self, id: i64) -> Option<f64>;
    fn set(&self, id: i64, value: f64);
    fn clear(&self);
}

/// Cache freshness window. Kept short: predictions sharpen as matches land.
const TTL_SECONDS: i64 = 2 * 3600;
const CACHE_VERSION: i64 = 1;

/// SQLite-backed cache, so single-entry updates survive across runs without
/// rewriting a whole file.
pub struct SqliteConfidenceCache {
    conn: Connection,
}

impl SqliteConfidenceCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS confidence_scores (
                wrestler_id INTEGER PRIMARY KEY,
                confidence  REAL NOT NULL,
                timestamp   INTEGER NOT NULL,
                version     INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_confidence_timestamp
                ON confidence_scores(timestamp);",
        )?;
        Ok(Self { conn })
    }

    fn set_at(&self, id: i64, value: f64, timestamp: i64) {
        let _ = self.conn.execute(
            "INSERT OR REPLACE INTO confidence_scores
             (wrestler_id, confidence, timestamp, version) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, value, timestamp, CACHE_VERSION],
        );
    }

    /// Drop entries past the freshness window; returns how many went.
    pub fn clear_stale(&self) -> usize {
        let cutoff = Utc::now().timestamp() - TTL_SECONDS;
        self.conn
            .execute(
                "DELETE FROM confidence_scores WHERE timestamp < ?1",
                [cutoff],
            )
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.conn
            .query_row("SELECT COUNT(*) FROM confidence_scores", [], |r| r.get(0))
            .unwrap_or(0usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfidenceCache for SqliteConfidenceCache {
    fn get(&self, id: i64) -> Option<f64> {
        let row: Option<(f64, i64, i64)> = self
            .conn
            .query_row(
                "SELECT confidence, timestamp, version
                 FROM confidence_scores WHERE wrestler_id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .ok();
        let (confidence, timestamp, version) = row?;
        if version != CACHE_VERSION {
            return None;
        }
        if Utc::now().timestamp() - timestamp > TTL_SECONDS {
            return None;
        }
        Some(confidence)
    }

    fn set(&self, id: i64, value: f64) {
        self.set_at(id, value, Utc::now().timestamp());
    }

    fn clear(&self) {
        let _ = self.conn.execute("DELETE FROM confidence_scores", []);
    }
}

/// In-memory cache for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryConfidenceCache {
    entries: Mutex<HashMap<i64, f64>>,
}

impl ConfidenceCache for MemoryConfidenceCache {
    fn get(&self, id: i64) -> Option<f64> {
        self.entries.lock().unwrap().get(&id).copied()
    }

    fn set(&self, id: i64, value: f64) {
        self.entries.lock().unwrap().insert(id, value);
    }

    fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Provider combinator: consult the cache, fall back to the inner provider,
/// remember what it said.
pub struct Cached<P, C> {
    provider: P,
    cache: C,
}

impl<P: ConfidenceProvider, C: ConfidenceCache> Cached<P, C> {
    pub fn new(provider: P, cache: C) -> Self {
        Self { provider, cache }
    }
}

impl<P: ConfidenceProvider, C: ConfidenceCache> ConfidenceProvider for Cached<P, C> {
    fn confidence(&self, id: i64) -> Result<f64> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(cached);
        }
        let value = self.provider.confidence(id)?;
        self.cache.set(id, value);
        Ok(value)
    }
}

/// Network-affinity baseline: the fraction of a wrestler's referers that are
/// roster members. Crude, but for undiscovered wrestlers the company they
/// keep is the only signal available.
pub struct RosterAffinity<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> RosterAffinity<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: Store> ConfidenceProvider for RosterAffinity<'_, S> {
    fn confidence(&self, id: i64) -> Result<f64> {
        let referers = self.store.referers(id);
        if referers.is_empty() {
            // no evidence either way
            return Ok(0.5);
        }
        let roster = referers
            .iter()
            .filter(|&&w| self.store.is_female(w))
            .count();
        Ok(roster as f64 / referers.len() as f64)
    }
}

/// Fixed-score provider for tests and dry runs.
pub struct FixedConfidence(pub f64);

impl ConfidenceProvider for FixedConfidence {
    fn confidence(&self, _id: i64) -> Result<f64> {
        Ok(self.0)
    }
}

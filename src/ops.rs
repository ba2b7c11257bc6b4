//! Work-item execution: the bridge between the queue and the site.
//!
//! Each operation fetches, parses, and persists. Failures are logged and the
//! item is simply not marked fresh — staleness is the retry mechanism, so a
//! failed item resurfaces on the next scheduling run without any explicit
//! bookkeeping.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use anyhow::Result;
use chrono::Datelike;
use tracing::{debug, error, info, warn};

use crate::db::{Db, Store};
use crate::fetch::{FetchSession, PAGE_SIZE};
use crate::parser::{self, profile::Profile, ParserOptions};
use crate::record::{MatchRecord, SENTINEL_ID};
use crate::schedule::{Operation, WorkItem, WorkQueue};

pub struct DrainStats {
    pub processed: usize,
    pub failed: usize,
    pub remaining: usize,
}

pub struct Harvester {
    db: Db,
    session: FetchSession,
    opts: ParserOptions,
    current_year: i32,
}

impl Harvester {
    pub fn new(db: Db, session: FetchSession, current_year: i32) -> Self {
        Self {
            db,
            session,
            opts: ParserOptions::default(),
            current_year,
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn into_db(self) -> Db {
        self.db
    }

    pub fn keep_going(&self) -> bool {
        self.session.keep_going()
    }

    /// Drain the queue until empty or out of session budget. Per-item errors
    /// are logged and skipped; the item stays stale for next time.
    pub async fn drain(&mut self, queue: &mut WorkQueue) -> DrainStats {
        let mut processed = 0;
        let mut failed = 0;
        while self.keep_going() {
            let Some(item) = queue.dequeue() else { break };
            if item.priority < 30 {
                debug!(
                    "priority {} | {} | {}",
                    item.priority, item.id, item.operation
                );
            }
            match self.execute(&item).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    error!("{} | {} failed: {:#}", item.id, item.operation, e);
                }
            }
        }
        DrainStats {
            processed,
            failed,
            remaining: queue.len(),
        }
    }

    pub async fn execute(&mut self, item: &WorkItem) -> Result<()> {
        match item.operation {
            Operation::RefreshProfile => self.refresh_profile(item.id).await,
            Operation::RefreshMatchYear => match item.year {
                Some(year) => self.refresh_match_year(item.id, year).await,
                None => {
                    error!("{} | refresh_matches item without a year", item.id);
                    Ok(())
                }
            },
            Operation::RefreshAllMatches => self.refresh_all_matches(item.id).await,
            Operation::RefreshPromotion => self.refresh_promotion(item.id).await,
        }
    }

    async fn refresh_profile(&mut self, id: i64) -> Result<()> {
        if id == SENTINEL_ID {
            warn!("skipping profile refresh for sentinel id");
            return Ok(());
        }
        let known_name = self.db.get_name(id);
        info!("{} | fetching profile for {}", id, known_name);

        let url = self.session.profile_url(id);
        let html = self.session.fetch(&url).await?;
        let profile = parser::profile::parse_profile_page(id, &html);
        self.db.save_profile(&profile)?;

        if profile.gender_is_ambiguous() {
            debug!("{} | gender-ambiguous, joins the watch list", id);
        }

        if known_name == "Unknown" {
            info!("{} | learned '{}'", id, profile.display_name());
            // a newly discovered roster wrestler gets stub years over her
            // likely career span so her matches queue next session
            if profile.is_female() {
                let (start, end) = self.likely_career_range(&profile);
                info!("{} | stubbing years {}-{}", id, start, end);
                let years: BTreeSet<i32> = (start..=end).collect();
                self.db.create_stale_stubs(id, &years)?;
            }
        }
        Ok(())
    }

    async fn refresh_match_year(&mut self, id: i64, year: i32) -> Result<()> {
        if id == SENTINEL_ID {
            warn!("skipping match refresh for sentinel id");
            return Ok(());
        }
        info!("{} | fetching {} for {}", id, year, self.db.get_name(id));
        let (records, available) = self.fetch_match_pages(id, Some(year)).await?;
        self.db.save_matches(id, year, &records)?;

        if !available.is_empty() {
            debug!("{} | year dropdown lists {} years", id, available.len());
            self.db.create_stale_stubs(id, &available)?;
        }
        Ok(())
    }

    async fn refresh_all_matches(&mut self, id: i64) -> Result<()> {
        if id == SENTINEL_ID {
            warn!("skipping full match refresh for sentinel id");
            return Ok(());
        }
        info!("{} | fetching all matches for {}", id, self.db.get_name(id));
        let (records, _) = self.fetch_match_pages(id, None).await?;

        let mut by_year: BTreeMap<i32, Vec<MatchRecord>> = BTreeMap::new();
        for record in records {
            match record.year() {
                Some(year) => by_year.entry(year).or_default().push(record),
                None => warn!("{} | dropping match with unknown year", id),
            }
        }
        for (year, records) in &by_year {
            self.db.save_matches(id, *year, records)?;
        }
        // stub years that produced nothing are confirmed empty: touch them so
        // they stop reading as stale
        for year in self.db.available_years(id) {
            if !by_year.contains_key(&year) {
                self.db.save_matches(id, year, &[])?;
            }
        }
        Ok(())
    }

    async fn refresh_promotion(&mut self, id: i64) -> Result<()> {
        info!("{} | fetching promotion", id);
        let url = self.session.promotion_url(id);
        let html = self.session.fetch(&url).await?;
        let promotion = parser::promotion::parse_promotion_page(id, &html);
        self.db.save_promotion(&promotion)?;
        info!("{} | saved promotion: {}", id, promotion.display_name());
        Ok(())
    }

    /// Paged fetch of a match list. Degenerate rows are dropped here — they
    /// carry no contest structure and must not be persisted as data. The year
    /// dropdown is read from the first page only.
    async fn fetch_match_pages(
        &mut self,
        id: i64,
        year: Option<i32>,
    ) -> Result<(Vec<MatchRecord>, BTreeSet<i32>)> {
        let mut all = Vec::new();
        let mut available = BTreeSet::new();
        let mut offset = 0;

        loop {
            let url = self.session.matches_url(id, year, offset);
            let html = self.session.fetch(&url).await?;
            let page = parser::parse_results_page(&html, &self.opts);
            let page_rows = page.len();

            if offset == 0 {
                available = parser::available_years(&html);
            }
            all.extend(page.into_iter().filter(|r| !r.is_degenerate()));

            if page_rows == PAGE_SIZE {
                offset += PAGE_SIZE;
            } else {
                break;
            }
        }
        Ok((all, available))
    }

    /// Guess which years are worth stubbing for a newly discovered wrestler.
    /// Career bounds when the profile has them, otherwise just the previous
    /// year — the safest single guess for someone still active.
    fn likely_career_range(&self, profile: &Profile) -> (i32, i32) {
        let end = profile
            .career_end_year()
            .unwrap_or(self.current_year - 1)
            .min(self.current_year);
        let start = profile.career_start_year().unwrap_or(end);
        (start.min(end), end)
    }
}

/// Reference year for scheduling, from the local clock.
pub fn reference_year() -> i32 {
    chrono::Local::now().year()
}

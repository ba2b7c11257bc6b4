use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};

use ringside::confidence::{Cached, RosterAffinity, SqliteConfidenceCache};
use ringside::db::Db;
use ringside::fetch::FetchSession;
use ringside::ops::{self, Harvester};
use ringside::parser::{self, ParserOptions};
use ringside::record::MatchRecord;
use ringside::schedule::{priority, QueueBuilder, StalenessPolicy, WorkQueue};

#[derive(Parser)]
#[command(name = "ringside", about = "Women's wrestling results harvester")]
struct Cli {
    /// Path to the match database
    #[arg(long, default_value = "data/ringside.sqlite")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register wrestler ids to bootstrap an empty database
    Seed {
        /// Comma-separated wrestler ids (e.g. 4629,9462,16547)
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,
    },
    /// Build the work queue and list it without fetching anything
    Plan {
        /// Limit to these wrestler ids
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<i64>>,
        /// Ignore staleness checks and queue everything
        #[arg(long)]
        force: bool,
        /// Max items to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Build the work queue and drain it against the site
    Run {
        /// Limit to these wrestler ids
        #[arg(long, value_delimiter = ',')]
        ids: Option<Vec<i64>>,
        /// Ignore staleness checks and queue everything
        #[arg(long)]
        force: bool,
        /// Seconds between requests (also lifts the session cap)
        #[arg(long)]
        slow: Option<f64>,
        /// Hard request cap for this session
        #[arg(long, default_value = "100")]
        cap: u32,
    },
    /// Work queue and database statistics
    Stats,
    /// Re-extract every stored match from its raw row HTML
    Reparse,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    if let Some(dir) = cli.db.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let result = match cli.command {
        Commands::Seed { ids } => {
            let db = Db::open(&cli.db)?;
            for id in &ids {
                db.insert_wrestler_stub(*id, "Unknown")?;
            }
            println!("Registered {} wrestlers.", ids.len());
            Ok(())
        }
        Commands::Plan { ids, force, limit } => {
            let db = Db::open(&cli.db)?;
            let queue = build_queue(&db, &cli.db, ids, force)?;
            let total = queue.len();
            println!("Work queue: {total} items");
            for item in queue.into_sorted_items().into_iter().take(limit) {
                let year = item.year.map(|y| format!(" ({y})")).unwrap_or_default();
                println!(
                    "[P{:>3}] {} | {} ({}){}",
                    item.priority,
                    item.operation,
                    db.get_name(item.id),
                    item.id,
                    year
                );
            }
            if total > limit {
                println!("... and {} more", total - limit);
            }
            Ok(())
        }
        Commands::Run {
            ids,
            force,
            slow,
            cap,
        } => {
            let db = Db::open(&cli.db)?;
            let mut queue = build_queue(&db, &cli.db, ids, force)?;
            if queue.is_empty() {
                println!("Nothing to fetch; store is fresh.");
                return Ok(());
            }
            println!("Draining {} queued items...", queue.len());

            let session = match slow {
                Some(delay) => FetchSession::with_limits(delay, u32::MAX)?,
                None => FetchSession::with_limits(1.0, cap)?,
            };
            let mut harvester = Harvester::new(db, session, ops::reference_year());
            let stats = harvester.drain(&mut queue).await;
            println!(
                "Done: {} processed, {} failed, {} left for next session.",
                stats.processed, stats.failed, stats.remaining
            );
            Ok(())
        }
        Commands::Stats => {
            let db = Db::open(&cli.db)?;
            let s = db.stats()?;
            println!("Wrestlers:   {}", s.wrestlers);
            println!("  roster:    {}", s.female);
            println!("Match years: {}", s.match_years);
            println!("  stubs:     {}", s.stub_years);
            println!("Promotions:  {}", s.promotions);

            let queue = build_queue(&db, &cli.db, None, false)?;
            print_queue_stats(queue);
            Ok(())
        }
        Commands::Reparse => {
            let db = Db::open(&cli.db)?;
            reparse_all(&db)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn build_queue(
    db: &Db,
    db_path: &Path,
    ids: Option<Vec<i64>>,
    force: bool,
) -> Result<WorkQueue> {
    let policy = StalenessPolicy::new(Utc::now().timestamp(), ops::reference_year());
    let in_transition = priority::in_transition_window(Local::now().date_naive());

    let cache_path = db_path.with_extension("confidence.sqlite");
    let provider = Cached::new(
        RosterAffinity::new(db),
        SqliteConfidenceCache::open(&cache_path)?,
    );

    let mut builder = QueueBuilder::new(db, &provider, policy, in_transition);
    if let Some(ids) = ids {
        builder = builder.with_filter(ids.into_iter().collect::<BTreeSet<i64>>());
    }
    if force {
        builder = builder.with_force();
    }
    Ok(builder.build())
}

fn print_queue_stats(queue: WorkQueue) {
    use std::collections::BTreeMap;

    let items = queue.into_sorted_items();
    println!("\nWork queue: {} items", items.len());

    let mut operations: BTreeMap<String, usize> = BTreeMap::new();
    let mut buckets: BTreeMap<i32, usize> = BTreeMap::new();
    let mut years: BTreeMap<i32, usize> = BTreeMap::new();
    let mut wrestlers: BTreeSet<i64> = BTreeSet::new();

    for item in &items {
        *operations.entry(item.operation.to_string()).or_default() += 1;
        *buckets.entry(item.priority / 10 * 10).or_default() += 1;
        if let Some(year) = item.year {
            *years.entry(year).or_default() += 1;
        }
        wrestlers.insert(item.id);
    }

    println!("\nOperations:");
    for (op, count) in &operations {
        println!("  {op}: {count}");
    }
    println!("\nPriority distribution:");
    for (bucket, count) in &buckets {
        println!("  {}-{}: {} items", bucket, bucket + 9, count);
    }
    println!("\nYear distribution:");
    for (year, count) in years.iter().rev() {
        println!("  {year}: {count} items");
    }
    println!("\nUnique entities: {}", wrestlers.len());
}

/// Re-extract every stored record from its raw row HTML. Used after parser
/// changes so the whole store migrates without re-fetching anything.
fn reparse_all(db: &Db) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let rows = db.all_match_rows()?;
    if rows.is_empty() {
        println!("No stored matches to reparse.");
        return Ok(());
    }
    println!("Reparsing {} wrestler-years...", rows.len());

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let opts = ParserOptions::default();
    let mut reparsed = 0usize;
    for chunk in rows.chunks(500) {
        let results: Vec<(i64, i32, Vec<MatchRecord>)> = chunk
            .par_iter()
            .map(|(id, year, json)| {
                let stored: Vec<MatchRecord> = serde_json::from_str(json).unwrap_or_default();
                let fresh: Vec<MatchRecord> = stored
                    .iter()
                    .filter(|r| !r.raw_html.is_empty())
                    .filter_map(|r| parser::parse_fragment(&r.raw_html, &opts))
                    .filter(|r| !r.is_degenerate())
                    .collect();
                (*id, *year, fresh)
            })
            .collect();

        for (id, year, records) in results {
            reparsed += records.len();
            db.save_matches(id, year, &records)?;
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    println!("Reparsed {reparsed} matches.");
    Ok(())
}

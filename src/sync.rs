//! Sync orchestration: discover titles, fetch and parse them batch by batch,
//! persist the results, then rebuild the upcoming-releases schedule.
//!
//! Inside a batch every title is fetched and parsed concurrently. Writes happen
//! afterwards, one at a time, so the database only ever sees a single writer.

use crate::card::parse_card;
use crate::config::{pause, SyncConfig};
use crate::discovery::{discover_all_titles, incremental_titles, recently_changed_titles};
use crate::error::{CardError, SkipReason};
use crate::models::{Card, Outcome, Phase, SyncMode};
use crate::schedule::refresh_schedule;
use crate::stats::SyncStats;
use crate::store::Store;
use crate::wiki::{RecentWindow, WikiSource};
use anyhow::{bail, Result};
use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tally of one run, printed by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// Titles selected for fetching
    pub attempted: u64,
    pub synced: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Rows written to the schedule table; zero when it was left untouched
    pub scheduled: usize,
    pub total_in_db: u64,
    pub elapsed: Duration,
}

fn make_progress_bar(total: u64, show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "    {spinner:.cyan} Cards          [{bar:30.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Fetches one page and turns it into a card record.
pub async fn fetch_card<S: WikiSource + ?Sized>(
    source: &S,
    title: &str,
) -> Result<Card, CardError> {
    let wikitext = match source.page_wikitext(title).await? {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(SkipReason::MissingWikitext.into()),
    };
    Ok(parse_card(&wikitext, title)?)
}

async fn select_titles<S: WikiSource + ?Sized>(
    source: &S,
    store: &Store,
    config: &SyncConfig,
    mode: SyncMode,
) -> Result<Vec<String>> {
    let all = discover_all_titles(source, config).await;
    if all.is_empty() {
        bail!("No card titles discovered; the wiki may be unreachable");
    }

    match mode {
        SyncMode::Full => Ok(all),
        SyncMode::Resync => {
            info!(
                titles = all.len(),
                "Re-syncing every card, existing records will be overwritten"
            );
            Ok(all)
        }
        SyncMode::Update => {
            let known = store.known_titles()?;
            let window = RecentWindow::trailing(Utc::now(), config.recent_window_hours);
            let recent = recently_changed_titles(source, window, config).await;
            debug!(known = known.len(), recent = recent.len(), "Update inputs");
            Ok(incremental_titles(&all, &known, &recent))
        }
    }
}

fn store_outcome(
    store: &Store,
    title: &str,
    outcome: Result<Card, CardError>,
    synced_at: &str,
) -> Outcome {
    match outcome {
        Ok(card) => match store.upsert_card(&card, synced_at) {
            Ok(()) => Outcome::Synced,
            Err(e) => {
                warn!(title, error = %e, "Failed to store card");
                Outcome::Failed
            }
        },
        Err(CardError::Skip(reason)) => {
            debug!(title, %reason, "Skipped page");
            Outcome::Skipped
        }
        Err(CardError::Wiki(e)) => {
            warn!(title, error = %e, "Failed to fetch page");
            Outcome::Failed
        }
    }
}

/// Runs one sync in `mode` against `source`, writing into `store`.
///
/// Per-title problems are counted, never fatal. The run fails only when
/// discovery yields no titles at all or the store itself cannot be read.
pub async fn run_sync<S: WikiSource + ?Sized>(
    source: &S,
    store: &mut Store,
    config: &SyncConfig,
    mode: SyncMode,
) -> Result<SyncReport> {
    let start = Instant::now();
    info!(%mode, phase = %Phase::Discovering, "Starting sync");

    let titles = select_titles(source, store, config, mode).await?;
    let stats = SyncStats::new();

    if titles.is_empty() {
        info!("Nothing to sync");
    } else {
        let batch_size = config.batch_size.max(1);
        let batches = titles.len().div_ceil(batch_size);
        let pb = make_progress_bar(titles.len() as u64, config.show_progress);

        for (i, batch) in titles.chunks(batch_size).enumerate() {
            if i > 0 {
                pause(config.batch_delay).await;
            }
            let number = i + 1;
            let fetching = Phase::Fetching {
                batch: number,
                of: batches,
            };
            debug!(phase = %fetching, size = batch.len());
            let outcomes = join_all(batch.iter().map(|title| fetch_card(source, title))).await;

            let persisting = Phase::Persisting { batch: number };
            debug!(phase = %persisting);
            let synced_at = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
            for (title, outcome) in batch.iter().zip(outcomes) {
                stats.record(store_outcome(store, title, outcome, &synced_at));
                pb.inc(1);
            }

            info!(
                batch = number,
                of = batches,
                processed = stats.processed(),
                synced = stats.synced(),
                skipped = stats.skipped(),
                failed = stats.failed(),
                "Batch complete"
            );
        }
        pb.finish_and_clear();
    }

    info!(phase = %Phase::SchedulingRefresh);
    let scheduled = refresh_schedule(source, store).await?;

    let report = SyncReport {
        mode,
        attempted: titles.len() as u64,
        synced: stats.synced(),
        skipped: stats.skipped(),
        failed: stats.failed(),
        scheduled,
        total_in_db: store.card_count()?,
        elapsed: start.elapsed(),
    };
    info!(
        phase = %Phase::Done,
        synced = report.synced,
        skipped = report.skipped,
        failed = report.failed,
        total = report.total_in_db,
        "Sync finished"
    );
    Ok(report)
}

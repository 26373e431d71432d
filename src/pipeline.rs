//! The poll cycle and the commands built on the stored entries.
//!
//! # Cycle
//!
//! 1. Poll every source ([`poll_sources`])
//! 2. If the sink was never initialized, every candidate is new; otherwise
//!    read the most recent `window_size` rows and keep the candidates whose
//!    key is absent ([`new_entries`])
//! 3. Append the new entries, all stamped with the same ingestion time
//!
//! A sink error ends the cycle. [`run_forever`] logs it and tries again after
//! the next sleep; `once` returns it.

use crate::analysis::analyze_story;
use crate::config::Config;
use crate::dedup::{drop_duplicates, new_entries};
use crate::fetch::{Fetch, RetryPolicy};
use crate::models::{FeedSource, StoredEntry, StoryAnalysis};
use crate::poller::poll_sources;
use crate::scrapers::reuters::fetch_story;
use crate::sinks::Sink;
use crate::sinks::jsonl::{append_records, read_records};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Counts from one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries parsed from all sources.
    pub candidates: usize,
    /// Entries appended to the sink.
    pub appended: usize,
    /// Categories whose feed failed this cycle.
    pub failed_sources: Vec<String>,
    /// The sink did not exist before this cycle.
    pub initialized: bool,
}

/// Run one poll cycle.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), window_size = window_size))]
pub async fn run_cycle<S: Sink, F: Fetch>(
    sink: &S,
    fetcher: &F,
    sources: &[FeedSource],
    window_size: usize,
    policy: &RetryPolicy,
) -> Result<CycleReport, Box<dyn Error>> {
    let outcome = poll_sources(fetcher, sources, policy).await;
    let candidates = outcome.entries.len();

    let initialized = !sink.exists().await?;
    let fresh = if initialized {
        info!(candidates, "Sink not initialized; every entry is new");
        outcome.entries
    } else {
        let window = sink.read_recent(window_size).await?;
        debug!(window = window.len(), "Read dedup window");
        new_entries(outcome.entries, &window)
    };

    let appended = fresh.len();
    if appended > 0 {
        let ingested_at = Utc::now();
        let rows: Vec<StoredEntry> = fresh
            .into_iter()
            .map(|entry| StoredEntry::new(entry, ingested_at))
            .collect();
        sink.append(&rows).await?;
    }

    info!(candidates, appended, failed = outcome.failed.len(), "Cycle complete");
    Ok(CycleReport {
        candidates,
        appended,
        failed_sources: outcome.failed,
        initialized: initialized && appended > 0,
    })
}

/// Poll until `shutdown` resolves, sleeping `poll_interval` between cycles.
///
/// Cycle errors are logged and do not stop the loop. `shutdown` is watched
/// during cycles as well as sleeps. Returns the number of cycles started.
#[instrument(level = "info", skip_all)]
pub async fn run_forever<S, F, Q>(sink: &S, fetcher: &F, config: &Config, shutdown: Q) -> u64
where
    S: Sink,
    F: Fetch,
    Q: Future<Output = ()>,
{
    let policy = RetryPolicy::from(&config.retry);
    let interval = config.poll_interval();
    info!(
        feeds = config.feeds.len(),
        interval_secs = interval.as_secs(),
        window_size = config.window_size,
        "Polling started"
    );
    tokio::pin!(shutdown);

    let mut cycles = 0u64;
    loop {
        cycles += 1;
        tokio::select! {
            result = run_cycle(sink, fetcher, &config.feeds, config.window_size, &policy) => {
                if let Err(e) = result {
                    error!(cycle = cycles, error = %e, "Cycle failed; will retry after sleeping");
                }
            }
            _ = &mut shutdown => {
                info!(cycles, "Interrupted during a cycle; stopping");
                break;
            }
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = &mut shutdown => {
                info!(cycles, "Interrupted; stopping");
                break;
            }
        }
    }
    cycles
}

/// Rewrite the sink without duplicate keys. Returns `(before, after)` row counts.
#[instrument(level = "info", skip_all)]
pub async fn rebuild<S: Sink>(sink: &S) -> Result<(usize, usize), Box<dyn Error>> {
    if !sink.exists().await? {
        info!("Sink not initialized; nothing to rebuild");
        return Ok((0, 0));
    }
    let rows = sink.read_all().await?;
    let before = rows.len();
    let deduped = drop_duplicates(rows);
    let after = deduped.len();
    if after < before {
        sink.replace_all(&deduped).await?;
    }
    info!(before, after, removed = before - after, "Rebuilt sink");
    Ok((before, after))
}

/// Analyze the articles behind the most recent `limit` stored entries.
///
/// Stories already in the story store, and repeats within the batch, are
/// skipped. Articles that fail to fetch or have no body are logged and
/// skipped. Returns the number of analyses appended.
#[instrument(level = "info", skip(sink, fetcher, stories_path), fields(stories_path = %stories_path.display()))]
pub async fn analyze_recent<S: Sink, F: Fetch>(
    sink: &S,
    fetcher: &F,
    stories_path: &Path,
    limit: usize,
) -> Result<usize, Box<dyn Error>> {
    let known: Vec<StoryAnalysis> = if fs::try_exists(stories_path).await? {
        read_records(stories_path).await?
    } else {
        Vec::new()
    };
    let known: HashSet<String> = known.into_iter().map(|story| story.origin_link).collect();

    let pending: Vec<StoredEntry> = sink
        .read_recent(limit)
        .await?
        .into_iter()
        .filter(|row| !known.contains(&row.entry.origin_link))
        .unique_by(|row| row.entry.origin_link.clone())
        .collect();
    info!(pending = pending.len(), known = known.len(), "Stories to analyze");

    let analyses: Vec<StoryAnalysis> = stream::iter(pending)
        .then(|row: StoredEntry| async move {
            let url = row.entry.origin_link.as_str();
            match fetch_story(fetcher, url).await {
                Ok(Some(story)) => {
                    let mut analysis =
                        analyze_story(url, &row.entry.category, row.entry.title(), &story.body, Utc::now());
                    analysis.published_at = story.published_at;
                    Some(analysis)
                }
                Ok(None) => {
                    warn!(%url, "Story produced no content");
                    None
                }
                Err(e) => {
                    error!(error = %e, %url, "Story fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    if !analyses.is_empty() {
        append_records(stories_path, &analyses).await?;
    }
    info!(count = analyses.len(), "Analyzed stories");
    Ok(analyses.len())
}

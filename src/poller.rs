//! Fetching every configured feed once and collecting the candidates.
//!
//! Sources are fetched one after another in configuration order. Fetching
//! and parsing a source is retried as one unit under the [`RetryPolicy`]; a
//! source that still fails is logged and contributes nothing to this cycle,
//! while the others carry on.

use crate::feed::parse_feed;
use crate::fetch::{Fetch, RetryPolicy, with_retry};
use crate::models::{FeedEntry, FeedSource};
use crate::utils::truncate_for_log;
use std::error::Error;
use tracing::{debug, error, info, instrument};

/// What one pass over all sources produced.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Entries from every source that succeeded, in source order.
    pub entries: Vec<FeedEntry>,
    /// Categories of sources skipped this cycle.
    pub failed: Vec<String>,
}

async fn fetch_source<F: Fetch>(fetcher: &F, source: &FeedSource) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    let body = fetcher.fetch(&source.url).await?;
    parse_feed(&body, &source.category).map_err(|e| {
        format!(
            "feed did not parse: {e}; body starts {}",
            truncate_for_log(&body, 200)
        )
        .into()
    })
}

#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn poll_sources<F: Fetch>(fetcher: &F, sources: &[FeedSource], policy: &RetryPolicy) -> PollOutcome {
    let mut outcome = PollOutcome::default();

    for source in sources {
        debug!(category = %source.category, url = %source.url, "Polling feed");
        match with_retry(policy, || fetch_source(fetcher, source)).await {
            Ok(entries) => {
                debug!(category = %source.category, count = entries.len(), "Parsed feed");
                outcome.entries.extend(entries);
            }
            Err(e) => {
                error!(category = %source.category, url = %source.url, error = %e, "Feed failed; skipping for this cycle");
                outcome.failed.push(source.category.clone());
            }
        }
    }

    info!(
        entries = outcome.entries.len(),
        failed = outcome.failed.len(),
        "Polled feeds"
    );
    outcome
}

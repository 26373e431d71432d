//! # ticker_feeds
//!
//! Polls RSS/Atom news feeds on a timer, keeps only the entries it has not
//! seen recently, and appends them to a JSON Lines file or a SQLite table.
//! Around that loop sit a few one-shot commands that scrape the pages the
//! feeds point at.
//!
//! ## Usage
//!
//! ```sh
//! ticker_feeds --config feeds.yaml poll
//! ticker_feeds once
//! ticker_feeds discover http://www.reuters.com/tools/rss
//! ticker_feeds listings --out-dir ./listings
//! ticker_feeds analyze --limit 200
//! ```
//!
//! ## Architecture
//!
//! 1. **Polling**: fetch each configured feed in order, with bounded retry
//! 2. **Dedup**: drop candidates whose `(origin_link, id)` is in the most
//!    recent window of stored rows
//! 3. **Storage**: append the rest to the configured sink
//! 4. **Analysis**: scrape article bodies, find tickers, score sentiment

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod cli;
mod config;
mod dedup;
mod feed;
mod fetch;
mod models;
mod outputs;
mod pipeline;
mod poller;
mod scrapers;
mod sentiment;
mod sinks;
mod utils;

use cli::{Cli, Command};
use config::{Config, SinkConfig};
use fetch::{HttpFetcher, RetryFetch, RetryPolicy};
use sinks::SinkHandle;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ticker_feeds starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.command, "Parsed CLI arguments");

    let config = match Config::load(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!(path = ?args.config, error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    let http = HttpFetcher::new(&config.user_agent, config.request_timeout())?;
    let policy = RetryPolicy::from(&config.retry);

    match args.command {
        Command::Poll => {
            let sink = open_sink(&config.sink)?;
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Could not listen for Ctrl-C; poll with no shutdown signal");
                    std::future::pending::<()>().await;
                }
            };
            pipeline::run_forever(&sink, &http, &config, ctrl_c).await;
        }
        Command::Once => {
            let sink = open_sink(&config.sink)?;
            let report =
                pipeline::run_cycle(&sink, &http, &config.feeds, config.window_size, &policy).await?;
            println!(
                "{} candidates, {} new, {} feeds failed{}",
                report.candidates,
                report.appended,
                report.failed_sources.len(),
                if report.initialized { " (store created)" } else { "" }
            );
        }
        Command::Rebuild => {
            let sink = open_sink(&config.sink)?;
            let (before, after) = pipeline::rebuild(&sink).await?;
            println!("{before} rows before, {after} after");
        }
        Command::Discover { url } => {
            let fetcher = RetryFetch::new(http, policy);
            let feeds = scrapers::reuters::discover_feeds(&fetcher, &url).await?;
            print!("{}", serde_yaml::to_string(&FeedsOnly { feeds: &feeds })?);
        }
        Command::Listings { url, out_dir } => {
            ensure_writable_dir(&out_dir).await?;
            let fetcher = RetryFetch::new(http, policy);
            let listings = scrapers::nasdaq::fetch_listings(&fetcher, &url).await?;
            let date = chrono::Local::now().date_naive();
            let path = outputs::json::write_listings(&listings, &out_dir, date).await?;
            println!("{}", path.display());
        }
        Command::Analyze { limit, out } => {
            let sink = open_sink(&config.sink)?;
            let stories_path: PathBuf = out.unwrap_or_else(|| config.stories_path.clone());
            let fetcher = RetryFetch::new(http, policy);
            let count = pipeline::analyze_recent(&sink, &fetcher, &stories_path, limit).await?;
            println!("{count} stories analyzed into {}", stories_path.display());
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// The `feeds:` section of a config file.
#[derive(serde::Serialize)]
struct FeedsOnly<'a> {
    feeds: &'a [models::FeedSource],
}

fn open_sink(config: &SinkConfig) -> Result<SinkHandle, Box<dyn Error>> {
    let sink = SinkHandle::open(config)?;
    match &sink {
        SinkHandle::Jsonl(jsonl) => info!(path = %jsonl.path().display(), "Using JSON Lines sink"),
        SinkHandle::Sqlite(sqlite) => info!(table = %sqlite.table(), "Using SQLite sink"),
    }
    Ok(sink)
}

//! YAML configuration for the poller.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration that polls the Reuters category feeds into a JSON
//! Lines file in the current directory.
//!
//! ```yaml
//! feeds:
//!   - category: biz
//!     url: http://feeds.reuters.com/reuters/businessNews
//! poll_interval_secs: 60
//! window_size: 3000
//! sink:
//!   kind: sqlite
//!   path: rss_feeds.db
//!   table: reuters_raw_rss
//! retry:
//!   max_retries: 3
//!   base_delay_ms: 1000
//! ```

use crate::models::FeedSource;
use crate::sinks::sqlite::is_valid_table_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Feeds polled when the config does not list any.
const REUTERS_FEEDS: &[(&str, &str)] = &[
    ("biz", "http://feeds.reuters.com/reuters/businessNews"),
    ("company", "http://feeds.reuters.com/reuters/companyNews"),
    ("health", "http://feeds.reuters.com/reuters/healthNews"),
    ("wealth", "http://feeds.reuters.com/news/wealth"),
    ("mostRead", "http://feeds.reuters.com/reuters/MostRead"),
    ("politics", "http://feeds.reuters.com/Reuters/PoliticsNews"),
    ("tech", "http://feeds.reuters.com/reuters/technologyNews"),
    ("top", "http://feeds.reuters.com/reuters/topNews"),
    ("US", "http://feeds.reuters.com/Reuters/domesticNews"),
    ("world", "http://feeds.reuters.com/Reuters/worldNews"),
];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Feeds to poll, in order.
    pub feeds: Vec<FeedSource>,
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: u64,
    /// Number of most recently stored rows compared against each new batch.
    pub window_size: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub sink: SinkConfig,
    pub retry: RetryConfig,
    /// JSON Lines file holding analyzed stories.
    pub stories_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: REUTERS_FEEDS
                .iter()
                .map(|(category, url)| FeedSource {
                    category: category.to_string(),
                    url: url.to_string(),
                })
                .collect(),
            poll_interval_secs: 60,
            window_size: 3000,
            request_timeout_secs: 30,
            user_agent: concat!("ticker_feeds/", env!("CARGO_PKG_VERSION")).to_string(),
            sink: SinkConfig::default(),
            retry: RetryConfig::default(),
            stories_path: PathBuf::from("reuters_story_bodies.jsonl"),
        }
    }
}

/// Where accepted entries are stored.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkConfig {
    /// One JSON object per line, appended.
    Jsonl { path: PathBuf },
    /// A table in a SQLite database.
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_table")]
        table: String,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Jsonl {
            path: PathBuf::from("reuters_raw_rss.jsonl"),
        }
    }
}

fn default_table() -> String {
    "reuters_raw_rss".to_string()
}

/// Bounded retry with exponential backoff for feed fetches.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

impl Config {
    /// Load the config from `path`, or the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Config, Box<dyn Error>> {
        let config = match path {
            Some(path) => {
                let contents = tokio::fs::read_to_string(path).await?;
                let config = Config::from_yaml(&contents)?;
                info!(path, feeds = config.feeds.len(), "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using defaults");
                Config::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Config, Box<dyn Error>> {
        // an empty document deserializes to unit, not to an empty map
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.feeds.is_empty() {
            return Err("config lists no feeds".into());
        }
        let mut categories = HashSet::new();
        for feed in &self.feeds {
            if !categories.insert(feed.category.as_str()) {
                return Err(format!("duplicate feed category `{}`", feed.category).into());
            }
            let url = Url::parse(&feed.url)
                .map_err(|e| format!("feed `{}` has an invalid url: {e}", feed.category))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(format!("feed `{}` must use http or https", feed.category).into());
            }
        }
        if self.window_size == 0 {
            return Err("window_size must be greater than zero".into());
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than zero".into());
        }
        if let SinkConfig::Sqlite { table, .. } = &self.sink {
            if !is_valid_table_name(table) {
                return Err(format!("invalid sqlite table name `{table}`").into());
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

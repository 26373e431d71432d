//! Data models for feed entries, stored rows, and scraped records.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedEntry`]: One entry parsed from a feed during a poll cycle
//! - [`StoredEntry`]: A [`FeedEntry`] as persisted by a sink, with its ingestion time
//! - [`StoryAnalysis`]: Tickers and sentiment extracted from an article body
//! - [`CompanyListing`]: One row of the company screener table
//! - [`FeedSource`]: A configured (or discovered) feed: category label and URL

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single entry parsed from a syndication feed.
///
/// Two entries are the same entry if and only if their [`key`](FeedEntry::key)
/// matches. Every other field may change between polls (a publisher editing a
/// headline does not make a new entry).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedEntry {
    /// Canonical article URL (`feedburner:origLink` when the feed provides one).
    pub origin_link: String,
    /// Feed-provided unique identifier (`<guid>` or `<id>`).
    pub id: String,
    /// Label of the configured feed this entry came from.
    pub category: String,
    /// Publication time parsed from the feed, if it could be parsed.
    pub published_at: Option<DateTime<Utc>>,
    /// Remaining fields copied from the feed (title, description, ...).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl FeedEntry {
    /// The identity key `(origin_link, id)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.origin_link, &self.id)
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").map(String::as_str)
    }
}

/// A feed entry as persisted in a sink.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoredEntry {
    #[serde(flatten)]
    pub entry: FeedEntry,
    /// When the sink accepted this row. Shared by every row of one cycle.
    pub ingested_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(entry: FeedEntry, ingested_at: DateTime<Utc>) -> Self {
        Self { entry, ingested_at }
    }

    pub fn key(&self) -> (&str, &str) {
        self.entry.key()
    }
}

/// Lexicon sentiment scores for a span of text.
///
/// `pos`, `neg` and `neu` are proportions of scored tokens and sum to 1.0
/// (or are all zero for empty text). `compound` is normalized to `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct SentimentScores {
    pub compound: f64,
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
}

/// The result of scraping and analyzing one article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoryAnalysis {
    /// The article URL; stories are keyed on this.
    pub origin_link: String,
    pub category: String,
    pub title: Option<String>,
    /// Cleaned article body.
    pub body: String,
    /// Tickers found in the body, in order of first appearance.
    pub tickers: Vec<String>,
    /// Sentiment of the whole body.
    pub overall: SentimentScores,
    /// Mean sentiment of the sentences mentioning each ticker.
    #[serde(default)]
    pub ticker_sentiments: BTreeMap<String, SentimentScores>,
    /// A ticker whose company is named in the title, if exactly one is.
    pub main_ticker: Option<String>,
    /// Publication time printed on the article page, if one was found.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub analyzed_at: DateTime<Utc>,
}

/// One row of the company screener table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CompanyListing {
    pub ticker: String,
    pub company_name: String,
    /// Market capitalization in dollars, `None` when listed as `n/a`.
    pub market_cap: Option<f64>,
    pub country: Option<String>,
    pub ipo_year: Option<u16>,
    pub subsector: Option<String>,
}

/// A feed to poll: the category label attached to its entries, and its URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    pub category: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> FeedEntry {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), "Markets rally".to_string());
        FeedEntry {
            origin_link: "https://example.com/a".to_string(),
            id: "id-1".to_string(),
            category: "biz".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2018, 8, 20, 14, 3, 11).unwrap()),
            fields,
        }
    }

    #[test]
    fn test_key_ignores_other_fields() {
        let a = entry();
        let mut b = entry();
        b.fields.insert("title".to_string(), "Markets slump".to_string());
        b.category = "top".to_string();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.title(), Some("Markets rally"));
    }

    #[test]
    fn test_stored_entry_serialization_is_flat() {
        let stored = StoredEntry::new(entry(), Utc.with_ymd_and_hms(2018, 8, 20, 15, 0, 0).unwrap());
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["origin_link"], "https://example.com/a");
        assert_eq!(json["fields"]["title"], "Markets rally");
        assert!(json.get("entry").is_none());

        let back: StoredEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_feed_entry_fields_default_when_missing() {
        let json = r#"{
            "origin_link": "https://example.com/b",
            "id": "b",
            "category": "tech",
            "published_at": null
        }"#;
        let entry: FeedEntry = serde_json::from_str(json).unwrap();
        assert!(entry.fields.is_empty());
        assert_eq!(entry.title(), None);
    }
}

//! Append-only storage for accepted feed entries.
//!
//! The dedup logic only needs the [`Sink`] capability, so it can run against a
//! flat file, a database table, or (in tests) an in-memory vector.
//!
//! | Kind | Module | Storage |
//! |------|--------|---------|
//! | `jsonl` | [`jsonl`] | One JSON object per line, appended |
//! | `sqlite` | [`sqlite`] | A table in a SQLite database |
//!
//! Steady-state writes only ever append. [`Sink::read_all`] and
//! [`Sink::replace_all`] exist for the `rebuild` maintenance command.

use crate::config::SinkConfig;
use crate::models::StoredEntry;
use std::error::Error;

pub mod jsonl;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub use jsonl::JsonlSink;
pub use sqlite::SqliteSink;

/// Storage capability used by the poll loop.
pub trait Sink {
    /// Whether the store has ever been initialized (written to).
    async fn exists(&self) -> Result<bool, Box<dyn Error>>;

    /// The `n` most recently appended rows, oldest first.
    ///
    /// An uninitialized store yields an empty vector.
    async fn read_recent(&self, n: usize) -> Result<Vec<StoredEntry>, Box<dyn Error>>;

    /// Append rows after everything already stored. Existing rows are untouched.
    async fn append(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>>;

    /// Every stored row, in append order.
    async fn read_all(&self) -> Result<Vec<StoredEntry>, Box<dyn Error>>;

    /// Replace the whole store with `rows`. Maintenance only.
    async fn replace_all(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>>;
}

/// The sink selected in the configuration.
#[derive(Debug)]
pub enum SinkHandle {
    Jsonl(JsonlSink),
    Sqlite(SqliteSink),
}

impl SinkHandle {
    /// Open the configured sink. Opening never creates the store itself; the
    /// first append does.
    pub fn open(config: &SinkConfig) -> Result<Self, Box<dyn Error>> {
        Ok(match config {
            SinkConfig::Jsonl { path } => SinkHandle::Jsonl(JsonlSink::new(path)),
            SinkConfig::Sqlite { path, table } => SinkHandle::Sqlite(SqliteSink::open(path, table)?),
        })
    }
}

impl Sink for SinkHandle {
    async fn exists(&self) -> Result<bool, Box<dyn Error>> {
        match self {
            SinkHandle::Jsonl(sink) => sink.exists().await,
            SinkHandle::Sqlite(sink) => sink.exists().await,
        }
    }

    async fn read_recent(&self, n: usize) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        match self {
            SinkHandle::Jsonl(sink) => sink.read_recent(n).await,
            SinkHandle::Sqlite(sink) => sink.read_recent(n).await,
        }
    }

    async fn append(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        match self {
            SinkHandle::Jsonl(sink) => sink.append(rows).await,
            SinkHandle::Sqlite(sink) => sink.append(rows).await,
        }
    }

    async fn read_all(&self) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        match self {
            SinkHandle::Jsonl(sink) => sink.read_all().await,
            SinkHandle::Sqlite(sink) => sink.read_all().await,
        }
    }

    async fn replace_all(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        match self {
            SinkHandle::Jsonl(sink) => sink.replace_all(rows).await,
            SinkHandle::Sqlite(sink) => sink.replace_all(rows).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::FeedEntry;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "ticker_feeds_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    pub(crate) fn row(link: &str, id: &str, title: &str, hour: u32) -> StoredEntry {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), title.to_string());
        StoredEntry::new(
            FeedEntry {
                origin_link: link.to_string(),
                id: id.to_string(),
                category: "biz".to_string(),
                published_at: Some(Utc.with_ymd_and_hms(2018, 8, 20, hour, 0, 0).unwrap()),
                fields,
            },
            Utc.with_ymd_and_hms(2018, 8, 20, hour, 30, 0).unwrap(),
        )
    }

    /// The contract every sink must honor.
    pub(crate) async fn check_sink_contract<S: Sink>(sink: &S) {
        assert!(!sink.exists().await.unwrap());
        assert!(sink.read_recent(10).await.unwrap().is_empty());

        let first = vec![row("urlA", "id1", "t1", 1), row("urlB", "id2", "t2", 1)];
        sink.append(&first).await.unwrap();
        assert!(sink.exists().await.unwrap());
        assert_eq!(sink.read_recent(10).await.unwrap(), first);

        let second = vec![row("urlC", "id3", "t3", 2)];
        sink.append(&second).await.unwrap();
        let all = sink.read_recent(10).await.unwrap();
        assert_eq!(&all[..2], &first[..]);
        assert_eq!(&all[2..], &second[..]);

        assert_eq!(
            sink.read_recent(2).await.unwrap(),
            vec![first[1].clone(), second[0].clone()]
        );
        assert_eq!(sink.read_all().await.unwrap(), all);

        let rebuilt = vec![second[0].clone()];
        sink.replace_all(&rebuilt).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap(), rebuilt);
    }

    #[tokio::test]
    async fn test_handle_opens_configured_jsonl_sink() {
        let path = temp_path("handle.jsonl");
        let handle = SinkHandle::open(&SinkConfig::Jsonl { path: path.clone() }).unwrap();
        assert!(matches!(handle, SinkHandle::Jsonl(_)));
        check_sink_contract(&handle).await;
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_handle_opens_configured_sqlite_sink() {
        let path = temp_path("handle.db");
        let handle = SinkHandle::open(&SinkConfig::Sqlite {
            path: path.clone(),
            table: "reuters_raw_rss".to_string(),
        })
        .unwrap();
        assert!(matches!(handle, SinkHandle::Sqlite(_)));
        check_sink_contract(&handle).await;
        let _ = std::fs::remove_file(path);
    }
}

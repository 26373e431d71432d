//! SQLite sink: accepted entries are rows of a single table.
//!
//! Free-form feed fields are kept as one JSON text column so the table does
//! not need to track whatever fields each feed happens to publish. Row order
//! is the autoincrement `row_id`, i.e. append order.

use super::Sink;
use crate::models::{FeedEntry, StoredEntry};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, Transaction, params};
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Table names are interpolated into SQL, so only plain identifiers are allowed.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

type RawRow = (
    String,
    String,
    String,
    Option<DateTime<Utc>>,
    String,
    DateTime<Utc>,
);

#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    /// Open (or create) the database file. The table is created on first append.
    pub fn open(path: &Path, table: &str) -> Result<Self, Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?, table)
    }

    pub fn with_connection(conn: Connection, table: &str) -> Result<Self, Box<dyn Error>> {
        if !is_valid_table_name(table) {
            return Err(format!("invalid sqlite table name `{table}`").into());
        }
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    row_id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    origin_link     TEXT NOT NULL,
                    id              TEXT NOT NULL,
                    category        TEXT NOT NULL,
                    published_at    TEXT,
                    fields          TEXT NOT NULL,
                    ingested_at     TEXT NOT NULL
                )",
                self.table
            ),
            (),
        )?;
        Ok(())
    }

    fn insert_rows(&self, tx: &Transaction<'_>, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} (
                origin_link,
                id,
                category,
                published_at,
                fields,
                ingested_at
            ) values (
                ?1, ?2, ?3, ?4, ?5, ?6
            )",
            self.table
        ))?;
        for row in rows {
            let entry = &row.entry;
            stmt.execute(params![
                entry.origin_link,
                entry.id,
                entry.category,
                entry.published_at,
                serde_json::to_string(&entry.fields)?,
                row.ingested_at,
            ])?;
        }
        Ok(())
    }

    fn query_rows(&self, sql: &str, limit: Option<i64>) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<RawRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        };
        let raw: Vec<RawRow> = match limit {
            Some(limit) => stmt.query_map([limit], map_row)?.collect::<rusqlite::Result<_>>()?,
            None => stmt.query_map([], map_row)?.collect::<rusqlite::Result<_>>()?,
        };

        let mut rows = Vec::with_capacity(raw.len());
        for (origin_link, id, category, published_at, fields, ingested_at) in raw {
            rows.push(StoredEntry::new(
                FeedEntry {
                    origin_link,
                    id,
                    category,
                    published_at,
                    fields: serde_json::from_str(&fields)?,
                },
                ingested_at,
            ));
        }
        Ok(rows)
    }
}

impl Sink for SqliteSink {
    async fn exists(&self) -> Result<bool, Box<dyn Error>> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(level = "debug", skip(self), fields(table = %self.table))]
    async fn read_recent(&self, n: usize) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT origin_link, id, category, published_at, fields, ingested_at
            FROM (
                SELECT * FROM {} ORDER BY row_id DESC LIMIT ?1
            )
            ORDER BY row_id ASC",
            self.table
        );
        self.query_rows(&sql, Some(i64::try_from(n).unwrap_or(i64::MAX)))
    }

    #[instrument(level = "debug", skip_all, fields(table = %self.table, count = rows.len()))]
    async fn append(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        let tx = self.conn.unchecked_transaction()?;
        self.create_table(&tx)?;
        self.insert_rows(&tx, rows)?;
        tx.commit()?;
        info!(count = rows.len(), "Appended rows");
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT origin_link, id, category, published_at, fields, ingested_at
            FROM {}
            ORDER BY row_id ASC",
            self.table
        );
        self.query_rows(&sql, None)
    }

    /// Drop and recreate the table in one transaction.
    #[instrument(level = "info", skip_all, fields(table = %self.table, count = rows.len()))]
    async fn replace_all(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", self.table), ())?;
        self.create_table(&tx)?;
        self.insert_rows(&tx, rows)?;
        tx.commit()?;
        info!(count = rows.len(), "Rebuilt table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::{check_sink_contract, row};

    fn in_memory(table: &str) -> SqliteSink {
        SqliteSink::with_connection(Connection::open_in_memory().unwrap(), table).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_sink_contract() {
        check_sink_contract(&in_memory("reuters_raw_rss")).await;
    }

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteSink::with_connection(conn, "x; DROP TABLE y").is_err());
    }

    #[tokio::test]
    async fn test_entries_without_publish_time_round_trip() {
        let sink = in_memory("raw");
        let mut stored = row("urlA", "id1", "t1", 3);
        stored.entry.published_at = None;
        stored.entry.fields.insert("dc:creator".to_string(), "Reuters Staff".to_string());
        sink.append(&[stored.clone()]).await.unwrap();
        assert_eq!(sink.read_all().await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_tables_in_one_database_are_independent() {
        let path = crate::sinks::tests::temp_path("two_tables.db");
        let raw = SqliteSink::open(&path, "raw").unwrap();
        raw.append(&[row("urlA", "id1", "t1", 1)]).await.unwrap();

        let other = SqliteSink::open(&path, "other").unwrap();
        assert!(!other.exists().await.unwrap());
        assert!(other.read_recent(5).await.unwrap().is_empty());
        assert_eq!(raw.read_recent(5).await.unwrap().len(), 1);
        let _ = std::fs::remove_file(path);
    }
}

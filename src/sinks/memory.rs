//! In-memory sink for tests.

use super::Sink;
use crate::models::StoredEntry;
use std::error::Error;
use std::sync::Mutex;

/// `None` until the first append, like a table that was never created.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Option<Vec<StoredEntry>>>,
    /// When set, every call fails, as an unreachable database would.
    pub unavailable: bool,
}

impl MemorySink {
    pub fn with_rows(rows: Vec<StoredEntry>) -> Self {
        Self {
            rows: Mutex::new(Some(rows)),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            rows: Mutex::new(None),
            unavailable: true,
        }
    }

    fn check(&self) -> Result<(), Box<dyn Error>> {
        if self.unavailable {
            return Err("sink unreachable".into());
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<StoredEntry> {
        self.rows.lock().unwrap().clone().unwrap_or_default()
    }
}

impl Sink for MemorySink {
    async fn exists(&self) -> Result<bool, Box<dyn Error>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().is_some())
    }

    async fn read_recent(&self, n: usize) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        self.check()?;
        let rows = self.snapshot();
        let start = rows.len().saturating_sub(n);
        Ok(rows[start..].to_vec())
    }

    async fn append(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        self.check()?;
        self.rows
            .lock()
            .unwrap()
            .get_or_insert_with(Vec::new)
            .extend_from_slice(rows);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        self.check()?;
        Ok(self.snapshot())
    }

    async fn replace_all(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        self.check()?;
        *self.rows.lock().unwrap() = Some(rows.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::check_sink_contract;

    #[tokio::test]
    async fn test_memory_sink_contract() {
        check_sink_contract(&MemorySink::default()).await;
    }

    #[tokio::test]
    async fn test_unavailable_sink_errors() {
        let sink = MemorySink::unavailable();
        assert!(sink.exists().await.is_err());
        assert!(sink.append(&[]).await.is_err());
    }
}

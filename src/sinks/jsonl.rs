//! JSON Lines sink: one serialized row per line, appended in ingestion order.
//!
//! The record helpers are generic so the story store can share them.

use super::Sink;
use crate::models::StoredEntry;
use crate::utils::{ensure_parent_dir, truncate_for_log};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::error::Error;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonlSink {
    async fn exists(&self) -> Result<bool, Box<dyn Error>> {
        Ok(fs::try_exists(&self.path).await?)
    }

    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    async fn read_recent(&self, n: usize) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut window = VecDeque::with_capacity(n.min(4096));
        scan_records(&self.path, |row: StoredEntry| {
            if window.len() == n {
                window.pop_front();
            }
            window.push_back(row);
        })
        .await?;
        Ok(window.into())
    }

    async fn append(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        append_records(&self.path, rows).await
    }

    async fn read_all(&self) -> Result<Vec<StoredEntry>, Box<dyn Error>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        read_records(&self.path).await
    }

    async fn replace_all(&self, rows: &[StoredEntry]) -> Result<(), Box<dyn Error>> {
        write_records(&self.path, rows).await
    }
}

/// Read every record of a JSON Lines file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn Error>> {
    let mut records = Vec::new();
    scan_records::<T>(path, |record| records.push(record)).await?;
    Ok(records)
}

/// Stream the file line by line, handing each decoded record to `visit`.
///
/// Lines that are not valid UTF-8 or JSON (a write cut short by a crash) are
/// logged and skipped rather than failing the whole read.
async fn scan_records<T: DeserializeOwned>(
    path: &Path,
    mut visit: impl FnMut(T),
) -> Result<(), Box<dyn Error>> {
    let mut reader = BufReader::new(fs::File::open(path).await?);
    let mut line = Vec::new();
    let mut lineno = 0usize;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        lineno += 1;
        let text = match std::str::from_utf8(&line) {
            Ok(text) => text.trim(),
            Err(e) => {
                warn!(
                    line = lineno,
                    error = %e,
                    preview = %truncate_for_log(&String::from_utf8_lossy(&line), 120),
                    "Skipping unreadable record"
                );
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str(text) {
            Ok(record) => visit(record),
            Err(e) => warn!(
                line = lineno,
                error = %e,
                preview = %truncate_for_log(text, 120),
                "Skipping unreadable record"
            ),
        }
    }
    Ok(())
}

/// Append records, creating the file (and its directory) if needed.
///
/// If the file does not end in a newline (an earlier write was cut short),
/// one is written first so the new records start on their own line.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn append_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), Box<dyn Error>> {
    ensure_parent_dir(path).await?;
    let mut buf = encode_lines(records)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await?;
    if file.metadata().await?.len() > 0 {
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        if last[0] != b'\n' {
            buf.insert(0, '\n');
        }
    }
    file.write_all(buf.as_bytes()).await?;
    file.flush().await?;
    info!(count = records.len(), "Appended records");
    Ok(())
}

/// Replace the file contents. Written to a sibling file and renamed into place
/// so readers never see a half-written store.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), Box<dyn Error>> {
    ensure_parent_dir(path).await?;
    let buf = encode_lines(records)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".rebuild");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, buf).await?;
    fs::rename(&tmp, path).await?;
    info!(count = records.len(), "Rewrote records");
    Ok(())
}

fn encode_lines<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record)?);
        buf.push('\n');
    }
    Ok(buf)
}

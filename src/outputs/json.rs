//! JSON snapshot files.
//!
//! Snapshots are named after what they hold and the day they were taken:
//!
//! ```text
//! out_dir/
//! ├── nasdaq_stock_listing_2018-08-20.json
//! └── nasdaq_stock_listing_2018-08-21.json
//! ```
//!
//! A second run on the same day overwrites that day's file.

use crate::models::CompanyListing;
use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote JSON file");
    Ok(())
}

/// Path of the listings snapshot for `date` under `out_dir`.
pub fn listings_path(out_dir: &Path, date: NaiveDate) -> PathBuf {
    out_dir.join(format!("nasdaq_stock_listing_{date}.json"))
}

/// Write the company listings snapshot for `date` and return its path.
pub async fn write_listings(
    listings: &[CompanyListing],
    out_dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = listings_path(out_dir, date);
    write_json(listings, &path).await?;
    info!(count = listings.len(), path = %path.display(), "Wrote company listings");
    Ok(path)
}

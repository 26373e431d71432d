//! NASDAQ company screener.
//!
//! The screener page renders every listed company as a row of
//! `table#CompanylistResults`. Data rows have exactly seven cells:
//!
//! | # | Cell |
//! |---|------|
//! | 0 | Company name |
//! | 1 | Ticker |
//! | 2 | Market cap (`$1.2B`, `350M`, `n/a`) |
//! | 3 | (link to the company page, ignored) |
//! | 4 | Country |
//! | 5 | IPO year |
//! | 6 | Subsector |
//!
//! Header and detail rows have a different cell count and are skipped.

use crate::fetch::Fetch;
use crate::models::CompanyListing;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};

pub const SCREENER_URL: &str = "https://www.nasdaq.com/screening/companies-by-name.aspx?pagesize=20000";

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().flat_map(str::split_whitespace).join(" ")
}

/// `None` for empty cells and `n/a`.
fn optional(text: &str) -> Option<String> {
    if text.is_empty() || text.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(text.to_string())
    }
}

/// Dollar amount from screener notation: `$1.2B`, `350M`, `12K`, `901.5`.
pub fn parse_market_cap(text: &str) -> Option<f64> {
    let text = text.trim().trim_start_matches('$').replace(',', "");
    let (number, scale) = match text.chars().last()? {
        'K' | 'k' => (&text[..text.len() - 1], 1e3),
        'M' | 'm' => (&text[..text.len() - 1], 1e6),
        'B' | 'b' => (&text[..text.len() - 1], 1e9),
        'T' | 't' => (&text[..text.len() - 1], 1e12),
        _ => (text.as_str(), 1.0),
    };
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

/// Parse every seven-cell row of the screener table.
pub fn parse_listing_table(html: &str) -> Result<Vec<CompanyListing>, Box<dyn Error>> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("table#CompanylistResults tr")?;
    let cell_selector = Selector::parse("td")?;

    let listings = document
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            if cells.len() != 7 || cells[1].is_empty() {
                return None;
            }
            Some(CompanyListing {
                ticker: cells[1].clone(),
                company_name: cells[0].clone(),
                market_cap: parse_market_cap(&cells[2]),
                country: optional(&cells[4]),
                ipo_year: cells[5].parse().ok(),
                subsector: optional(&cells[6]),
            })
        })
        .collect();
    Ok(listings)
}

/// Download the screener and parse its listings.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_listings<F: Fetch>(fetcher: &F, url: &str) -> Result<Vec<CompanyListing>, Box<dyn Error>> {
    let html = fetcher.fetch(url).await?;
    debug!(bytes = html.len(), "Fetched screener page");
    let listings = parse_listing_table(&html)?;
    info!(count = listings.len(), source = url, "Parsed company listings");
    Ok(listings)
}

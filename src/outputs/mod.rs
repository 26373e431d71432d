//! Files written by the one-shot commands.
//!
//! - [`json`]: dated JSON snapshots, e.g. the company listings
//!
//! ```text
//! out_dir/
//! └── nasdaq_stock_listing_2018-08-20.json
//! ```

pub mod json;

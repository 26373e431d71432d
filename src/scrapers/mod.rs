//! HTML scrapers for the pages around the feeds.
//!
//! | Source | Module | Used by |
//! |--------|--------|---------|
//! | Reuters articles and feed index | [`reuters`] | `analyze`, `discover` |
//! | NASDAQ company screener | [`nasdaq`] | `listings` |
//!
//! Scrapers take any [`Fetch`](crate::fetch::Fetch) so they share the retry
//! policy of the poller. Page parsing is split from fetching so it can be
//! tested on fixed HTML.

pub mod nasdaq;
pub mod reuters;

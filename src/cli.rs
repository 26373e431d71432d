//! Command-line interface definitions for ticker_feeds.
//!
//! Everything except the subcommand comes from the YAML config; the config
//! path itself can be given with `--config` or `TICKER_FEEDS_CONFIG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for ticker_feeds.
///
/// # Examples
///
/// ```sh
/// # Poll the configured feeds every interval until Ctrl-C
/// ticker_feeds --config feeds.yaml poll
///
/// # One cycle, then exit
/// ticker_feeds once
///
/// # Analyze the 200 most recent stored entries
/// ticker_feeds analyze --limit 200
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to the config.yaml file
    #[arg(short, long, env = "TICKER_FEEDS_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Poll all feeds on the configured interval until interrupted
    Poll,
    /// Run a single poll cycle and exit
    Once,
    /// Rewrite the store without duplicate entries
    Rebuild,
    /// List the feeds on a feed index page as config YAML
    Discover {
        /// URL of the index page
        url: String,
    },
    /// Save the NASDAQ company listings as dated JSON
    Listings {
        /// Screener page to scrape
        #[arg(long, default_value = crate::scrapers::nasdaq::SCREENER_URL)]
        url: String,
        /// Directory for the JSON file
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Fetch, clean and score the articles behind recent entries
    Analyze {
        /// How many of the most recent entries to consider
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Story store to append to (defaults to `stories_path` from the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["ticker_feeds", "--config", "feeds.yaml", "poll"]);
        assert_eq!(cli.config.as_deref(), Some("feeds.yaml"));
        assert_eq!(cli.command, Command::Poll);
    }

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["ticker_feeds", "once", "-c", "/tmp/feeds.yaml"]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/feeds.yaml"));
        assert_eq!(cli.command, Command::Once);
    }

    #[test]
    fn test_subcommand_defaults() {
        let cli = Cli::parse_from(["ticker_feeds", "listings"]);
        assert_eq!(
            cli.command,
            Command::Listings {
                url: crate::scrapers::nasdaq::SCREENER_URL.to_string(),
                out_dir: PathBuf::from("."),
            }
        );

        let cli = Cli::parse_from(["ticker_feeds", "analyze", "--limit", "5", "--out", "s.jsonl"]);
        assert_eq!(
            cli.command,
            Command::Analyze {
                limit: 5,
                out: Some(PathBuf::from("s.jsonl")),
            }
        );
    }

    #[test]
    fn test_discover_requires_url() {
        assert!(Cli::try_parse_from(["ticker_feeds", "discover"]).is_err());
        let cli = Cli::parse_from(["ticker_feeds", "discover", "http://r/tools/rss"]);
        assert_eq!(
            cli.command,
            Command::Discover {
                url: "http://r/tools/rss".to_string()
            }
        );
    }
}

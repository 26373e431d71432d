//! Reuters article pages and the Reuters feed index.
//!
//! Article markup has changed over the years, so the body is taken from the
//! first selector in [`BODY_SELECTORS`] that matches. The raw text then has
//! its dateline and trailing credits removed by [`clean_body`]. The page's own
//! publication time is found the same way through [`DATE_SELECTORS`].

use crate::feed::parse_date;
use crate::fetch::Fetch;
use crate::models::FeedSource;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Containers tried in order when looking for the article body.
pub const BODY_SELECTORS: &[&str] = &[
    ".StandardArticleBody_body",
    "[data-testid=ArticleBody]",
    "article",
];

/// Elements tried in order for the article's publication time.
pub const DATE_SELECTORS: &[&str] = &[".ArticleHeader_date", "time[datetime]"];

/// Everything from the first of these onwards is credits, not story.
const BOILERPLATE_MARKERS: &[&str] = &[
    "Additional reporting by",
    "Writing by ",
    "Editing by ",
    "Reporting by ",
    "Our Standards:",
];

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

/// Raw body text of an article page, or `None` when no container matches.
///
/// Paragraphs inside the container are preferred; a container without `<p>`
/// children contributes all of its text.
pub fn extract_body(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p").ok()?;

    for css in BODY_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let Some(container) = document.select(&selector).next() else {
            continue;
        };
        let paragraphs: Vec<String> = container.select(&paragraph).map(element_text).collect();
        let text = if paragraphs.is_empty() {
            element_text(container)
        } else {
            paragraphs.join(" ")
        };
        if !text.trim().is_empty() {
            debug!(selector = css, bytes = text.len(), "Matched article body");
            return Some(text);
        }
    }
    None
}

/// Strip the dateline and trailing credits, collapsing whitespace.
///
/// `"NEW YORK (Reuters) - Shares rose. Reporting by Jane Doe"` becomes
/// `"Shares rose."`.
pub fn clean_body(raw: &str) -> String {
    let text = raw.split_whitespace().join(" ");
    let text = match text.find(" - ") {
        Some(i) => &text[i + 3..],
        None => text.as_str(),
    };
    let end = BOILERPLATE_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..end].trim().to_string()
}

/// Publication time shown on an article page.
///
/// A `datetime` attribute is parsed like a feed timestamp. Header text such
/// as `"August 20, 2018 / 2:03 PM / Updated 5 minutes ago"` is read as UTC.
pub fn extract_published(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);
    DATE_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| {
            let element = document.select(&selector).next()?;
            match element.value().attr("datetime") {
                Some(raw) => parse_date(raw),
                None => parse_header_date(&element_text(element)),
            }
        })
}

fn parse_header_date(text: &str) -> Option<DateTime<Utc>> {
    let mut parts = text.split('/').map(|part| part.split_whitespace().join(" "));
    let day = parts.next()?;
    match parts.next() {
        Some(time) => NaiveDateTime::parse_from_str(&format!("{day} {time}"), "%B %d, %Y %I:%M %p")
            .ok()
            .map(|d| d.and_utc()),
        None => NaiveDate::parse_from_str(&day, "%B %d, %Y")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc()),
    }
}

/// A scraped article.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    /// Cleaned body text.
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetch an article and return its cleaned body and publication time.
///
/// `Ok(None)` when the page has no recognizable body or nothing survives
/// cleaning.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_story<F: Fetch>(fetcher: &F, url: &str) -> Result<Option<Story>, Box<dyn Error>> {
    let html = fetcher.fetch(url).await?;
    let Some(raw) = extract_body(&html) else {
        warn!("No article body found");
        return Ok(None);
    };
    let body = clean_body(&raw);
    if body.is_empty() {
        warn!("Article body empty after cleaning");
        return Ok(None);
    }
    let published_at = extract_published(&html);
    if published_at.is_none() {
        debug!("No publication time on article page");
    }
    info!(bytes = body.len(), ?published_at, "Parsed Reuters article");
    Ok(Some(Story { body, published_at }))
}

/// Feed links listed on an index page, in page order.
///
/// The category is the last path segment of the feed URL, e.g.
/// `http://feeds.reuters.com/reuters/businessNews` -> `businessNews`.
pub fn index_feeds(html: &str, base: &Url) -> Vec<FeedSource> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("table.dataTable td.xmlLink a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter_map(|url| {
            let category = url
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()?
                .to_string();
            Some(FeedSource {
                category,
                url: url.to_string(),
            })
        })
        .unique_by(|source| source.url.clone())
        .collect()
}

/// Fetch an index page and list the feeds on it.
#[instrument(level = "info", skip(fetcher))]
pub async fn discover_feeds<F: Fetch>(fetcher: &F, index_url: &str) -> Result<Vec<FeedSource>, Box<dyn Error>> {
    let base = Url::parse(index_url)?;
    let html = fetcher.fetch(index_url).await?;
    let feeds = index_feeds(&html, &base);
    info!(count = feeds.len(), source = index_url, "Indexed Reuters feeds");
    debug!(feeds = ?feeds, "Reuters feeds");
    Ok(feeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tests::StubFetcher;
    use chrono::TimeZone;

    const ARTICLE: &str = r#"<html><body>
        <h1>Xcel to buy wind farms</h1>
        <div class="ArticleHeader_date">August 20, 2018 /  2:03 PM / Updated 5 minutes ago</div>
        <div class="StandardArticleBody_body">
          <p>MINNEAPOLIS (Reuters) - Xcel Energy Inc (XEL.O) said on Monday
             it would buy three wind farms.</p>
          <p>Shares rose 2 percent.</p>
          <p>Reporting by Jane Doe; Editing by John Roe</p>
          <p>Our Standards: The Thomson Reuters Trust Principles.</p>
        </div>
    </body></html>"#;

    #[test]
    fn test_extract_body_prefers_paragraphs() {
        let raw = extract_body(ARTICLE).unwrap();
        assert!(raw.contains("three wind farms"));
        assert!(!raw.contains("Xcel to buy wind farms"));
    }

    #[test]
    fn test_extract_body_falls_back_through_selectors() {
        let html = r#"<html><body><article>LONDON (Reuters) - Plain text body.</article></body></html>"#;
        assert_eq!(
            extract_body(html).map(|b| clean_body(&b)),
            Some("Plain text body.".to_string())
        );
        assert_eq!(extract_body("<html><body><div>nothing</div></body></html>"), None);
    }

    #[test]
    fn test_clean_body_strips_dateline_and_credits() {
        let cleaned = clean_body(&extract_body(ARTICLE).unwrap());
        assert_eq!(
            cleaned,
            "Xcel Energy Inc (XEL.O) said on Monday it would buy three wind farms. Shares rose 2 percent."
        );
    }

    #[test]
    fn test_clean_body_without_dateline() {
        assert_eq!(
            clean_body("Markets were quiet.  Additional reporting by A. Writer"),
            "Markets were quiet."
        );
        assert_eq!(clean_body("   "), "");
    }

    #[test]
    fn test_index_feeds() {
        let html = r#"<html><body>
            <table class="dataTable">
              <tr><td class="feedTitle">Business</td>
                  <td class="xmlLink"><a href="http://feeds.reuters.com/reuters/businessNews">xml</a></td></tr>
              <tr><td class="feedTitle">Tech</td>
                  <td class="xmlLink"><a href="/reuters/technologyNews">xml</a></td></tr>
              <tr><td class="feedTitle">Business again</td>
                  <td class="xmlLink"><a href="http://feeds.reuters.com/reuters/businessNews">xml</a></td></tr>
            </table>
            <td class="xmlLink"><a href="http://elsewhere/not-in-table">xml</a></td>
        </body></html>"#;
        let base = Url::parse("http://feeds.reuters.com/tools/rss").unwrap();
        let feeds = index_feeds(html, &base);
        assert_eq!(
            feeds,
            vec![
                FeedSource {
                    category: "businessNews".to_string(),
                    url: "http://feeds.reuters.com/reuters/businessNews".to_string(),
                },
                FeedSource {
                    category: "technologyNews".to_string(),
                    url: "http://feeds.reuters.com/reuters/technologyNews".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_story() {
        let fetcher = StubFetcher::default()
            .with_page("http://r/story", ARTICLE)
            .with_page("http://r/empty", "<html><body><p>cookie banner</p></body></html>");
        let story = fetch_story(&fetcher, "http://r/story").await.unwrap().unwrap();
        assert!(story.body.starts_with("Xcel Energy Inc (XEL.O)"));
        assert_eq!(
            story.published_at,
            Some(Utc.with_ymd_and_hms(2018, 8, 20, 14, 3, 0).unwrap())
        );
        assert_eq!(fetch_story(&fetcher, "http://r/empty").await.unwrap(), None);
        assert!(fetch_story(&fetcher, "http://r/missing").await.is_err());
    }

    #[test]
    fn test_extract_published() {
        let time_tag = r#"<html><body><time datetime="2023-03-14T09:15:00Z">March 14, 2023</time></body></html>"#;
        assert_eq!(
            extract_published(time_tag),
            Some(Utc.with_ymd_and_hms(2023, 3, 14, 9, 15, 0).unwrap())
        );
        let date_only = r#"<div class="ArticleHeader_date">August 2, 2018</div>"#;
        assert_eq!(
            extract_published(date_only),
            Some(Utc.with_ymd_and_hms(2018, 8, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(extract_published(r#"<div class="ArticleHeader_date">Updated</div>"#), None);
        assert_eq!(extract_published("<p>no date</p>"), None);
    }

    #[tokio::test]
    async fn test_discover_feeds_rejects_bad_url() {
        let fetcher = StubFetcher::default();
        assert!(discover_feeds(&fetcher, "not a url").await.is_err());
        assert_eq!(fetcher.calls.get(), 0);
    }
}

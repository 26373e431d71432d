//! Ticker extraction and sentiment for article bodies.
//!
//! Reuters writes a company's instrument code after its first mention,
//! e.g. `Xcel Energy Inc (XEL.O)`. The ticker is the part before the dot; the
//! capitalized words right before the parenthesis are taken as the company
//! name and used to find the sentences (and title) that talk about it.

use crate::models::{SentimentScores, StoryAnalysis};
use crate::sentiment::{mean, polarity_scores};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static RIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([A-Z]+)\.[A-Z]+\)").unwrap());

const NAME_SUFFIXES: &[&str] = &[
    "Inc", "Inc.", "Corp", "Corp.", "Co", "Co.", "Ltd", "Ltd.", "Plc", "PLC", "SA", "AG", "NV",
    "LLC", "Group", "Holdings",
];

/// A ticker and the company name written in front of its first mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub ticker: String,
    pub company: Option<String>,
}

/// Tickers, in order of first appearance, with the company name preceding
/// their first mention.
pub fn extract_mentions(body: &str) -> Vec<Mention> {
    RIC.captures_iter(body)
        .unique_by(|caps| caps[1].to_string())
        .map(|caps| {
            let start = caps.get(0).map_or(0, |m| m.start());
            Mention {
                ticker: caps[1].to_string(),
                company: company_name_before(&body[..start]),
            }
        })
        .collect()
}

/// Up to five trailing capitalized words (or `&`), e.g. `Xcel Energy Inc`.
fn company_name_before(text: &str) -> Option<String> {
    let mut words: Vec<&str> = text
        .split_whitespace()
        .rev()
        .take_while(|w| *w == "&" || w.starts_with(|c: char| c.is_uppercase()))
        .take(5)
        .collect();
    if words.is_empty() {
        return None;
    }
    words.reverse();
    Some(words.join(" "))
}

/// The company name without corporate suffixes: `Xcel Energy Inc` -> `Xcel Energy`.
fn core_name(company: &str) -> Option<String> {
    let words: Vec<&str> = company
        .split_whitespace()
        .filter(|w| !NAME_SUFFIXES.contains(w))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_i, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    let sentence = text[start..i + c.len_utf8()].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next_i;
                }
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn mentions_company(sentence: &str, mention: &Mention) -> bool {
    if sentence.contains(&format!("({}.", mention.ticker)) {
        return true;
    }
    mention
        .company
        .as_deref()
        .and_then(core_name)
        .is_some_and(|name| sentence.contains(&name))
}

fn named_in_title(title: &str, mention: &Mention) -> bool {
    let ticker_word = title
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == mention.ticker);
    if ticker_word {
        return true;
    }
    let Some(name) = mention.company.as_deref().and_then(core_name) else {
        return false;
    };
    if title.contains(&name) {
        return true;
    }
    // headlines often shorten "Xcel Energy" to "Xcel"
    name.split_whitespace().next().is_some_and(|first| {
        first.len() >= 3
            && title
                .split_whitespace()
                .any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == first)
    })
}

/// Analyze a cleaned article body.
///
/// `main_ticker` is set only when exactly one mentioned company appears in
/// the title.
pub fn analyze_story(
    origin_link: &str,
    category: &str,
    title: Option<&str>,
    body: &str,
    analyzed_at: DateTime<Utc>,
) -> StoryAnalysis {
    let mentions = extract_mentions(body);
    let sentences = split_sentences(body);

    let mut ticker_sentiments = BTreeMap::new();
    for mention in &mentions {
        let scores: Vec<SentimentScores> = sentences
            .iter()
            .filter(|s| mentions_company(s, mention))
            .map(|s| polarity_scores(s))
            .collect();
        if let Some(avg) = mean(&scores) {
            ticker_sentiments.insert(mention.ticker.clone(), avg);
        }
    }

    let main_ticker = title.and_then(|title| {
        let in_title: Vec<&Mention> = mentions.iter().filter(|m| named_in_title(title, m)).collect();
        match in_title.as_slice() {
            [only] => Some(only.ticker.clone()),
            _ => None,
        }
    });

    StoryAnalysis {
        origin_link: origin_link.to_string(),
        category: category.to_string(),
        title: title.map(str::to_string),
        body: body.to_string(),
        tickers: mentions.iter().map(|m| m.ticker.clone()).collect(),
        overall: polarity_scores(body),
        ticker_sentiments,
        main_ticker,
        published_at: None,
        analyzed_at,
    }
}

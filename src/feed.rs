//! RSS 2.0 / RDF / Atom parsing into [`FeedEntry`] records.
//!
//! The parser is a small state machine over `quick_xml` events. Each direct
//! child element of an `<item>` or `<entry>` becomes one field; text nested
//! deeper (Atom `<author><name>`) is folded into the enclosing child.
//!
//! Identity fields are pulled out of the free-form fields:
//! - `origin_link`: `feedburner:origLink`, else `<link>` text (RSS), else the
//!   `rel="alternate"` (or first) `<link href>` (Atom)
//! - `id`: `<guid>` or `<id>`, else the origin link
//!
//! Per-entry `<category>` tags are dropped; the configured category is used
//! instead.

use crate::models::FeedEntry;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{debug, instrument};

/// Parse a feed document and tag each entry with `category`.
///
/// Entries without any usable link are skipped. Returns an error if the XML
/// is malformed or the document root is not a known feed format.
#[instrument(level = "debug", skip(xml), fields(bytes = xml.len()))]
pub fn parse_feed(xml: &str, category: &str) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut entry_depth: Option<usize> = None;
    let mut draft = EntryDraft::default();
    let mut buf = String::new();
    let mut nested_boundary = false;
    let mut entries = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = qname(&e);
                if root.is_none() {
                    root = Some(name.clone());
                }
                match entry_depth {
                    None if is_entry_element(&name) => {
                        entry_depth = Some(stack.len());
                        draft = EntryDraft::default();
                    }
                    Some(depth) if stack.len() == depth + 1 => {
                        buf.clear();
                        nested_boundary = false;
                        if name == "link" {
                            draft.atom_link(&e);
                        }
                    }
                    Some(_) => nested_boundary = true,
                    None => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = qname(&e);
                if root.is_none() {
                    root = Some(name.clone());
                }
                if let Some(depth) = entry_depth {
                    if stack.len() == depth + 1 && name == "link" {
                        draft.atom_link(&e);
                    } else {
                        nested_boundary = true;
                    }
                }
            }
            Event::Text(e) => {
                if entry_depth.is_some() {
                    push_text(&mut buf, &String::from_utf8_lossy(&e), nested_boundary);
                    nested_boundary = false;
                }
            }
            Event::CData(e) => {
                if entry_depth.is_some() {
                    push_text(&mut buf, &String::from_utf8_lossy(&e), nested_boundary);
                    nested_boundary = false;
                }
            }
            Event::GeneralRef(e) => {
                if entry_depth.is_some() {
                    nested_boundary = false;
                    if let Some(ch) = e.resolve_char_ref()? {
                        buf.push(ch);
                    } else {
                        let name = String::from_utf8_lossy(&e);
                        match resolve_predefined_entity(&name) {
                            Some(resolved) => buf.push_str(resolved),
                            None => {
                                buf.push('&');
                                buf.push_str(&name);
                                buf.push(';');
                            }
                        }
                    }
                }
            }
            Event::End(_) => {
                let name = stack.pop().unwrap_or_default();
                if let Some(depth) = entry_depth {
                    if stack.len() == depth + 1 {
                        draft.field(&name, buf.trim());
                        buf.clear();
                    } else if stack.len() > depth + 1 {
                        nested_boundary = true;
                    } else if stack.len() == depth {
                        entry_depth = None;
                        match std::mem::take(&mut draft).finish(category) {
                            Some(entry) => entries.push(entry),
                            None => debug!(category, "Skipping feed entry without a link"),
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match root.as_deref() {
        Some("rss") | Some("rdf:RDF") | Some("feed") => {}
        Some(other) => return Err(format!("not a feed document (root element <{other}>)").into()),
        None => return Err("empty feed document".into()),
    }

    debug!(count = entries.len(), category, "Parsed feed entries");
    Ok(entries)
}

/// Parse a feed timestamp.
///
/// Tries RFC 2822 (RSS), RFC 3339 (Atom), then a few formats seen in the
/// wild. Naive timestamps are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(date.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[derive(Debug, Default)]
struct EntryDraft {
    orig_link: Option<String>,
    link: Option<String>,
    id: Option<String>,
    /// Candidate timestamps keyed by [`date_rank`]; the first one per rank wins.
    dates: BTreeMap<u8, String>,
    fields: BTreeMap<String, String>,
}

impl EntryDraft {
    fn field(&mut self, name: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        match local_name(name) {
            "origLink" => set_once(&mut self.orig_link, text),
            "link" => set_once(&mut self.link, text),
            "guid" | "id" => set_once(&mut self.id, text),
            "category" => {}
            local => {
                if let Some(rank) = date_rank(local) {
                    self.dates.entry(rank).or_insert_with(|| text.to_string());
                }
                self.fields
                    .entry(name.to_string())
                    .or_insert_with(|| text.to_string());
            }
        }
    }

    /// Atom `<link rel=".." href=".."/>`. Only alternate (or untyped) links count.
    fn atom_link(&mut self, e: &BytesStart<'_>) {
        let mut href = None;
        let mut rel = None;
        for attr in e.attributes().flatten() {
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            match attr.key.as_ref() {
                b"href" => href = Some(value),
                b"rel" => rel = Some(value),
                _ => {}
            }
        }
        if let Some(href) = href {
            if rel.as_deref().is_none_or(|r| r == "alternate") {
                set_once(&mut self.link, &href);
            }
        }
    }

    fn finish(self, category: &str) -> Option<FeedEntry> {
        let origin_link = self.orig_link.or(self.link)?;
        let id = self.id.unwrap_or_else(|| origin_link.clone());
        let published_at = self.dates.values().find_map(|raw| parse_date(raw));
        Some(FeedEntry {
            origin_link,
            id,
            category: category.to_string(),
            published_at,
            fields: self.fields,
        })
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Publication time first, then Dublin Core `date`; last-edited only as a fallback.
fn date_rank(local: &str) -> Option<u8> {
    match local {
        "pubDate" | "published" | "issued" => Some(0),
        "date" => Some(1),
        "updated" | "modified" => Some(2),
        _ => None,
    }
}

fn is_entry_element(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

/// Text from two different nested elements (Atom author name + email) is
/// separated by a space; text split around an entity reference is not.
fn push_text(buf: &mut String, text: &str, after_element: bool) {
    if after_element
        && !buf.is_empty()
        && !buf.ends_with(char::is_whitespace)
        && !text.starts_with(char::is_whitespace)
    {
        buf.push(' ');
    }
    buf.push_str(text);
}

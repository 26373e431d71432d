//! Deciding which freshly polled entries are new.
//!
//! A candidate is new iff no row in the recent window shares its
//! `(origin_link, id)` key: a left anti-join of the candidates against the
//! window. Only the window is consulted, so an entry that reappears after
//! aging out of the window is accepted again.

use crate::models::{FeedEntry, StoredEntry};
use itertools::Itertools;
use std::collections::HashSet;

/// Candidates whose key is absent from `window`, in candidate order.
///
/// Candidates sharing a key with each other are all kept; only the stored
/// window is authoritative.
pub fn new_entries(candidates: Vec<FeedEntry>, window: &[StoredEntry]) -> Vec<FeedEntry> {
    let seen: HashSet<(&str, &str)> = window.iter().map(StoredEntry::key).collect();
    candidates
        .into_iter()
        .filter(|candidate| !seen.contains(&candidate.key()))
        .collect()
}

/// Drop every row whose key already appeared earlier. First occurrence wins.
pub fn drop_duplicates(rows: Vec<StoredEntry>) -> Vec<StoredEntry> {
    rows.into_iter()
        .unique_by(|row| (row.entry.origin_link.clone(), row.entry.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::row;

    fn candidate(link: &str, id: &str, title: &str) -> FeedEntry {
        row(link, id, title, 5).entry
    }

    #[test]
    fn test_known_key_is_filtered() {
        let window = vec![row("urlA", "id1", "t1", 1)];
        let candidates = vec![candidate("urlA", "id1", "t1"), candidate("urlB", "id2", "t2")];
        let new = new_entries(candidates, &window);
        assert_eq!(new, vec![candidate("urlB", "id2", "t2")]);
    }

    #[test]
    fn test_empty_window_accepts_everything() {
        let candidates = vec![candidate("urlA", "id1", "t1"), candidate("urlB", "id2", "t2")];
        assert_eq!(new_entries(candidates.clone(), &[]), candidates);
    }

    #[test]
    fn test_duplicate_candidates_with_different_titles_are_both_new() {
        let candidates = vec![candidate("urlA", "id1", "first"), candidate("urlA", "id1", "edited")];
        assert_eq!(new_entries(candidates.clone(), &[]), candidates);
    }

    #[test]
    fn test_key_needs_both_fields_to_match() {
        let window = vec![row("urlA", "id1", "t1", 1)];
        let candidates = vec![
            candidate("urlA", "id2", "same link"),
            candidate("urlB", "id1", "same id"),
        ];
        assert_eq!(new_entries(candidates.clone(), &window), candidates);
    }

    #[test]
    fn test_edited_title_is_not_new() {
        let window = vec![row("urlA", "id1", "original headline", 1)];
        let candidates = vec![candidate("urlA", "id1", "edited headline")];
        assert!(new_entries(candidates, &window).is_empty());
    }

    #[test]
    fn test_result_is_exactly_the_absent_keys_and_idempotent() {
        let window: Vec<StoredEntry> = (0..20)
            .filter(|i| i % 3 == 0)
            .map(|i| row(&format!("url{i}"), &format!("id{i}"), "w", 1))
            .collect();
        let candidates: Vec<FeedEntry> = (0..20)
            .map(|i| candidate(&format!("url{i}"), &format!("id{i}"), "c"))
            .collect();

        let once = new_entries(candidates.clone(), &window);
        let twice = new_entries(candidates.clone(), &window);
        assert_eq!(once, twice);

        let window_keys: HashSet<_> = window.iter().map(StoredEntry::key).collect();
        let expected: Vec<FeedEntry> = candidates
            .iter()
            .filter(|c| !window_keys.contains(&c.key()))
            .cloned()
            .collect();
        assert_eq!(once, expected);
        assert!(once.iter().all(|c| !window_keys.contains(&c.key())));
    }

    #[test]
    fn test_drop_duplicates_keeps_first_occurrence() {
        let rows = vec![
            row("urlA", "id1", "t1", 1),
            row("urlB", "id2", "t2", 1),
            row("urlA", "id1", "t1 edited", 2),
            row("urlC", "id3", "t3", 2),
            row("urlB", "id2", "t2", 3),
        ];
        let deduped = drop_duplicates(rows.clone());
        assert_eq!(deduped, vec![rows[0].clone(), rows[1].clone(), rows[3].clone()]);
    }
}

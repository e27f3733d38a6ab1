//! Event ↔ citation linking and display normalization.
//!
//! Every raw event gathers candidate citation ids from three places and
//! merges them (no source wins over another):
//!
//! 1. `event.citation_ids`
//! 2. `fact.citation_id` / `fact.citation_ids` for each fact
//! 3. every citation cut from a page listed in `event.source_page_numbers`
//!
//! Ids are deduplicated, resolved through the [`CitationIndex`] (unknown ids
//! are dropped), and sorted by source document then local page.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::citations::CitationIndex;
use crate::models::{Citation, Event, RawEvent};

/// Summary used when no fact carries text.
pub const NO_SUMMARY: &str = "No summary available.";
/// Event type used when the producer sent none.
pub const DEFAULT_EVENT_TYPE: &str = "Encounter";
/// Date label used when no date information exists.
pub const UNDATED: &str = "Undated";
/// Summaries longer than this many characters are truncated.
pub const SUMMARY_MAX_CHARS: usize = 280;

/// Link all raw events and return them in display order.
///
/// Display order is ascending by the string `"{date_label}|{id}"`. That is a
/// lexicographic sort: `"Undated"` lands among real dates by spelling, not at
/// one end of the list.
pub fn link_events(raw: &[RawEvent], citations: &CitationIndex) -> Vec<Event> {
    let mut events: Vec<Event> = raw
        .iter()
        .enumerate()
        .map(|(i, ev)| link_event(i, ev, citations))
        .collect();
    events.sort_by_cached_key(|e| format!("{}|{}", e.date_label, e.id));
    events
}

/// Link a single raw event. `position` names events that lack an id.
pub fn link_event(position: usize, raw: &RawEvent, citations: &CitationIndex) -> Event {
    let ids = referenced_citation_ids(raw, citations);

    let mut resolved: Vec<Citation> = ids
        .iter()
        .filter_map(|id| citations.get(id).cloned())
        .collect();
    sort_citations(&mut resolved);

    Event {
        id: raw
            .event_id
            .clone()
            .unwrap_or_else(|| format!("event-{}", position)),
        date_label: date_label(raw),
        event_type: display_event_type(raw.event_type.as_deref()),
        summary: summarize(raw),
        confidence: raw.confidence,
        citations: resolved,
    }
}

/// Union of citation ids referenced by an event, deduplicated.
pub fn referenced_citation_ids(raw: &RawEvent, citations: &CitationIndex) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = raw.citation_ids.iter().cloned().collect();

    for fact in &raw.facts {
        ids.extend(fact.citation_id.iter().cloned());
        ids.extend(fact.citation_ids.iter().cloned());
    }

    for page in &raw.source_page_numbers {
        ids.extend(citations.ids_on_page(*page).iter().cloned());
    }

    ids.retain(|id| !id.is_empty());
    ids
}

/// Group by document, then ascending local page, then id.
pub fn sort_citations(citations: &mut [Citation]) {
    citations.sort_by(|a, b| {
        a.source_document_id
            .cmp(&b.source_document_id)
            .then(a.page_number.cmp(&b.page_number))
            .then(a.citation_id.cmp(&b.citation_id))
    });
}

/// First non-empty fact text, truncated with an ellipsis.
pub fn summarize(raw: &RawEvent) -> String {
    let text = raw
        .facts
        .iter()
        .filter_map(|f| f.text.as_deref())
        .map(str::trim)
        .find(|t| !t.is_empty());

    match text {
        Some(t) if t.chars().count() > SUMMARY_MAX_CHARS => {
            let head: String = t.chars().take(SUMMARY_MAX_CHARS).collect();
            format!("{}…", head)
        }
        Some(t) => t.to_string(),
        None => NO_SUMMARY.to_string(),
    }
}

/// `"er_visit"` → `"Er Visit"`; missing → `"Encounter"`.
pub fn display_event_type(raw: Option<&str>) -> String {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return DEFAULT_EVENT_TYPE.to_string();
    };

    raw.replace('_', " ")
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Normalized date, then original free text, then `"Undated"`.
pub fn date_label(raw: &RawEvent) -> String {
    let Some(date) = raw.date.as_ref() else {
        return UNDATED.to_string();
    };

    if let Some(normalized) = date.normalized.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return normalize_date(normalized);
    }

    date.original_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNDATED.to_string())
}

/// Render ISO dates and datetimes as `YYYY-MM-DD`; anything else as given.
fn normalize_date(s: &str) -> String {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.date().format("%Y-%m-%d").to_string();
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawCitation, RawDate, RawFact, RawPage};
    use crate::pages::PageIndex;

    fn index(cits: &[(&str, &str, i64)], pages: &[(&str, i64)]) -> CitationIndex {
        let raw_pages: Vec<RawPage> = pages
            .iter()
            .map(|(d, n)| RawPage {
                source_document_id: Some(d.to_string()),
                page_number: Some(*n),
            })
            .collect();
        let raw_cits: Vec<RawCitation> = cits
            .iter()
            .map(|(id, d, n)| RawCitation {
                citation_id: Some(id.to_string()),
                source_document_id: Some(d.to_string()),
                page_number: Some(*n),
                snippet: None,
            })
            .collect();
        CitationIndex::build(&raw_cits, &PageIndex::build(&raw_pages))
    }

    fn fact(text: &str) -> RawFact {
        RawFact {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_unions_all_three_sources() {
        let idx = index(
            &[("c1", "d1", 1), ("c2", "d1", 2), ("c3", "d2", 3), ("c4", "d2", 4)],
            &[("d1", 1), ("d1", 2), ("d2", 3), ("d2", 4)],
        );
        let ev = RawEvent {
            event_id: Some("e1".into()),
            citation_ids: vec!["c1".into()],
            facts: vec![RawFact {
                text: Some("x".into()),
                citation_id: Some("c2".into()),
                citation_ids: vec!["c1".into()],
            }],
            source_page_numbers: vec![3],
            ..Default::default()
        };
        let linked = link_event(0, &ev, &idx);
        let ids: Vec<&str> = linked.citations.iter().map(|c| c.citation_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_unresolved_ids_dropped() {
        let idx = index(&[("c1", "d1", 1)], &[("d1", 1)]);
        let ev = RawEvent {
            facts: vec![RawFact {
                citation_ids: vec!["c9".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(link_event(0, &ev, &idx).citations.is_empty());
    }

    #[test]
    fn test_page_without_citations_contributes_nothing() {
        let idx = index(&[("c1", "d1", 1)], &[("d1", 1), ("d1", 2)]);
        let ev = RawEvent {
            source_page_numbers: vec![2],
            ..Default::default()
        };
        assert!(link_event(0, &ev, &idx).citations.is_empty());
    }

    #[test]
    fn test_citations_sorted_numerically_within_document() {
        let pages: Vec<(&str, i64)> = (1..=12).map(|n| ("d1", n)).collect();
        let idx = index(&[("late", "d1", 10), ("early", "d1", 2), ("other", "a0", 11)], &pages);
        let ev = RawEvent {
            citation_ids: vec!["late".into(), "early".into(), "other".into()],
            ..Default::default()
        };
        let linked = link_event(0, &ev, &idx);
        let keys: Vec<(&str, Option<i64>)> = linked
            .citations
            .iter()
            .map(|c| (c.source_document_id.as_str(), c.page_number))
            .collect();
        assert_eq!(keys, vec![("a0", Some(11)), ("d1", Some(2)), ("d1", Some(10))]);
    }

    #[test]
    fn test_summary_first_non_empty_trimmed() {
        let ev = RawEvent {
            facts: vec![fact("   "), fact("  Ortho eval. "), fact("later")],
            ..Default::default()
        };
        assert_eq!(summarize(&ev), "Ortho eval.");
        assert_eq!(summarize(&RawEvent::default()), NO_SUMMARY);
    }

    #[test]
    fn test_summary_truncated_with_ellipsis() {
        let long = "é".repeat(300);
        let ev = RawEvent {
            facts: vec![fact(&long)],
            ..Default::default()
        };
        let s = summarize(&ev);
        assert_eq!(s.chars().count(), SUMMARY_MAX_CHARS + 1);
        assert!(s.ends_with('…'));

        let exact = "a".repeat(SUMMARY_MAX_CHARS);
        let ev = RawEvent {
            facts: vec![fact(&exact)],
            ..Default::default()
        };
        assert_eq!(summarize(&ev), exact);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(display_event_type(Some("er_visit")), "Er Visit");
        assert_eq!(display_event_type(Some("PHYSICAL_therapy")), "Physical Therapy");
        assert_eq!(display_event_type(Some("  ")), "Encounter");
        assert_eq!(display_event_type(None), "Encounter");
    }

    #[test]
    fn test_date_label_fallbacks() {
        let mut ev = RawEvent::default();
        assert_eq!(date_label(&ev), "Undated");

        ev.date = Some(RawDate {
            normalized: Some("2023-01-15T08:30:00Z".into()),
            original_text: Some("Jan 15".into()),
        });
        assert_eq!(date_label(&ev), "2023-01-15");

        ev.date = Some(RawDate {
            normalized: Some(" ".into()),
            original_text: Some("early spring 2022".into()),
        });
        assert_eq!(date_label(&ev), "early spring 2022");

        ev.date = Some(RawDate {
            normalized: Some("01/15/2023".into()),
            original_text: None,
        });
        assert_eq!(date_label(&ev), "01/15/2023");
    }

    /// Ordering is lexicographic on "label|id", so "Undated" sorts between
    /// "2023-..." and a label starting with a lowercase letter, not last.
    #[test]
    fn test_event_order_is_lexicographic_not_chronological() {
        let idx = CitationIndex::default();
        let mk = |id: &str, date: Option<&str>| RawEvent {
            event_id: Some(id.into()),
            date: date.map(|d| RawDate {
                normalized: None,
                original_text: Some(d.into()),
            }),
            ..Default::default()
        };
        let events = link_events(
            &[
                mk("e1", Some("circa 2019")),
                mk("e2", None),
                mk("e3", Some("2023-01-15")),
                mk("e4", Some("2021-06-01")),
            ],
            &idx,
        );
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e4", "e3", "e2", "e1"]);
    }

    #[test]
    fn test_missing_event_id_uses_position() {
        let events = link_events(&[RawEvent::default(), RawEvent::default()], &CitationIndex::default());
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["event-0", "event-1"]);
    }
}

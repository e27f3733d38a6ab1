//! Per-document page numbering.
//!
//! The producer numbers pages globally across the concatenated packet. The
//! viewer needs "page X of Y" within each source document, so the flat list
//! is replayed in global order with a counter per document.

use std::collections::BTreeMap;

use crate::models::RawPage;

/// Mapping from global page numbers to local (per-document) page numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageIndex {
    global_to_local: BTreeMap<i64, i64>,
    pages_per_document: BTreeMap<String, i64>,
}

impl PageIndex {
    /// Build the index from the graph's `pages` list.
    ///
    /// Pages are stably sorted by global number first; entries without a
    /// document id or page number are skipped.
    pub fn build(pages: &[RawPage]) -> Self {
        let mut ordered: Vec<(&str, i64)> = pages
            .iter()
            .filter_map(|p| Some((p.source_document_id.as_deref()?, p.page_number?)))
            .collect();
        ordered.sort_by_key(|(_, global)| *global);

        let mut index = PageIndex::default();
        for (doc_id, global) in ordered {
            let counter = index
                .pages_per_document
                .entry(doc_id.to_string())
                .or_insert(0);
            *counter += 1;
            index.global_to_local.insert(global, *counter);
        }
        index
    }

    /// Local page for a global page number.
    ///
    /// Falls back to the global number when the page is not in the index.
    pub fn local_page(&self, global: i64) -> i64 {
        self.global_to_local.get(&global).copied().unwrap_or(global)
    }

    /// Number of pages seen for a document.
    pub fn page_count(&self, document_id: &str) -> Option<i64> {
        self.pages_per_document.get(document_id).copied()
    }

    pub fn pages_per_document(&self) -> &BTreeMap<String, i64> {
        &self.pages_per_document
    }

    pub fn is_empty(&self) -> bool {
        self.global_to_local.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(doc: &str, n: i64) -> RawPage {
        RawPage {
            source_document_id: Some(doc.to_string()),
            page_number: Some(n),
        }
    }

    #[test]
    fn test_interleaved_documents() {
        let pages = vec![page("a", 1), page("b", 2), page("a", 3), page("b", 4), page("a", 5)];
        let idx = PageIndex::build(&pages);
        assert_eq!(idx.local_page(1), 1);
        assert_eq!(idx.local_page(2), 1);
        assert_eq!(idx.local_page(3), 2);
        assert_eq!(idx.local_page(4), 2);
        assert_eq!(idx.local_page(5), 3);
        assert_eq!(idx.page_count("a"), Some(3));
        assert_eq!(idx.page_count("b"), Some(2));
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let pages = vec![page("d1", 30), page("d1", 10), page("d1", 20)];
        let idx = PageIndex::build(&pages);
        assert_eq!(idx.local_page(10), 1);
        assert_eq!(idx.local_page(20), 2);
        assert_eq!(idx.local_page(30), 3);
    }

    #[test]
    fn test_local_is_one_plus_earlier_same_document_pages() {
        let docs = ["x", "y", "z"];
        let pages: Vec<RawPage> = (1..=40)
            .map(|n| page(docs[(n as usize * 7 + n as usize / 3) % 3], n))
            .collect();
        let idx = PageIndex::build(&pages);
        for (i, p) in pages.iter().enumerate() {
            let doc = p.source_document_id.as_deref().unwrap();
            let earlier = pages[..i]
                .iter()
                .filter(|q| q.source_document_id.as_deref() == Some(doc))
                .count() as i64;
            assert_eq!(idx.local_page(p.page_number.unwrap()), 1 + earlier);
        }
    }

    #[test]
    fn test_missing_page_falls_back_to_global() {
        let idx = PageIndex::build(&[page("d1", 12)]);
        assert_eq!(idx.local_page(12), 1);
        assert_eq!(idx.local_page(99), 99);
    }

    #[test]
    fn test_incomplete_entries_skipped() {
        let pages = vec![
            RawPage {
                source_document_id: None,
                page_number: Some(1),
            },
            page("d1", 2),
        ];
        let idx = PageIndex::build(&pages);
        assert_eq!(idx.local_page(2), 1);
        assert_eq!(idx.local_page(1), 1); // fallback, not indexed
        assert_eq!(idx.pages_per_document().len(), 1);
    }
}

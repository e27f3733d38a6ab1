//! Citation indexes.
//!
//! Builds the two lookups the event linker needs: citations by id, and
//! citation ids by the *original* global page they were cut from. Page
//! numbers on the stored citations are rewritten to local numbering.

use std::collections::BTreeMap;

use crate::models::{Citation, RawCitation};
use crate::pages::PageIndex;

#[derive(Debug, Clone, Default)]
pub struct CitationIndex {
    by_id: BTreeMap<String, Citation>,
    ids_by_global_page: BTreeMap<i64, Vec<String>>,
}

impl CitationIndex {
    /// Index the raw citations. Citations without an id are dropped; a
    /// repeated id replaces the earlier citation.
    pub fn build(raw: &[RawCitation], pages: &PageIndex) -> Self {
        let mut index = CitationIndex::default();

        for rc in raw {
            let Some(id) = rc.citation_id.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };

            if let Some(global) = rc.page_number {
                index
                    .ids_by_global_page
                    .entry(global)
                    .or_default()
                    .push(id.to_string());
            }

            index.by_id.insert(
                id.to_string(),
                Citation {
                    citation_id: id.to_string(),
                    source_document_id: rc.source_document_id.clone().unwrap_or_default(),
                    page_number: rc.page_number.map(|g| pages.local_page(g)),
                    snippet: rc.snippet.clone(),
                },
            );
        }

        index
    }

    pub fn get(&self, citation_id: &str) -> Option<&Citation> {
        self.by_id.get(citation_id)
    }

    /// Citation ids originally located on a global page (empty if none).
    pub fn ids_on_page(&self, global_page: i64) -> &[String] {
        self.ids_by_global_page
            .get(&global_page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

//! The reconciliation pipeline.
//!
//! ```text
//! artifact ─▶ locate_graph ─▶ PageIndex ─▶ CitationIndex ─▶ link_events ─▶ analyze
//!                 │                                                         │
//!                 └──────────▶ ExtensionSignals ─────────────────────────────┘
//! ```
//!
//! Everything here is pure and rebuilt from scratch per artifact; the same
//! input always serializes to the same bytes.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::analytics::{analyze, CaseAnalytics};
use crate::citations::CitationIndex;
use crate::linker::link_events;
use crate::models::{parse_list, Event, RawCitation, RawEvent, RawPage};
use crate::normalize::locate_graph;
use crate::pages::PageIndex;
use crate::signals::ExtensionSignals;

/// Weight of each event in the moat score, relative to one signal row.
pub const EVENT_SCORE_WEIGHT: f64 = 0.001;

/// A fully reconciled review model for one run's evidence graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub run_id: Option<String>,
    pub events: Vec<Event>,
    pub signals: ExtensionSignals,
    pub signal_count: usize,
    pub score: f64,
    pub pages_per_document: BTreeMap<String, i64>,
    pub analytics: CaseAnalytics,
}

impl ReconciliationResult {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Canonical JSON encoding of the result.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Hex SHA-256 of [`to_canonical_json`](Self::to_canonical_json).
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = self.to_canonical_json()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// `signal_count + event_count × 0.001`.
pub fn moat_score(signal_count: usize, event_count: usize) -> f64 {
    signal_count as f64 + event_count as f64 * EVENT_SCORE_WEIGHT
}

/// Reconcile an artifact body of unknown shape.
///
/// Returns `None` when the body holds no usable graph.
pub fn reconcile_artifact(doc: &Value, run_id: Option<&str>) -> Option<ReconciliationResult> {
    locate_graph(doc).map(|graph| reconcile_graph(graph, run_id))
}

/// Reconcile an already-located evidence graph.
pub fn reconcile_graph(graph: &Value, run_id: Option<&str>) -> ReconciliationResult {
    let pages: Vec<RawPage> = parse_list(graph.get("pages"));
    let raw_citations: Vec<RawCitation> = parse_list(graph.get("citations"));
    let raw_events: Vec<RawEvent> = parse_list(graph.get("events"));

    let page_index = PageIndex::build(&pages);
    let citation_index = CitationIndex::build(&raw_citations, &page_index);
    let events = link_events(&raw_events, &citation_index);
    let signals = ExtensionSignals::from_graph(graph);

    let signal_count = signals.signal_count();
    let analytics = analyze(&events, &signals);

    ReconciliationResult {
        run_id: run_id.map(str::to_string),
        score: moat_score(signal_count, events.len()),
        signal_count,
        pages_per_document: page_index.pages_per_document().clone(),
        events,
        signals,
        analytics,
    }
}

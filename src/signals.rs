//! Extension signal collections.
//!
//! The producer attaches case-strategy analytics under `extensions`. Their
//! row schemas change between producer versions, so rows stay loosely typed
//! ([`SignalRow`]) and only two things are relied on: which collection a
//! row belongs to ([`SignalKind`]) and which citations it references
//! ([`row_citation_ids`]).

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::id_value;

/// A single loosely-typed signal row.
pub type SignalRow = Map<String, Value>;

/// The named row collections an evidence graph may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ClaimRows,
    CausationChains,
    CaseCollapseCandidates,
    DefenseAttackPaths,
    ObjectionProfiles,
    EvidenceUpgradeRecommendations,
    QuoteLockRows,
    ContradictionMatrix,
}

impl SignalKind {
    pub const ALL: [SignalKind; 8] = [
        SignalKind::ClaimRows,
        SignalKind::CausationChains,
        SignalKind::CaseCollapseCandidates,
        SignalKind::DefenseAttackPaths,
        SignalKind::ObjectionProfiles,
        SignalKind::EvidenceUpgradeRecommendations,
        SignalKind::QuoteLockRows,
        SignalKind::ContradictionMatrix,
    ];

    /// Keys under `extensions` that hold this collection, canonical first.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            SignalKind::ClaimRows => &["claim_rows", "claims"],
            SignalKind::CausationChains => &["causation_chains"],
            SignalKind::CaseCollapseCandidates => &["case_collapse_candidates"],
            SignalKind::DefenseAttackPaths => &["defense_attack_paths"],
            SignalKind::ObjectionProfiles => &["objection_profiles"],
            SignalKind::EvidenceUpgradeRecommendations => &["evidence_upgrade_recommendations"],
            SignalKind::QuoteLockRows => &["quote_lock_rows"],
            SignalKind::ContradictionMatrix => &["contradiction_matrix"],
        }
    }

    pub fn key(self) -> &'static str {
        self.keys()[0]
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalKind::ClaimRows => "Claims",
            SignalKind::CausationChains => "Causation chains",
            SignalKind::CaseCollapseCandidates => "Case-collapse candidates",
            SignalKind::DefenseAttackPaths => "Defense attack paths",
            SignalKind::ObjectionProfiles => "Objection profiles",
            SignalKind::EvidenceUpgradeRecommendations => "Evidence upgrades",
            SignalKind::QuoteLockRows => "Quote locks",
            SignalKind::ContradictionMatrix => "Contradictions",
        }
    }
}

/// Counts reported by the producer's snippet quality gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityGate {
    pub filtered_snippets: Option<i64>,
    pub cleaned_snippets: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl QualityGate {
    fn from_object(map: &SignalRow) -> Self {
        let mut gate = QualityGate::default();
        for (k, v) in map {
            match k.as_str() {
                "filtered_snippets" => gate.filtered_snippets = v.as_i64(),
                "cleaned_snippets" => gate.cleaned_snippets = v.as_i64(),
                _ => {
                    gate.extra.insert(k.clone(), v.clone());
                }
            }
        }
        gate
    }
}

/// All extension signals of one evidence graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtensionSignals {
    pub collections: BTreeMap<SignalKind, Vec<SignalRow>>,
    pub narrative_duality: Option<SignalRow>,
    pub citation_fidelity: Option<SignalRow>,
    pub quality_gate: Option<QualityGate>,
}

impl ExtensionSignals {
    /// Read `graph.extensions`, coercing anything malformed to empty/absent.
    pub fn from_graph(graph: &Value) -> Self {
        match graph.get("extensions") {
            Some(Value::Object(ext)) => Self::from_extensions(ext),
            _ => Self::empty(),
        }
    }

    /// Every collection present and empty, no singletons.
    pub fn empty() -> Self {
        ExtensionSignals {
            collections: SignalKind::ALL.iter().map(|k| (*k, Vec::new())).collect(),
            ..Default::default()
        }
    }

    fn from_extensions(ext: &SignalRow) -> Self {
        let collections = SignalKind::ALL
            .iter()
            .map(|kind| {
                let rows = kind
                    .keys()
                    .iter()
                    .find_map(|k| ext.get(*k))
                    .map(object_rows)
                    .unwrap_or_default();
                (*kind, rows)
            })
            .collect();

        ExtensionSignals {
            collections,
            narrative_duality: ext.get("narrative_duality").and_then(object_singleton),
            citation_fidelity: ext.get("citation_fidelity").and_then(object_singleton),
            quality_gate: ext
                .get("quality_gate")
                .and_then(Value::as_object)
                .map(QualityGate::from_object),
        }
    }

    pub fn rows(&self, kind: SignalKind) -> &[SignalRow] {
        self.collections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total rows across all collections plus one per present singleton.
    pub fn signal_count(&self) -> usize {
        let rows: usize = self.collections.values().map(Vec::len).sum();
        rows + usize::from(self.narrative_duality.is_some())
            + usize::from(self.citation_fidelity.is_some())
    }
}

fn object_rows(v: &Value) -> Vec<SignalRow> {
    match v {
        Value::Array(items) => items.iter().filter_map(|i| i.as_object().cloned()).collect(),
        _ => Vec::new(),
    }
}

fn object_singleton(v: &Value) -> Option<SignalRow> {
    v.as_object().cloned()
}

/// Row fields holding a single citation id.
const SINGLE_ID_FIELDS: &[&str] = &["citation_id", "source_citation_id"];

/// Row fields holding a list of citation ids.
const ID_LIST_FIELDS: &[&str] = &[
    "citation_ids",
    "source_citation_ids",
    "supporting_citation_ids",
    "evidence_citation_ids",
    "contradicting_citation_ids",
];

/// Collect every citation id a signal row references, whatever field-name
/// variant the producer used.
///
/// `citations` may hold bare ids or objects with `citation_id` / `id`.
pub fn row_citation_ids(row: &SignalRow) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();

    for field in SINGLE_ID_FIELDS {
        if let Some(id) = row.get(*field).and_then(id_value) {
            ids.insert(id);
        }
    }

    for field in ID_LIST_FIELDS {
        if let Some(Value::Array(items)) = row.get(*field) {
            ids.extend(items.iter().filter_map(id_value));
        }
    }

    if let Some(Value::Array(items)) = row.get("citations") {
        for item in items {
            let id = match item {
                Value::Object(obj) => obj
                    .get("citation_id")
                    .or_else(|| obj.get("id"))
                    .and_then(id_value),
                other => id_value(other),
            };
            ids.extend(id);
        }
    }

    ids
}

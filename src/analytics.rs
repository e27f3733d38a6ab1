//! Derived review analytics.
//!
//! Coverage and contradiction counts are exact. Severity, tags, and the case
//! risk score are heuristic triage aids computed from keyword lists; they
//! are not a clinical or legal classification and must not be presented as
//! one.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::Event;
use crate::signals::{row_citation_ids, ExtensionSignals, SignalKind};

/// Heuristic severity bucket for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Heuristic case-level risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

const HIGH_SEVERITY_TERMS: &[&str] = &[
    "surgery",
    "surgical",
    "procedure",
    "hospital",
    "admission",
    "admitted",
    "fracture",
    "emergency",
    "intensive care",
    "operative",
    "death",
];

const MEDIUM_SEVERITY_TERMS: &[&str] = &[
    "imaging",
    "mri",
    "x-ray",
    "radiology",
    "injection",
    "therapy",
    "orthopedic",
    "neurolog",
    "specialist",
    "consult",
    "prescri",
];

/// Tag name and the terms that trigger it, in display order.
const TAG_RULES: &[(&str, &[&str])] = &[
    ("Emergency", &["emergency", "ed visit", "er visit", "ambulance", "trauma"]),
    ("Imaging", &["imaging", "mri", "x-ray", "ct scan", "radiology", "ultrasound"]),
    ("Surgery", &["surgery", "surgical", "operative", "procedure"]),
    ("Therapy", &["therapy", "chiropract", "rehab", "physical therapy"]),
    ("Medication", &["prescri", "medication", "opioid", "dose"]),
    ("Billing", &["bill", "invoice", "charge", "payment"]),
];

/// Per-event triage annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInsight {
    pub event_id: String,
    pub contradiction_count: usize,
    pub severity: Severity,
    pub tags: Vec<&'static str>,
}

/// Case-level coverage and risk figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseAnalytics {
    pub total_events: usize,
    pub anchored_events: usize,
    pub coverage_percent: u32,
    pub contradiction_rows: usize,
    pub high_severity_events: usize,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub signal_totals: BTreeMap<SignalKind, usize>,
    pub events: Vec<EventInsight>,
}

/// Compute all analytics for a reconciled event list.
pub fn analyze(events: &[Event], signals: &ExtensionSignals) -> CaseAnalytics {
    let total_events = events.len();
    let anchored_events = events.iter().filter(|e| !e.citations.is_empty()).count();
    let coverage = coverage_percent(anchored_events, total_events);

    let contradiction_sets: Vec<BTreeSet<String>> = signals
        .rows(SignalKind::ContradictionMatrix)
        .iter()
        .map(row_citation_ids)
        .collect();

    let insights: Vec<EventInsight> = events
        .iter()
        .map(|e| {
            let text = classification_text(e);
            EventInsight {
                event_id: e.id.clone(),
                contradiction_count: contradiction_count(e, &contradiction_sets),
                severity: severity(&text),
                tags: tags(&text),
            }
        })
        .collect();

    let high_severity_events = insights
        .iter()
        .filter(|i| i.severity == Severity::High)
        .count();
    let contradiction_rows = contradiction_sets.len();
    let risk_score = risk_score(coverage, contradiction_rows, high_severity_events, total_events);

    CaseAnalytics {
        total_events,
        anchored_events,
        coverage_percent: coverage,
        contradiction_rows,
        high_severity_events,
        risk_score,
        risk_level: risk_level(risk_score),
        signal_totals: signals
            .collections
            .iter()
            .map(|(kind, rows)| (*kind, rows.len()))
            .collect(),
        events: insights,
    }
}

/// `round(anchored / total * 100)`, 0 when there are no events.
pub fn coverage_percent(anchored: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((anchored as f64 / total as f64) * 100.0).round() as u32
}

/// Number of contradiction rows sharing at least one citation with the event.
pub fn contradiction_count(event: &Event, contradiction_sets: &[BTreeSet<String>]) -> usize {
    let own: BTreeSet<&str> = event
        .citations
        .iter()
        .map(|c| c.citation_id.as_str())
        .collect();
    if own.is_empty() {
        return 0;
    }
    contradiction_sets
        .iter()
        .filter(|row| row.iter().any(|id| own.contains(id.as_str())))
        .count()
}

fn classification_text(event: &Event) -> String {
    format!("{} {}", event.event_type, event.summary).to_lowercase()
}

/// Keyword severity over lowercased `"{event_type} {summary}"`.
pub fn severity(text: &str) -> Severity {
    let text = text.to_lowercase();
    if HIGH_SEVERITY_TERMS.iter().any(|t| text.contains(t)) {
        Severity::High
    } else if MEDIUM_SEVERITY_TERMS.iter().any(|t| text.contains(t)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Keyword tags over lowercased `"{event_type} {summary}"`.
pub fn tags(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();
    TAG_RULES
        .iter()
        .filter(|(_, terms)| terms.iter().any(|t| text.contains(t)))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Weighted blend of missing coverage, contradictions, and high-severity
/// share, clamped to 0..=100.
pub fn risk_score(coverage: u32, contradiction_rows: usize, high: usize, total: usize) -> u32 {
    let uncovered = 100.0 - coverage.min(100) as f64;
    let contradictions = contradiction_rows.min(10) as f64;
    let high_share = if total == 0 {
        0.0
    } else {
        high as f64 / total as f64
    };
    let score = 0.4 * uncovered + 4.0 * contradictions + 20.0 * high_share;
    score.clamp(0.0, 100.0).round() as u32
}

pub fn risk_level(score: u32) -> RiskLevel {
    match score {
        0..=33 => RiskLevel::Low,
        34..=66 => RiskLevel::Moderate,
        _ => RiskLevel::High,
    }
}

/// First event (in display order) that owns the citation.
pub fn focus_citation<'a>(events: &'a [Event], citation_id: &str) -> Option<&'a Event> {
    events.iter().find(|e| e.has_citation(citation_id))
}

//! Core data models used throughout the reconciliation engine.
//!
//! `Raw*` types mirror the loosely shaped artifact produced by the
//! extraction backend and are deserialized leniently: a field of the wrong
//! type becomes absent instead of failing the whole record. [`Citation`] and
//! [`Event`] are the resolved, display-ready forms.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============ Runs ============

/// Lifecycle status of an extraction run.
///
/// Unknown statuses are preserved verbatim in [`RunStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Partial,
    Completed,
    Failed,
    Cancelled,
    Other(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Other(s) => s,
        }
    }

    /// Pending or running.
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "success" => RunStatus::Success,
            "partial" => RunStatus::Partial,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "cancelled" | "canceled" => RunStatus::Cancelled,
            _ => RunStatus::Other(s),
        }
    }
}

impl From<RunStatus> for String {
    fn from(s: RunStatus) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics bag reported by the backend for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    #[serde(default)]
    pub pages_total: Option<u64>,
    #[serde(default)]
    pub events_total: Option<u64>,
    #[serde(default)]
    pub providers_detected: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One extraction attempt for a case, as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub heartbeat_at: Option<String>,
    #[serde(default)]
    pub metrics: Option<RunMetrics>,
    #[serde(default)]
    pub error_message: Option<String>,
}

// ============ Raw graph records ============

/// A page of the concatenated packet, numbered globally.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPage {
    #[serde(default, deserialize_with = "opt_string")]
    pub source_document_id: Option<String>,
    #[serde(default, deserialize_with = "opt_page")]
    pub page_number: Option<i64>,
}

/// A citation as emitted by the producer, with a global page number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCitation {
    #[serde(default, deserialize_with = "opt_string")]
    pub citation_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub source_document_id: Option<String>,
    #[serde(default, deserialize_with = "opt_page")]
    pub page_number: Option<i64>,
    #[serde(default, deserialize_with = "opt_string")]
    pub snippet: Option<String>,
}

/// A fact attached to a raw event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFact {
    #[serde(default, deserialize_with = "opt_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub citation_id: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub citation_ids: Vec<String>,
}

/// Date information for a raw event.
///
/// The producer sends either a bare string (taken as the normalized value)
/// or an object with a normalized value and the original free text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDate {
    pub normalized: Option<String>,
    pub original_text: Option<String>,
}

impl<'de> Deserialize<'de> for RawDate {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(match &v {
            Value::String(s) => RawDate {
                normalized: Some(s.clone()),
                original_text: None,
            },
            Value::Object(map) => {
                let pick = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .map(str::to_string)
                };
                RawDate {
                    normalized: pick(&["value", "normalized", "iso"]),
                    original_text: pick(&["original_text", "original", "raw"]),
                }
            }
            _ => RawDate::default(),
        })
    }
}

/// An event as emitted by the producer, before citation linking.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default, deserialize_with = "opt_string")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub date: Option<RawDate>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "object_list")]
    pub facts: Vec<RawFact>,
    #[serde(default, deserialize_with = "page_list")]
    pub source_page_numbers: Vec<i64>,
    #[serde(default, deserialize_with = "string_list")]
    pub citation_ids: Vec<String>,
}

/// Deserialize every element of a JSON array as `T`, skipping elements
/// that do not fit. Anything other than an array yields an empty list.
pub fn parse_list<T: serde::de::DeserializeOwned>(v: Option<&Value>) -> Vec<T> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

// ============ Resolved records ============

/// A citation with its page number rewritten to the local page of its
/// source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub citation_id: String,
    pub source_document_id: String,
    pub page_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A display-ready event with resolved, deduplicated, sorted citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub date_label: String,
    pub event_type: String,
    pub summary: String,
    pub confidence: Option<f64>,
    pub citations: Vec<Citation>,
}

impl Event {
    pub fn has_citation(&self, citation_id: &str) -> bool {
        self.citations.iter().any(|c| c.citation_id == citation_id)
    }
}

// ============ Lenient field readers ============

/// Parse a page number from an integer, an integral float, or a numeric string.
pub fn page_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read an identifier from a string or number; empty strings are absent.
pub fn id_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(id_value(&v))
}

fn opt_page<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(page_value(&v))
}

fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Array(items) => items.iter().filter_map(id_value).collect(),
        _ => Vec::new(),
    })
}

fn page_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<i64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Array(items) => items.iter().filter_map(page_value).collect(),
        _ => Vec::new(),
    })
}

fn object_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = Value::deserialize(d)?;
    Ok(parse_list(Some(&v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_status_roundtrips_unknown() {
        let run: Run = serde_json::from_value(json!({"id": "r1", "status": "queued"})).unwrap();
        assert_eq!(run.status, RunStatus::Other("queued".to_string()));
        assert_eq!(serde_json::to_value(&run.status).unwrap(), json!("queued"));

        let run: Run = serde_json::from_value(json!({"id": "r2", "status": "SUCCESS"})).unwrap();
        assert_eq!(run.status, RunStatus::Success);
    }

    #[test]
    fn test_run_metrics_keep_extra_keys() {
        let run: Run = serde_json::from_value(json!({
            "id": "r1",
            "status": "success",
            "metrics": {"pages_total": 40, "events_total": 12, "billing_lines": 3}
        }))
        .unwrap();
        let metrics = run.metrics.unwrap();
        assert_eq!(metrics.pages_total, Some(40));
        assert_eq!(metrics.extra.get("billing_lines"), Some(&json!(3)));
    }

    #[test]
    fn test_raw_event_tolerates_wrong_types() {
        let ev: RawEvent = serde_json::from_value(json!({
            "event_id": 7,
            "event_type": null,
            "confidence": "88",
            "facts": [{"text": "ok"}, "not a fact", {"text": 3}],
            "source_page_numbers": [1, "2", 3.0, "x", 4.5],
            "citation_ids": "c1"
        }))
        .unwrap();
        assert_eq!(ev.event_id.as_deref(), Some("7"));
        assert_eq!(ev.event_type, None);
        assert_eq!(ev.confidence, Some(88.0));
        assert_eq!(ev.facts.len(), 2);
        assert_eq!(ev.source_page_numbers, vec![1, 2, 3]);
        assert!(ev.citation_ids.is_empty());
    }

    #[test]
    fn test_raw_date_shapes() {
        let d: RawDate = serde_json::from_value(json!("2023-01-15")).unwrap();
        assert_eq!(d.normalized.as_deref(), Some("2023-01-15"));

        let d: RawDate =
            serde_json::from_value(json!({"normalized": null, "original": "mid Jan 2023"})).unwrap();
        assert_eq!(d.normalized, None);
        assert_eq!(d.original_text.as_deref(), Some("mid Jan 2023"));

        let d: RawDate = serde_json::from_value(json!(20230115)).unwrap();
        assert_eq!(d, RawDate::default());
    }

    #[test]
    fn test_parse_list_skips_non_objects() {
        let pages: Vec<RawPage> = parse_list(Some(&json!([
            {"source_document_id": "d1", "page_number": 1},
            42,
            {"source_document_id": "d2"}
        ])));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_number, None);
        assert!(parse_list::<RawPage>(Some(&json!({"not": "array"}))).is_empty());
        assert!(parse_list::<RawPage>(None).is_empty());
    }
}

//! Evidence-graph payload unwrapping.
//!
//! Depending on producer version, an artifact body is the graph itself or
//! wraps it one or two levels deep. [`GRAPH_LOCATORS`] lists the accepted
//! nesting levels in the order they are tried; the first one holding a
//! non-empty `events` array wins.

use serde_json::Value;

/// A named way of finding the graph inside an artifact body.
pub struct GraphLocator {
    pub name: &'static str,
    pub locate: fn(&Value) -> Option<&Value>,
}

/// Accepted nesting levels, in priority order.
pub const GRAPH_LOCATORS: &[GraphLocator] = &[
    GraphLocator {
        name: "document",
        locate: at_document,
    },
    GraphLocator {
        name: "evidence_graph",
        locate: at_evidence_graph,
    },
    GraphLocator {
        name: "outputs.evidence_graph",
        locate: at_outputs_evidence_graph,
    },
];

fn at_document(doc: &Value) -> Option<&Value> {
    Some(doc)
}

fn at_evidence_graph(doc: &Value) -> Option<&Value> {
    doc.get("evidence_graph")
}

fn at_outputs_evidence_graph(doc: &Value) -> Option<&Value> {
    doc.get("outputs")?.get("evidence_graph")
}

/// True if the value is an object with a non-empty `events` array.
pub fn has_events(v: &Value) -> bool {
    v.get("events")
        .and_then(Value::as_array)
        .is_some_and(|events| !events.is_empty())
}

/// Find the evidence graph inside an artifact body.
///
/// Returns `None` when no accepted nesting level holds events; callers
/// treat that as "this artifact has no usable graph".
pub fn locate_graph(doc: &Value) -> Option<&Value> {
    locate_graph_with_name(doc).map(|(_, graph)| graph)
}

/// Like [`locate_graph`] but also reports which locator matched.
pub fn locate_graph_with_name(doc: &Value) -> Option<(&'static str, &Value)> {
    GRAPH_LOCATORS.iter().find_map(|loc| {
        (loc.locate)(doc)
            .filter(|candidate| has_events(candidate))
            .map(|graph| (loc.name, graph))
    })
}

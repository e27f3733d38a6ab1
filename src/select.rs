//! Candidate run selection.
//!
//! Walks eligible runs in the caller's order, one at a time, and reconciles
//! the first usable graph each run offers (named artifact first, then the
//! generic typed artifact). The best moat score seen so far is kept.
//!
//! # Early exit
//!
//! Scanning stops at the first run whose graph has **any** extension signal
//! (`signal_count > 0`), even if a later run might score higher. Fetches are
//! strictly sequential so that later runs are never downloaded once the
//! scan has stopped.

use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactRef, ArtifactSource};
use crate::config::BackendConfig;
use crate::error::ReconcileError;
use crate::normalize::locate_graph_with_name;
use crate::progress::{ScanEvent, ScanProgressReporter};
use crate::reconcile::{reconcile_graph, ReconciliationResult};

/// Which artifacts to try for each run, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOptions {
    pub attempts: Vec<ArtifactRef>,
}

impl SelectionOptions {
    pub fn new(graph_artifact: &str, fallback_type: &str) -> Self {
        Self {
            attempts: vec![
                ArtifactRef::Named(graph_artifact.to_string()),
                ArtifactRef::Typed(fallback_type.to_string()),
            ],
        }
    }

    pub fn from_config(backend: &BackendConfig) -> Self {
        Self::new(&backend.graph_artifact, &backend.fallback_artifact_type)
    }
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_GRAPH_ARTIFACT,
            crate::config::DEFAULT_FALLBACK_ARTIFACT_TYPE,
        )
    }
}

/// Outcome of a successful scan.
#[derive(Debug, Clone)]
pub struct Selection {
    pub result: ReconciliationResult,
    /// Runs for which at least one fetch was issued.
    pub runs_attempted: usize,
    /// Whether scanning stopped before the end of the run list.
    pub stopped_early: bool,
}

/// Pick the best reconciled graph among `run_ids`.
///
/// # Errors
///
/// [`ReconcileError::NoExtractedGraph`] when no run yields a usable graph.
/// Individual fetch failures are never returned.
pub async fn select_candidate(
    source: &dyn ArtifactSource,
    run_ids: &[String],
    options: &SelectionOptions,
    progress: &dyn ScanProgressReporter,
) -> Result<Selection, ReconcileError> {
    let total = run_ids.len();
    let mut best: Option<ReconciliationResult> = None;
    let mut runs_attempted = 0;

    for (i, run_id) in run_ids.iter().enumerate() {
        runs_attempted += 1;

        let Some(result) = fetch_run_graph(source, run_id, i + 1, total, options, progress).await
        else {
            progress.report(ScanEvent::Skipped {
                run_id: run_id.clone(),
                reason: "no usable graph".to_string(),
            });
            continue;
        };

        progress.report(ScanEvent::Found {
            run_id: run_id.clone(),
            signal_count: result.signal_count,
            event_count: result.event_count(),
            score: result.score,
        });

        let has_signals = result.signal_count > 0;
        let leader = match best.take() {
            Some(current) if current.score >= result.score => current,
            _ => result,
        };

        if has_signals {
            let remaining = total - (i + 1);
            info!(run_id = %run_id, remaining, "run has extension signals, stopping candidate scan");
            progress.report(ScanEvent::EarlyExit {
                run_id: run_id.clone(),
                remaining,
            });
            return Ok(Selection {
                result: leader,
                runs_attempted,
                stopped_early: remaining > 0,
            });
        }
        best = Some(leader);
    }

    match best {
        Some(result) => Ok(Selection {
            result,
            runs_attempted,
            stopped_early: false,
        }),
        None => {
            warn!(runs_attempted, "no eligible run yielded an evidence graph");
            Err(ReconcileError::NoExtractedGraph { runs_attempted })
        }
    }
}

/// Try each artifact for one run; the first body holding a graph wins.
async fn fetch_run_graph(
    source: &dyn ArtifactSource,
    run_id: &str,
    n: usize,
    total: usize,
    options: &SelectionOptions,
    progress: &dyn ScanProgressReporter,
) -> Option<ReconciliationResult> {
    for artifact in &options.attempts {
        progress.report(ScanEvent::Attempt {
            run_id: run_id.to_string(),
            artifact: artifact.to_string(),
            n,
            total,
        });

        let body = match source.fetch(run_id, artifact).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                debug!(run_id, %artifact, "artifact not found");
                continue;
            }
            Err(e) => {
                warn!(run_id, %artifact, error = %e, "artifact fetch failed");
                continue;
            }
        };

        match locate_graph_with_name(&body) {
            Some((level, graph)) => {
                debug!(run_id, %artifact, level, "evidence graph located");
                return Some(reconcile_graph(graph, Some(run_id)));
            }
            None => debug!(run_id, %artifact, "artifact holds no events"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifacts;
    use crate::progress::NoProgress;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn graph_with_signals(n: usize, events: usize) -> Value {
        let rows: Vec<Value> = (0..n).map(|i| json!({"row": i})).collect();
        let evs: Vec<Value> = (0..events).map(|i| json!({"event_id": format!("e{}", i)})).collect();
        json!({"events": evs, "extensions": {"claim_rows": rows}})
    }

    fn named() -> ArtifactRef {
        ArtifactRef::Named("evidence_graph.json".into())
    }

    fn typed() -> ArtifactRef {
        ArtifactRef::Typed("json".into())
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_zero_signal_run_does_not_stop_scan() {
        let src = InMemoryArtifacts::new()
            .with("A", named(), graph_with_signals(0, 5))
            .with("B", named(), graph_with_signals(3, 1));
        let sel = select_candidate(&src, &ids(&["A", "B"]), &SelectionOptions::default(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(sel.result.run_id.as_deref(), Some("B"));
        assert_eq!(sel.result.signal_count, 3);
        assert!(src.fetch_count("B") > 0);
        assert_eq!(sel.runs_attempted, 2);
    }

    #[tokio::test]
    async fn test_first_run_with_signal_stops_scan() {
        let src = InMemoryArtifacts::new()
            .with("A", named(), graph_with_signals(1, 1))
            .with("B", named(), graph_with_signals(10, 50));
        let sel = select_candidate(&src, &ids(&["A", "B"]), &SelectionOptions::default(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(sel.result.run_id.as_deref(), Some("A"));
        assert_eq!(src.fetch_count("B"), 0);
        assert_eq!(src.total_fetches(), 1);
        assert!(sel.stopped_early);
    }

    #[tokio::test]
    async fn test_earlier_higher_score_survives_early_exit() {
        // A scores 5.0 on events alone; B stops the scan with 1.001.
        let src = InMemoryArtifacts::new()
            .with("A", named(), graph_with_signals(0, 5000))
            .with("B", named(), graph_with_signals(1, 1))
            .with("C", named(), graph_with_signals(5, 5));
        let sel = select_candidate(
            &src,
            &ids(&["A", "B", "C"]),
            &SelectionOptions::default(),
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(sel.result.run_id.as_deref(), Some("A"));
        assert_eq!(sel.result.signal_count, 0);
        assert!(sel.stopped_early);
        assert_eq!(sel.runs_attempted, 2);
        assert!(src.fetch_count("B") > 0);
        assert_eq!(src.fetch_count("C"), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_typed_artifact() {
        let src = InMemoryArtifacts::new()
            .with("A", named(), json!({"status": "no graph here"}))
            .with("A", typed(), json!({"outputs": {"evidence_graph": graph_with_signals(2, 1)}}));
        let sel = select_candidate(&src, &ids(&["A"]), &SelectionOptions::default(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(sel.result.signal_count, 2);
        assert_eq!(src.fetch_count("A"), 2);
    }

    #[tokio::test]
    async fn test_best_score_kept_without_signals() {
        let src = InMemoryArtifacts::new()
            .with("A", named(), graph_with_signals(0, 2))
            .with("B", named(), graph_with_signals(0, 7))
            .with("C", named(), graph_with_signals(0, 3));
        let sel = select_candidate(
            &src,
            &ids(&["A", "B", "C"]),
            &SelectionOptions::default(),
            &NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(sel.result.run_id.as_deref(), Some("B"));
        assert!(!sel.stopped_early);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_no_graph() {
        let src = InMemoryArtifacts::new().with("A", named(), json!({"events": []}));
        let err = select_candidate(&src, &ids(&["A", "B"]), &SelectionOptions::default(), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NoExtractedGraph { runs_attempted: 2 }));
        // Each run tried both endpoints.
        assert_eq!(src.total_fetches(), 4);
    }

    #[tokio::test]
    async fn test_empty_run_list() {
        let src = InMemoryArtifacts::new();
        let err = select_candidate(&src, &[], &SelectionOptions::default(), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NoExtractedGraph { runs_attempted: 0 }));
    }

    struct Recorder(Mutex<Vec<ScanEvent>>);

    impl ScanProgressReporter for Recorder {
        fn report(&self, event: ScanEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_progress_events() {
        let src = InMemoryArtifacts::new().with("B", named(), graph_with_signals(1, 1));
        let rec = Recorder(Mutex::new(Vec::new()));
        select_candidate(&src, &ids(&["A", "B", "C"]), &SelectionOptions::default(), &rec)
            .await
            .unwrap();
        let events = rec.0.into_inner().unwrap();
        assert!(matches!(&events[2], ScanEvent::Skipped { run_id, .. } if run_id == "A"));
        assert!(matches!(
            events.last().unwrap(),
            ScanEvent::EarlyExit { run_id, remaining: 1 } if run_id == "B"
        ));
    }
}

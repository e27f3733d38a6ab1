//! Candidate-scan progress reporting.
//!
//! Reports which run the selector is trying, which artifact endpoint it is
//! on, and where it stopped, so a slow backend is visible while a review
//! loads. Progress is emitted on **stderr** so stdout stays parseable.

use std::io::Write;

/// A single progress event from the candidate selector.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanEvent {
    /// Fetching an artifact for run `n` of `total`.
    Attempt {
        run_id: String,
        artifact: String,
        n: usize,
        total: usize,
    },
    /// The run produced no usable graph from any artifact.
    Skipped { run_id: String, reason: String },
    /// A usable graph was reconciled.
    Found {
        run_id: String,
        signal_count: usize,
        event_count: usize,
        score: f64,
    },
    /// Scanning stopped before the end of the list.
    EarlyExit { run_id: String, remaining: usize },
}

/// Receives scan progress. Implementations write to stderr (human or JSON).
pub trait ScanProgressReporter: Send + Sync {
    fn report(&self, event: ScanEvent);
}

/// Human-friendly progress: `scan run 2 / 5  r-81f2  by-name/evidence_graph.json`.
pub struct StderrProgress;

impl ScanProgressReporter for StderrProgress {
    fn report(&self, event: ScanEvent) {
        let line = match &event {
            ScanEvent::Attempt {
                run_id,
                artifact,
                n,
                total,
            } => format!("scan run {} / {}  {}  {}\n", n, total, run_id, artifact),
            ScanEvent::Skipped { run_id, reason } => {
                format!("scan {}  skipped ({})\n", run_id, reason)
            }
            ScanEvent::Found {
                run_id,
                signal_count,
                event_count,
                score,
            } => format!(
                "scan {}  graph: {} events, {} signals (score {:.3})\n",
                run_id, event_count, signal_count, score
            ),
            ScanEvent::EarlyExit { run_id, remaining } => format!(
                "scan {}  has signals, stopping ({} run{} not fetched)\n",
                run_id,
                remaining,
                if *remaining == 1 { "" } else { "s" }
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ScanProgressReporter for JsonProgress {
    fn report(&self, event: ScanEvent) {
        let obj = match &event {
            ScanEvent::Attempt {
                run_id,
                artifact,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "attempt",
                "run_id": run_id,
                "artifact": artifact,
                "n": n,
                "total": total
            }),
            ScanEvent::Skipped { run_id, reason } => serde_json::json!({
                "event": "progress",
                "phase": "skipped",
                "run_id": run_id,
                "reason": reason
            }),
            ScanEvent::Found {
                run_id,
                signal_count,
                event_count,
                score,
            } => serde_json::json!({
                "event": "progress",
                "phase": "found",
                "run_id": run_id,
                "signal_count": signal_count,
                "event_count": event_count,
                "score": score
            }),
            ScanEvent::EarlyExit { run_id, remaining } => serde_json::json!({
                "event": "progress",
                "phase": "early_exit",
                "run_id": run_id,
                "remaining": remaining
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ScanProgressReporter for NoProgress {
    fn report(&self, _event: ScanEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ScanProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}': expected off, human, or json",
                other
            )),
        }
    }
}

//! Error taxonomy for the reconciliation engine and backend client.
//!
//! Only exhaustion ([`ReconcileError::NoExtractedGraph`]) is ever surfaced to
//! a review caller. Per-run [`FetchError`]s are recovered inside the
//! candidate scan and only show up in logs.

/// Failure to retrieve a single resource from the extraction backend.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network-level failure (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested artifact does not exist in the source.
    #[error("artifact not found: {0}")]
    Missing(String),
}

impl FetchError {
    /// True for statuses that mean "nothing there" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status: 404, .. } | FetchError::Missing(_))
    }
}

/// Failure of a full review reconciliation for a case.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// No eligible run yielded a usable evidence graph.
    #[error("no extracted graph found ({runs_attempted} run(s) attempted)")]
    NoExtractedGraph { runs_attempted: usize },

    /// The run list itself could not be loaded.
    #[error("failed to list runs: {0}")]
    Runs(#[source] FetchError),
}

impl ReconcileError {
    /// Machine-readable code used by the review API.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::NoExtractedGraph { .. } => "no_extracted_graph",
            ReconcileError::Runs(_) => "backend_unavailable",
        }
    }

    /// Recommended remediation shown next to the empty state.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ReconcileError::NoExtractedGraph { .. } => Some("re-run extraction"),
            ReconcileError::Runs(_) => None,
        }
    }
}

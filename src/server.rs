//! Review HTTP API.
//!
//! Serves reconciled review models for cases, backed by the extraction
//! backend configured in `[backend]`. One [`ReviewSession`] is kept per case
//! so that overlapping reloads resolve to the newest result; at most
//! `[server].max_sessions` cases are held at once.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/cases/{case_id}/runs` | Runs with eligibility and staleness |
//! | `GET`  | `/cases/{case_id}/review` | Reload and return the review model |
//! | `POST` | `/cases/{case_id}/focus` | Focus the event citing `citation_id` |
//! | `POST` | `/cases/{case_id}/reprocess` | Start a new extraction run |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_extracted_graph",
//!              "message": "no extracted graph found (2 run(s) attempted)",
//!              "remediation": "re-run extraction" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `no_extracted_graph` (404), `superseded` (409), `backend_error` (backend
//! status), `backend_unavailable` (502).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::{FetchError, ReconcileError};
use crate::models::Event;
use crate::progress::NoProgress;
use crate::reconcile::ReconciliationResult;
use crate::review::load_review;
use crate::runs::{summarize_runs, RunSummary};
use crate::session::{ReviewSession, SessionState, SessionTable, Ticket};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    client: Arc<BackendClient>,
    sessions: Arc<Mutex<SessionTable>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = BackendClient::from_config(&config)?;
        let sessions = SessionTable::new(config.server.max_sessions);
        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
            sessions: Arc::new(Mutex::new(sessions)),
        })
    }

    fn session(&self, case_id: &str) -> Result<Arc<ReviewSession>, AppError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| internal("session table poisoned"))?;
        Ok(sessions.get_or_create(case_id))
    }

    fn existing_session(&self, case_id: &str) -> Result<Option<Arc<ReviewSession>>, AppError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| internal("session table poisoned"))?;
        Ok(sessions.get(case_id))
    }
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/cases/{case_id}/runs", get(handle_runs))
        .route("/cases/{case_id}/review", get(handle_review))
        .route("/cases/{case_id}/focus", post(handle_focus))
        .route("/cases/{case_id}/reprocess", post(handle_reprocess))
        .layer(cors)
        .with_state(state)
}

/// Starts the review server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone())?;
    let app = router(state);

    println!("Review server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, backend = %config.backend.base_url, "review server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remediation: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    remediation: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                remediation: self.remediation,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
        remediation: None,
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    error(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

fn superseded() -> AppError {
    AppError {
        remediation: Some("retry to fetch the latest review".to_string()),
        ..error(
            StatusCode::CONFLICT,
            "superseded",
            "a newer reload of this case was started",
        )
    }
}

impl From<&FetchError> for AppError {
    fn from(e: &FetchError) -> Self {
        match e {
            FetchError::Status { status, message } => AppError {
                status: StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                code: "backend_error".to_string(),
                message: message.clone(),
                remediation: None,
            },
            other => error(StatusCode::BAD_GATEWAY, "backend_unavailable", other.to_string()),
        }
    }
}

impl From<&ReconcileError> for AppError {
    fn from(e: &ReconcileError) -> Self {
        let status = match e {
            ReconcileError::NoExtractedGraph { .. } => StatusCode::NOT_FOUND,
            ReconcileError::Runs(_) => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: e.code().to_string(),
            message: e.to_string(),
            remediation: e.remediation().map(str::to_string),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /cases/{case_id}/runs ============

#[derive(Serialize)]
struct RunsResponse {
    runs: Vec<RunSummary>,
    active_run_stale: bool,
}

async fn handle_runs(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<RunsResponse>, AppError> {
    let runs = state
        .client
        .list_runs(&case_id)
        .await
        .map_err(|e| AppError::from(&e))?;
    let runs = summarize_runs(&runs, &state.config.selection, chrono::Utc::now());
    // Only the first active run is surfaced as in progress.
    let active_run_stale = runs
        .iter()
        .find(|r| r.status.is_active())
        .is_some_and(|r| r.stale);
    Ok(Json(RunsResponse {
        runs,
        active_run_stale,
    }))
}

// ============ GET /cases/{case_id}/review ============

/// Reloads the case and returns the session snapshot.
///
/// When an overlapping reload was started after this one, this request's
/// result is discarded and it fails with `409 superseded`, whether or not
/// the newer reload has finished. Clients re-issue the request to read the
/// winning result.
async fn handle_review(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<Arc<SessionState>>, AppError> {
    let session = state.session(&case_id)?;
    let ticket = session.begin();

    let loaded = load_review(&state.client, &state.config, &case_id, &NoProgress)
        .await
        .map(|selection| selection.result);
    finish_review(&session, ticket, loaded).map(Json)
}

fn finish_review(
    session: &ReviewSession,
    ticket: Ticket,
    loaded: Result<ReconciliationResult, ReconcileError>,
) -> Result<Arc<SessionState>, AppError> {
    let failure = loaded.as_ref().err().map(AppError::from);
    if !session.commit(ticket, loaded.into()) {
        tracing::debug!(ticket = ticket.generation(), "review superseded by a newer reload");
        return Err(superseded());
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(session.snapshot()),
    }
}

// ============ POST /cases/{case_id}/focus ============

#[derive(Deserialize)]
struct FocusRequest {
    citation_id: String,
}

#[derive(Serialize)]
struct FocusResponse {
    event: Event,
}

async fn handle_focus(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
    Json(req): Json<FocusRequest>,
) -> Result<Json<FocusResponse>, AppError> {
    let citation_id = req.citation_id.trim();
    if citation_id.is_empty() {
        return Err(bad_request("citation_id must not be empty"));
    }

    let session = state
        .existing_session(&case_id)?
        .ok_or_else(|| not_found(format!("no review loaded for case: {}", case_id)))?;

    let event = session
        .focus_citation(citation_id)
        .ok_or_else(|| not_found(format!("no event cites {}", citation_id)))?;
    Ok(Json(FocusResponse { event }))
}

// ============ POST /cases/{case_id}/reprocess ============

async fn handle_reprocess(
    State(state): State<AppState>,
    Path(case_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let body = state
        .client
        .start_run(&case_id)
        .await
        .map_err(|e| AppError::from(&e))?;
    tracing::info!(case_id = %case_id, "reprocess requested");
    Ok(Json(serde_json::json!({ "run": body })))
}

//! Per-case review state with a stale-response guard.
//!
//! A reload calls [`ReviewSession::begin`] to obtain a [`Ticket`], performs
//! the (slow) candidate scan, then hands the outcome to
//! [`ReviewSession::commit`]. Only the most recently issued ticket may
//! commit; an older scan finishing late is discarded, so overlapping reloads
//! can never replace a newer model with an older one. Committed state is
//! swapped in as a whole `Arc`, so readers never see a half-installed model.
//!
//! [`SessionTable`] holds one session per case and evicts the least recently
//! used case once it reaches capacity.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::analytics::focus_citation;
use crate::error::ReconcileError;
use crate::models::Event;
use crate::reconcile::ReconciliationResult;

/// Generation number handed out by [`ReviewSession::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// What a reload produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Ready { result: Arc<ReconciliationResult> },
    Empty {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        remediation: Option<String>,
    },
}

impl From<Result<ReconciliationResult, ReconcileError>> for ReviewOutcome {
    fn from(r: Result<ReconciliationResult, ReconcileError>) -> Self {
        match r {
            Ok(result) => ReviewOutcome::Ready {
                result: Arc::new(result),
            },
            Err(e) => ReviewOutcome::Empty {
                code: e.code().to_string(),
                message: e.to_string(),
                remediation: e.remediation().map(str::to_string),
            },
        }
    }
}

/// Snapshot of a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub generation: u64,
    pub outcome: Option<ReviewOutcome>,
    pub focused_event_id: Option<String>,
    pub focused_citation_id: Option<String>,
}

impl SessionState {
    pub fn result(&self) -> Option<&Arc<ReconciliationResult>> {
        match &self.outcome {
            Some(ReviewOutcome::Ready { result }) => Some(result),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct ReviewSession {
    issued: AtomicU64,
    state: RwLock<Arc<SessionState>>,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a reload.
    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Install `outcome` if `ticket` is still the latest. Returns whether it
    /// was installed.
    pub fn commit(&self, ticket: Ticket, outcome: ReviewOutcome) -> bool {
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        if ticket.0 != self.issued.load(Ordering::SeqCst) || ticket.0 <= state.generation {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.issued.load(Ordering::SeqCst),
                "discarding stale review result"
            );
            return false;
        }
        *state = Arc::new(SessionState {
            generation: ticket.0,
            outcome: Some(outcome),
            focused_event_id: None,
            focused_citation_id: None,
        });
        true
    }

    pub fn snapshot(&self) -> Arc<SessionState> {
        self.state
            .read()
            .map(|s| Arc::clone(&*s))
            .unwrap_or_default()
    }

    /// Select the first event citing `citation_id` in the current model.
    ///
    /// Returns the focused event, or `None` when no loaded event owns the
    /// citation (the previous focus is then left unchanged).
    pub fn focus_citation(&self, citation_id: &str) -> Option<Event> {
        let mut state = self.state.write().ok()?;
        let event = state
            .result()
            .and_then(|r| focus_citation(&r.events, citation_id))
            .cloned()?;
        let mut next = SessionState::clone(&state);
        next.focused_event_id = Some(event.id.clone());
        next.focused_citation_id = Some(citation_id.to_string());
        *state = Arc::new(next);
        Some(event)
    }
}

/// Bounded case id to session map with least-recently-used eviction.
pub struct SessionTable {
    capacity: usize,
    clock: u64,
    entries: HashMap<String, (u64, Arc<ReviewSession>)>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            entries: HashMap::new(),
        }
    }

    /// The session for `case_id`, created if absent.
    pub fn get_or_create(&mut self, case_id: &str) -> Arc<ReviewSession> {
        if let Some(session) = self.get(case_id) {
            return session;
        }
        if self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        let session = Arc::new(ReviewSession::new());
        self.clock += 1;
        self.entries
            .insert(case_id.to_string(), (self.clock, Arc::clone(&session)));
        session
    }

    /// The session for `case_id` if one exists. Counts as a use.
    pub fn get(&mut self, case_id: &str) -> Option<Arc<ReviewSession>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(case_id).map(|(used, session)| {
            *used = clock;
            Arc::clone(session)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (used, _))| *used)
            .map(|(case_id, _)| case_id.clone());
        if let Some(case_id) = oldest {
            tracing::debug!(case_id = %case_id, capacity = self.capacity, "evicting review session");
            self.entries.remove(&case_id);
        }
    }
}

//! Artifact retrieval abstraction.
//!
//! The [`ArtifactSource`] trait is the seam between the candidate selector
//! and wherever run artifacts live. [`BackendClient`](crate::backend::BackendClient)
//! implements it over HTTP; [`InMemoryArtifacts`] implements it over a map
//! and counts every fetch, which is what selector tests assert against.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::FetchError;

/// Which endpoint an artifact was requested from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactRef {
    /// `GET /runs/{run}/artifacts/by-name/{name}`
    Named(String),
    /// `GET /runs/{run}/artifacts/{type}`
    Typed(String),
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactRef::Named(name) => write!(f, "by-name/{}", name),
            ArtifactRef::Typed(ty) => write!(f, "{}", ty),
        }
    }
}

/// Read access to run artifacts.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch and parse a run artifact.
    async fn fetch(&self, run_id: &str, artifact: &ArtifactRef) -> Result<Value, FetchError>;
}

/// Map-backed artifact source with per-run fetch counters.
#[derive(Default)]
pub struct InMemoryArtifacts {
    bodies: RwLock<HashMap<(String, ArtifactRef), Value>>,
    fetches: RwLock<HashMap<String, AtomicUsize>>,
    total: AtomicUsize,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a body under a run and artifact reference.
    pub fn insert(&self, run_id: &str, artifact: ArtifactRef, body: Value) {
        if let Ok(mut bodies) = self.bodies.write() {
            bodies.insert((run_id.to_string(), artifact), body);
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, run_id: &str, artifact: ArtifactRef, body: Value) -> Self {
        self.insert(run_id, artifact, body);
        self
    }

    /// Number of fetches issued for one run (hits and misses).
    pub fn fetch_count(&self, run_id: &str) -> usize {
        self.fetches
            .read()
            .ok()
            .and_then(|f| f.get(run_id).map(|c| c.load(Ordering::SeqCst)))
            .unwrap_or(0)
    }

    /// Number of fetches issued across all runs.
    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn record_fetch(&self, run_id: &str) {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut fetches) = self.fetches.write() {
            fetches
                .entry(run_id.to_string())
                .or_default()
                .fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ArtifactSource for InMemoryArtifacts {
    async fn fetch(&self, run_id: &str, artifact: &ArtifactRef) -> Result<Value, FetchError> {
        self.record_fetch(run_id);
        let bodies = self
            .bodies
            .read()
            .map_err(|_| FetchError::Missing(format!("{}/{}", run_id, artifact)))?;
        bodies
            .get(&(run_id.to_string(), artifact.clone()))
            .cloned()
            .ok_or_else(|| FetchError::Missing(format!("{}/{}", run_id, artifact)))
    }
}

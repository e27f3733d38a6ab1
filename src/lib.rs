//! # Evidence Review
//!
//! Reconciles the evidence graph produced by a case extraction run into a
//! review model: a chronology of events, each anchored to document-local
//! page citations, plus the analytical signal collections the extractor
//! attached and a few derived case metrics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Backend    │──▶│  Candidate   │──▶│   Reconcile   │
//! │ runs + artif.│   │  selection   │   │ pages/cites/  │
//! └──────────────┘   └──────────────┘   │ events/signals│
//!                                       └───────┬───────┘
//!                      ┌────────────────────────┤
//!                      ▼                        ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │   CLI    │            │   HTTP   │
//!                 │  (evr)   │            │ (review) │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evr runs m-42                  # list runs and their eligibility
//! evr review m-42                # pick the best run and print the chronology
//! evr inspect evidence_graph.json --json
//! evr serve                      # start the review API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Fetch and reconciliation error types |
//! | [`models`] | Runs, raw graph records, resolved citations and events |
//! | [`normalize`] | Locating the evidence graph inside an artifact |
//! | [`pages`] | Global to document-local page numbering |
//! | [`citations`] | Citation index by id and by page |
//! | [`linker`] | Event linking and field normalization |
//! | [`signals`] | Extension signal collections |
//! | [`analytics`] | Coverage, contradictions, severity, risk |
//! | [`reconcile`] | The full pipeline for one graph |
//! | [`select`] | Best-candidate run selection |
//! | [`artifacts`] | Artifact source abstraction |
//! | [`progress`] | Scan progress reporting |
//! | [`backend`] | HTTP client for the extraction backend |
//! | [`auth`] | Tenant headers and service tokens |
//! | [`runs`] | Run eligibility and staleness |
//! | [`session`] | Per-case review state |
//! | [`review`] | CLI command implementations |
//! | [`server`] | Review HTTP API |

pub mod analytics;
pub mod artifacts;
pub mod auth;
pub mod backend;
pub mod citations;
pub mod config;
pub mod error;
pub mod linker;
pub mod models;
pub mod normalize;
pub mod pages;
pub mod progress;
pub mod reconcile;
pub mod review;
pub mod runs;
pub mod select;
pub mod server;
pub mod session;
pub mod signals;

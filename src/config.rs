//! TOML configuration.
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:8000"
//! timeout_secs = 30
//! graph_artifact = "evidence_graph.json"
//! fallback_artifact_type = "json"
//!
//! [auth]
//! user_id = "u-17"
//! firm_id = "f-3"
//! # jwt_secret = "..."   # prefer API_INTERNAL_JWT_SECRET
//! jwt_ttl_secs = 60
//!
//! [selection]
//! eligible_statuses = ["success", "partial", "completed"]
//! stale_after_mins = 10
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! max_sessions = 1024
//! ```
//!
//! Environment variables override the file: `API_URL`,
//! `API_INTERNAL_JWT_SECRET`, `API_INTERNAL_JWT_TTL_SECONDS`, `EVR_USER_ID`,
//! `EVR_FIRM_ID`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::RunStatus;

pub const DEFAULT_GRAPH_ARTIFACT: &str = "evidence_graph.json";
pub const DEFAULT_FALLBACK_ARTIFACT_TYPE: &str = "json";

/// Longest accepted service token lifetime (one hour).
pub const MAX_JWT_TTL_SECS: i64 = 3600;
/// Longest accepted stale-run window (one year).
pub const MAX_STALE_AFTER_MINS: i64 = 525_600;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_graph_artifact")]
    pub graph_artifact: String,
    #[serde(default = "default_fallback_artifact_type")]
    pub fallback_artifact_type: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            graph_artifact: default_graph_artifact(),
            fallback_artifact_type: default_fallback_artifact_type(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_graph_artifact() -> String {
    DEFAULT_GRAPH_ARTIFACT.to_string()
}
fn default_fallback_artifact_type() -> String {
    DEFAULT_FALLBACK_ARTIFACT_TYPE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub firm_id: Option<String>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_ttl_secs")]
    pub jwt_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            firm_id: None,
            jwt_secret: None,
            jwt_ttl_secs: default_jwt_ttl_secs(),
        }
    }
}

fn default_jwt_ttl_secs() -> i64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SelectionConfig {
    #[serde(default = "default_eligible_statuses")]
    pub eligible_statuses: Vec<RunStatus>,
    #[serde(default = "default_stale_after_mins")]
    pub stale_after_mins: i64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            eligible_statuses: default_eligible_statuses(),
            stale_after_mins: default_stale_after_mins(),
        }
    }
}

fn default_eligible_statuses() -> Vec<RunStatus> {
    vec![RunStatus::Success, RunStatus::Partial, RunStatus::Completed]
}
fn default_stale_after_mins() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Cases kept in memory before the least recently used is dropped.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_max_sessions() -> usize {
    1024
}

impl Config {
    /// All defaults, used by commands that can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Apply environment overrides on top of file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("API_URL") {
            self.backend.base_url = url;
        }
        if let Some(secret) = get("API_INTERNAL_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(ttl) = get("API_INTERNAL_JWT_TTL_SECONDS") {
            self.auth.jwt_ttl_secs = ttl
                .parse()
                .with_context(|| format!("API_INTERNAL_JWT_TTL_SECONDS is not a number: {}", ttl))?;
        }
        if let Some(user) = get("EVR_USER_ID") {
            self.auth.user_id = Some(user);
        }
        if let Some(firm) = get("EVR_FIRM_ID") {
            self.auth.firm_id = Some(firm);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.backend.base_url.starts_with("http://")
            || self.backend.base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "backend.base_url must start with http:// or https://, got '{}'",
                self.backend.base_url
            );
        }

        if self.backend.timeout_secs == 0 {
            anyhow::bail!("backend.timeout_secs must be > 0");
        }

        if self.backend.graph_artifact.trim().is_empty() {
            anyhow::bail!("backend.graph_artifact must not be empty");
        }

        if self.backend.fallback_artifact_type.trim().is_empty() {
            anyhow::bail!("backend.fallback_artifact_type must not be empty");
        }

        if self.auth.jwt_ttl_secs <= 0 || self.auth.jwt_ttl_secs > MAX_JWT_TTL_SECS {
            anyhow::bail!(
                "auth.jwt_ttl_secs must be between 1 and {}, got {}",
                MAX_JWT_TTL_SECS,
                self.auth.jwt_ttl_secs
            );
        }

        if self.selection.eligible_statuses.is_empty() {
            anyhow::bail!("selection.eligible_statuses must list at least one status");
        }

        if self.selection.stale_after_mins <= 0
            || self.selection.stale_after_mins > MAX_STALE_AFTER_MINS
        {
            anyhow::bail!(
                "selection.stale_after_mins must be between 1 and {}, got {}",
                MAX_STALE_AFTER_MINS,
                self.selection.stale_after_mins
            );
        }

        if self.server.max_sessions == 0 {
            anyhow::bail!("server.max_sessions must be > 0");
        }

        Ok(())
    }
}

/// Load a config file, or defaults when `path` does not exist, then apply
/// environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::minimal()
    };

    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

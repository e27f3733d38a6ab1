//! Run eligibility and staleness.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::SelectionConfig;
use crate::models::{Run, RunMetrics, RunStatus};

/// Ids of runs whose status is in `statuses`, in the order given.
pub fn eligible_run_ids(runs: &[Run], statuses: &[RunStatus]) -> Vec<String> {
    runs.iter()
        .filter(|r| statuses.contains(&r.status))
        .map(|r| r.id.clone())
        .collect()
}

/// First pending or running run.
pub fn active_run(runs: &[Run]) -> Option<&Run> {
    runs.iter().find(|r| r.status.is_active())
}

/// Parse an RFC 3339 timestamp; timestamps without an offset are UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// An active run is stale when its last heartbeat (or, lacking one, its
/// start) is older than `stale_after`. Runs with no usable timestamp are
/// never stale.
pub fn is_stale(run: &Run, now: DateTime<Utc>, stale_after: Duration) -> bool {
    if !run.status.is_active() {
        return false;
    }
    let ts = run
        .heartbeat_at
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or(run.started_at.as_deref());
    match ts.and_then(parse_timestamp) {
        Some(at) => now - at > stale_after,
        None => false,
    }
}

/// One run as shown by `evr runs` and `GET /cases/{id}/runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub status: RunStatus,
    pub eligible: bool,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<RunMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub fn summarize_runs(runs: &[Run], selection: &SelectionConfig, now: DateTime<Utc>) -> Vec<RunSummary> {
    // A window too wide for chrono never elapses.
    let stale_after = Duration::try_minutes(selection.stale_after_mins);
    runs.iter()
        .map(|r| RunSummary {
            id: r.id.clone(),
            status: r.status.clone(),
            eligible: selection.eligible_statuses.contains(&r.status),
            stale: stale_after.is_some_and(|window| is_stale(r, now, window)),
            started_at: r.started_at.clone(),
            heartbeat_at: r.heartbeat_at.clone(),
            metrics: r.metrics.clone(),
            error_message: r.error_message.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, status: &str) -> Run {
        Run {
            id: id.into(),
            status: RunStatus::from(status.to_string()),
            started_at: None,
            heartbeat_at: None,
            metrics: None,
            error_message: None,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_eligible_preserves_order() {
        let runs = vec![
            run("r3", "success"),
            run("r2", "failed"),
            run("r1", "PARTIAL"),
            run("r0", "completed"),
        ];
        let ids = eligible_run_ids(&runs, &SelectionConfig::default().eligible_statuses);
        assert_eq!(ids, vec!["r3", "r1", "r0"]);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(
            at("2024-05-01T10:00:00+02:00"),
            at("2024-05-01T08:00:00Z")
        );
        assert_eq!(at("2024-05-01T08:00:00.123"), at("2024-05-01T08:00:00.123Z"));
        assert_eq!(at("2024-05-01 08:00:00"), at("2024-05-01T08:00:00Z"));
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_stale_uses_heartbeat_then_start() {
        let now = at("2024-05-01T12:00:00Z");
        let window = Duration::minutes(10);

        let mut r = run("r", "running");
        r.started_at = Some("2024-05-01T11:00:00Z".into());
        assert!(is_stale(&r, now, window));

        r.heartbeat_at = Some("2024-05-01T11:55:00Z".into());
        assert!(!is_stale(&r, now, window));

        r.heartbeat_at = Some("2024-05-01T11:49:59Z".into());
        assert!(is_stale(&r, now, window));

        // Exactly at the boundary is not yet stale.
        r.heartbeat_at = Some("2024-05-01T11:50:00Z".into());
        assert!(!is_stale(&r, now, window));
    }

    #[test]
    fn test_finished_or_untimed_runs_never_stale() {
        let now = at("2024-05-01T12:00:00Z");
        let mut r = run("r", "success");
        r.started_at = Some("2020-01-01T00:00:00Z".into());
        assert!(!is_stale(&r, now, Duration::minutes(10)));

        let r = run("p", "pending");
        assert!(!is_stale(&r, now, Duration::minutes(10)));
    }

    #[test]
    fn test_summaries() {
        let now = at("2024-05-01T12:00:00Z");
        let mut active = run("a", "pending");
        active.started_at = Some("2024-05-01T10:00:00Z".into());
        let runs = vec![active, run("b", "success")];
        let summaries = summarize_runs(&runs, &SelectionConfig::default(), now);
        assert!(summaries[0].stale && !summaries[0].eligible);
        assert!(!summaries[1].stale && summaries[1].eligible);
        assert_eq!(active_run(&runs).map(|r| r.id.as_str()), Some("a"));
    }

    #[test]
    fn test_oversized_window_never_stale() {
        let now = at("2024-05-01T12:00:00Z");
        let mut active = run("a", "running");
        active.started_at = Some("2001-01-01T00:00:00Z".into());
        let selection = SelectionConfig {
            stale_after_mins: i64::MAX,
            ..SelectionConfig::default()
        };
        let summaries = summarize_runs(&[active], &selection, now);
        assert!(!summaries[0].stale);
    }
}

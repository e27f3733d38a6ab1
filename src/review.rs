//! Review commands: load, inspect and manage a case's extraction runs.
//!
//! Used by the `evr review`, `evr inspect`, `evr runs`, `evr reprocess` and
//! `evr cancel` CLI commands. [`load_review`] is shared with the HTTP server.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::backend::BackendClient;
use crate::config::{Config, SelectionConfig};
use crate::error::ReconcileError;
use crate::models::Citation;
use crate::progress::{ProgressMode, ScanProgressReporter};
use crate::reconcile::{reconcile_artifact, ReconciliationResult};
use crate::runs::{eligible_run_ids, summarize_runs};
use crate::select::{select_candidate, Selection, SelectionOptions};
use crate::signals::SignalKind;

/// List a case's runs, filter to eligible ones, and select the best graph.
pub async fn load_review(
    client: &BackendClient,
    config: &Config,
    case_id: &str,
    progress: &dyn ScanProgressReporter,
) -> Result<Selection, ReconcileError> {
    let runs = client
        .list_runs(case_id)
        .await
        .map_err(ReconcileError::Runs)?;
    let run_ids = eligible_run_ids(&runs, &config.selection.eligible_statuses);
    tracing::info!(
        case_id,
        runs = runs.len(),
        eligible = run_ids.len(),
        "loading review"
    );

    let options = SelectionOptions::from_config(&config.backend);
    select_candidate(client, &run_ids, &options, progress).await
}

/// `evr review <case>`
pub async fn run_review(
    config: &Config,
    case_id: &str,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    let client = BackendClient::from_config(config)?;
    let reporter = progress.reporter();

    let selection = match load_review(&client, config, case_id, reporter.as_ref()).await {
        Ok(selection) => selection,
        Err(e) => match e.remediation() {
            Some(fix) => bail!("{} for case {}: {}", e, case_id, fix),
            None => return Err(e).with_context(|| format!("review of case {} failed", case_id)),
        },
    };

    if json {
        let bytes = selection.result.to_canonical_json()?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    println!("Case {}", case_id);
    println!(
        "  Runs scanned: {}{}",
        selection.runs_attempted,
        if selection.stopped_early {
            " (stopped early)"
        } else {
            ""
        }
    );
    print_result(&selection.result);
    Ok(())
}

/// `evr inspect <file>`: reconcile a local artifact without a backend.
pub fn run_inspect(path: &Path, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Artifact is not valid JSON: {}", path.display()))?;

    let Some(result) = reconcile_artifact(&doc, None) else {
        bail!("no evidence graph with events found in {}", path.display());
    };

    if json {
        let bytes = result.to_canonical_json()?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    println!("Artifact {}", path.display());
    print_result(&result);
    Ok(())
}

/// `evr runs <case>`
pub async fn run_runs(config: &Config, case_id: &str, json: bool) -> Result<()> {
    let client = BackendClient::from_config(config)?;
    let runs = client
        .list_runs(case_id)
        .await
        .with_context(|| format!("Failed to list runs for case {}", case_id))?;
    let summaries = summarize_runs(&runs, &config.selection, chrono::Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No runs for case {}.", case_id);
        return Ok(());
    }

    println!(
        "  {:<38} {:<10} {:>8} {:>8}   {}",
        "RUN", "STATUS", "ELIGIBLE", "PAGES", "NOTE"
    );
    println!("  {}", "-".repeat(76));
    for s in &summaries {
        let pages = s
            .metrics
            .as_ref()
            .and_then(|m| m.pages_total)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let note = if s.stale {
            "stalled; cancel and retry".to_string()
        } else {
            s.error_message.clone().unwrap_or_default()
        };
        println!(
            "  {:<38} {:<10} {:>8} {:>8}   {}",
            s.id,
            s.status,
            if s.eligible { "yes" } else { "no" },
            pages,
            note
        );
    }
    print_stale_hint(&summaries, &config.selection);
    Ok(())
}

fn print_stale_hint(summaries: &[crate::runs::RunSummary], selection: &SelectionConfig) {
    if summaries.iter().any(|s| s.stale) {
        println!();
        println!(
            "  A run has not reported progress in over {} minutes.",
            selection.stale_after_mins
        );
    }
}

/// `evr reprocess <case>`
pub async fn run_reprocess(config: &Config, case_id: &str) -> Result<()> {
    let client = BackendClient::from_config(config)?;
    let body = client
        .start_run(case_id)
        .await
        .with_context(|| format!("Failed to start a run for case {}", case_id))?;
    match body.get("id").and_then(|v| v.as_str()) {
        Some(id) => println!("Started run {} for case {}", id, case_id),
        None => println!("Reprocess requested for case {}", case_id),
    }
    Ok(())
}

/// `evr cancel <run>`
pub async fn run_cancel(config: &Config, run_id: &str) -> Result<()> {
    let client = BackendClient::from_config(config)?;
    client
        .cancel_run(run_id)
        .await
        .with_context(|| format!("Failed to cancel run {}", run_id))?;
    println!("Run {} cancelled", run_id);
    Ok(())
}

fn print_result(result: &ReconciliationResult) {
    let a = &result.analytics;
    if let Some(run_id) = &result.run_id {
        println!("  Run:          {}", run_id);
    }
    println!("  Events:       {}", result.event_count());
    println!(
        "  Anchored:     {} / {} ({}%)",
        a.anchored_events, a.total_events, a.coverage_percent
    );
    println!("  Signals:      {}", result.signal_count);
    println!("  Risk:         {} ({:?})", a.risk_score, a.risk_level);
    println!("  Score:        {:.3}", result.score);

    let present: Vec<String> = SignalKind::ALL
        .iter()
        .filter_map(|k| {
            let n = result.signals.rows(*k).len();
            (n > 0).then(|| format!("{} {}", n, k.label()))
        })
        .collect();
    if !present.is_empty() {
        println!("  Collections:  {}", present.join(", "));
    }

    if result.events.is_empty() {
        return;
    }
    println!();
    println!("  {:<12} {:<18} {}", "DATE", "TYPE", "SUMMARY");
    println!("  {}", "-".repeat(76));
    for ev in &result.events {
        println!(
            "  {:<12} {:<18} {}",
            ev.date_label,
            ev.event_type,
            truncate(&ev.summary, 60)
        );
        if !ev.citations.is_empty() {
            let refs: Vec<String> = ev.citations.iter().map(citation_ref).collect();
            println!("  {:<12} {:<18} [{}]", "", "", refs.join(", "));
        }
    }
}

fn citation_ref(c: &Citation) -> String {
    match c.page_number {
        Some(p) => format!("{} p.{}", c.source_document_id, p),
        None => c.source_document_id.clone(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

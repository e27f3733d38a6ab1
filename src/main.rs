//! # Evidence Review CLI (`evr`)
//!
//! ## Usage
//!
//! ```bash
//! evr --config ./config/evr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evr review <case>` | Select the best run and print its reconciled chronology |
//! | `evr inspect <file>` | Reconcile a local artifact file (no backend needed) |
//! | `evr runs <case>` | List runs with eligibility and staleness |
//! | `evr reprocess <case>` | Start a new extraction run |
//! | `evr cancel <run>` | Cancel a run |
//! | `evr serve` | Start the review HTTP API |
//! | `evr completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evidence_review::config::{self, Config};
use evidence_review::progress::ProgressMode;
use evidence_review::{review, server};

/// Evidence Review: reconcile case extraction runs into reviewable chronologies.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/evr.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "evr",
    about = "Evidence Review: reconcile extraction runs into cited chronologies",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/evr.toml`. A missing file means all defaults;
    /// environment variables are applied on top either way.
    #[arg(long, global = true, default_value = "./config/evr.toml")]
    config: PathBuf,

    /// Log at info level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Scan progress on stderr: off, human, or json.
    ///
    /// Defaults to human when stderr is a terminal, otherwise off.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the best extracted graph for a case and print it.
    ///
    /// Eligible runs are scanned in backend order; scanning stops at the
    /// first run carrying extension signals.
    Review {
        case_id: String,

        /// Print the reconciled model as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Reconcile an artifact JSON file from disk.
    Inspect {
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List a case's runs.
    Runs {
        case_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Start a new extraction run for a case.
    Reprocess { case_id: String },

    /// Cancel an extraction run.
    Cancel { run_id: String },

    /// Start the review HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions { shell: clap_complete::Shell },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "evidence_review=info,evr=info"
    } else {
        "evidence_review=warn,evr=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "evr", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Inspect { path, json } => {
            review::run_inspect(path, *json)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg: Config = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Review { case_id, json } => {
            review::run_review(&cfg, &case_id, json, progress).await?;
        }
        Commands::Runs { case_id, json } => {
            review::run_runs(&cfg, &case_id, json).await?;
        }
        Commands::Reprocess { case_id } => {
            review::run_reprocess(&cfg, &case_id).await?;
        }
        Commands::Cancel { run_id } => {
            review::run_cancel(&cfg, &run_id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Inspect { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}

//! gdxstore: commit-scoped storage for simulation results.
//!
//! A result file is archived under `<storage>/<commit8>/` only when it is
//! provenance-valid:
//!
//! - **Reproducible**: the build system declares it as a target, or the
//!   operator registers the recipe that produced it.
//! - **Fresh**: the run that wrote it started no earlier than the newest
//!   source file of the current commit (read from the run's own log).
//! - **Committed**: tracked files match HEAD, unless the operator opts in to
//!   storing the uncommitted diff as a patch next to the result.
//!
//! # Examples
//!
//! ```bash
//! # Store two results of the current commit
//! gdxstore store results_ssp2_bau.gdx results_ssp2_curpol.gdx --storage-folder /data/results
//!
//! # A result produced by a script instead of a make target
//! gdxstore store results_custom.gdx --recipe run_custom.sh
//!
//! # History with the files stored per commit
//! gdxstore log --since 2025-07-01
//!
//! # Compare a fresh result with the copy stored for another commit
//! gdxstore diff results_ssp2_bau.gdx --commit 353d204b
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: version-control and build-system seams, provenance clocks,
//!   the timing gate, configuration and the storage pipeline
//! - [`plugins`]: archive layout, reproducibility classification, history
//!   correlation and the diff front-end

pub mod core;
pub mod plugins;

mod cli;

use crate::core::build_targets::MakeDatabase;
use crate::core::config::Config;
use crate::core::pipeline::{
    BatchReport, StoreOutcome, StorePipeline, StorePolicy, StoreRequest, UncommittedPolicy,
};
use crate::core::temporal::TimingPolicy;
use crate::core::time::command_envelope;
use crate::core::tui::{self, ItemStatus};
use crate::core::vcs::Git;
use crate::plugins::archive::ArchiveStore;
use crate::plugins::classify::Reproducibility;
use crate::plugins::{diff, history};
use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command, DiffCli, LogCli, StoreCli};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the stderr log subscriber.
///
/// `RUST_LOG` overrides the default `warn` filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let work_dir = std::env::current_dir().context("cannot determine the working directory")?;
    let config = Config::load(cli.config.as_deref(), &work_dir)?;

    match cli.command {
        Command::Store(store_cli) => run_store(store_cli, &config, &work_dir),
        Command::Diff(diff_cli) => run_diff(diff_cli, &config, &work_dir),
        Command::Log(log_cli) => run_log(log_cli, &config, &work_dir),
    }
}

fn archive_store(flag: Option<PathBuf>, config: &Config, work_dir: &Path) -> Result<ArchiveStore> {
    let Some(folder) = flag.or_else(|| config.storage.folder.clone()) else {
        bail!(
            "no storage folder configured: pass --storage-folder or set storage.folder in {}",
            crate::core::config::CONFIG_FILE_NAME
        );
    };
    Ok(ArchiveStore::new(work_dir.join(folder)))
}

fn check_format(format: &str) -> Result<bool> {
    match format {
        "text" => Ok(false),
        "json" => Ok(true),
        other => bail!("unknown format '{}': expected 'text' or 'json'", other),
    }
}

fn run_store(store_cli: StoreCli, config: &Config, work_dir: &Path) -> Result<ExitCode> {
    let json = check_format(&store_cli.format)?;
    let archive = archive_store(store_cli.storage_folder, config, work_dir)?;
    let vcs = Git::new(work_dir);
    let build = MakeDatabase::new(config.build.command.clone(), work_dir);

    let policy = StorePolicy {
        timing: if store_cli.no_timing_validation {
            TimingPolicy::Skip
        } else {
            TimingPolicy::Enforce
        },
        uncommitted: if store_cli.allow_uncommitted {
            UncommittedPolicy::CapturePatch
        } else {
            UncommittedPolicy::Reject
        },
    };
    let pipeline = StorePipeline::new(&vcs, &build, &archive, work_dir)
        .with_log_dir(&config.provenance.log_dir)
        .with_policy(policy);

    let requests: Vec<StoreRequest> = store_cli
        .files
        .iter()
        .map(|file| StoreRequest::new(file).with_recipe(store_cli.recipe.clone()))
        .collect();
    let batch = pipeline.store_all(&requests);

    if json {
        println!("{}", serde_json::to_string_pretty(&batch_json(&batch))?);
    } else {
        render_batch(&batch);
    }

    Ok(if batch.all_stored() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render_batch(batch: &BatchReport) {
    for report in &batch.reports {
        tui::print_section(&format!(
            "Starting storage process for: {}",
            report.artifact.display()
        ));
        match &report.result {
            Ok(outcome) => render_outcome(outcome),
            Err(err) => {
                tui::print_status_line(&format!("Refused ({})", err.code()), ItemStatus::Fail);
                tui::print_detail(&err.to_string());
            }
        }
    }
    tui::print_summary(batch.stored(), batch.failed());
}

fn render_outcome(outcome: &StoreOutcome) {
    tui::print_status_line(
        &format!("Current commit: {} (folder {})", outcome.commit, outcome.folder),
        ItemStatus::Info,
    );
    match &outcome.reproducibility {
        Reproducibility::Buildable => tui::print_status_line(
            &format!("{} is reproducible through makefiles", outcome.artifact),
            ItemStatus::Pass,
        ),
        Reproducibility::RecipeProvided { record } => tui::print_status_line(
            &format!(
                "{} is not among build targets; recipe {} copied to {}",
                outcome.artifact,
                record.recipe.display(),
                record.copied_to.display()
            ),
            ItemStatus::Pass,
        ),
        Reproducibility::Unclassified => {}
    }
    if outcome.uncommitted_files.is_empty() {
        tui::print_status_line("No uncommitted changes found", ItemStatus::Pass);
    } else {
        tui::print_status_line(
            &format!(
                "{} uncommitted file(s) captured as a patch",
                outcome.uncommitted_files.len()
            ),
            ItemStatus::Info,
        );
    }
    match (&outcome.latest_change, &outcome.production_start) {
        (Some(latest), Some(start)) => {
            tui::print_status_line(
                &format!("Latest modified file: {} ({})", latest.path.display(), latest.at),
                ItemStatus::Info,
            );
            tui::print_status_line(&format!("Execution started on: {}", start.at), ItemStatus::Info);
            tui::print_status_line("Execution time > Latest change", ItemStatus::Pass);
        }
        _ => tui::print_status_line("Timing validation skipped", ItemStatus::Skipped),
    }
    if let Some(patch) = &outcome.stored.patch {
        tui::print_status_line(&format!("Patch saved: {}", patch.display()), ItemStatus::Pass);
    }
    tui::print_status_line(
        &format!("File stored: {}", outcome.stored.path.display()),
        ItemStatus::Pass,
    );
}

fn batch_json(batch: &BatchReport) -> serde_json::Value {
    let results: Vec<serde_json::Value> = batch
        .reports
        .iter()
        .map(|report| match &report.result {
            Ok(outcome) => serde_json::json!({
                "artifact": report.artifact,
                "status": "stored",
                "outcome": outcome,
            }),
            Err(err) => serde_json::json!({
                "artifact": report.artifact,
                "status": "refused",
                "code": err.code(),
                "message": err.to_string(),
            }),
        })
        .collect();
    command_envelope(
        "store",
        if batch.all_stored() { "ok" } else { "error" },
        serde_json::json!({
            "stored": batch.stored(),
            "failed": batch.failed(),
            "results": results,
        }),
    )
}

fn run_diff(diff_cli: DiffCli, config: &Config, work_dir: &Path) -> Result<ExitCode> {
    let archive = archive_store(diff_cli.storage_folder, config, work_dir)?;
    let vcs = Git::new(work_dir);
    let outcome = diff::run_diff(
        &vcs,
        &archive,
        &config.diff.program,
        work_dir,
        &diff_cli.file,
        &diff_cli.commit,
    )?;
    tui::print_status_line(
        &format!("Found stored file at {}", outcome.stored.display()),
        ItemStatus::Pass,
    );
    tui::print_status_line(
        &format!("Diff written to {}", outcome.output.display()),
        ItemStatus::Pass,
    );
    if let Some(code) = outcome.exit_code.filter(|c| *c != 0) {
        tui::print_status_line(
            &format!("{} exited with {}", config.diff.program, code),
            ItemStatus::Info,
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_log(log_cli: LogCli, config: &Config, work_dir: &Path) -> Result<ExitCode> {
    let json = check_format(&log_cli.format)?;
    let archive = archive_store(log_cli.storage_folder, config, work_dir)?;
    let vcs = Git::new(work_dir);
    let since = log_cli.since.or_else(|| config.history.since.clone());
    let commits = history::history(&vcs, &archive, since.as_deref())?;

    if json {
        let envelope = command_envelope(
            "log",
            "ok",
            serde_json::json!({ "commits": history::to_json(&commits) }),
        );
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", history::render_text(&commits));
    }
    Ok(ExitCode::SUCCESS)
}

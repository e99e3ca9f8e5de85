//! CLI struct definitions for the gdxstore command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "gdxstore",
    version = env!("CARGO_PKG_VERSION"),
    about = "Store simulation results by commit, once they are proven reproducible and fresh"
)]
pub(crate) struct Cli {
    /// Configuration file (defaults to ./gdxstore.toml when present).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Validate and store result files under the current commit
    #[clap(name = "store", visible_alias = "s")]
    Store(StoreCli),

    /// Compare a result file with the copy stored for another commit
    #[clap(name = "diff", visible_alias = "d")]
    Diff(DiffCli),

    /// Show the commit history with the files stored for each commit
    #[clap(name = "log")]
    Log(LogCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct StoreCli {
    /// Result file(s) to store, processed in order.
    #[clap(required = true)]
    pub files: Vec<PathBuf>,
    /// Storage root (overrides `storage.folder` in the configuration).
    #[clap(long)]
    pub storage_folder: Option<PathBuf>,
    /// Script that reproduces the result, for files that are not build targets.
    #[clap(long)]
    pub recipe: Option<PathBuf>,
    /// Skip the check that execution started after the latest source change.
    #[clap(long)]
    pub no_timing_validation: bool,
    /// Store despite uncommitted changes, saving them as a patch next to the result.
    #[clap(long)]
    pub allow_uncommitted: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct DiffCli {
    /// Current result file.
    pub file: PathBuf,
    /// Commit whose stored copy to compare against.
    #[clap(long)]
    pub commit: String,
    /// Storage root (overrides `storage.folder` in the configuration).
    #[clap(long)]
    pub storage_folder: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct LogCli {
    /// Only commits more recent than this date (passed to `git log --since`).
    #[clap(long)]
    pub since: Option<String>,
    /// Storage root (overrides `storage.folder` in the configuration).
    #[clap(long)]
    pub storage_folder: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

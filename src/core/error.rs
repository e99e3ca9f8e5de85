use crate::core::time::Timestamp;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Version control query failed: {0}")]
    VcsQuery(String),
    #[error(
        "{artifact} is not among build targets, and no recipe has been specified.\nRerun with --recipe pointing to a script that reproduces the result."
    )]
    NotReproducible { artifact: String },
    #[error(
        "{artifact} is not among build targets, a recipe has been specified, but there is no {} file.\nPlease provide a valid recipe.",
        .recipe.display()
    )]
    RecipeMissing { artifact: String, recipe: PathBuf },
    #[error("{artifact} has already been stored for commit {commit}")]
    DuplicateArtifact { artifact: String, commit: String },
    #[error("Can't find {}. This is needed to determine the execution time", .path.display())]
    ProvenanceLogMissing { path: PathBuf },
    #[error("Error parsing timestamp from {}: {reason}", .path.display())]
    ProvenanceLogMalformed { path: PathBuf, reason: String },
    #[error("Error getting file modification times: {0}")]
    TimingUnavailable(String),
    #[error(
        "Execution started before the latest file change.\nLatest change: {latest_change} ({})\nExecution start: {production_start}",
        .latest_file.display()
    )]
    StaleProvenance {
        production_start: Timestamp,
        latest_change: Timestamp,
        latest_file: PathBuf,
    },
    #[error("Target file does not exist: {}", .path.display())]
    SourceMissing { path: PathBuf },
    #[error("There are uncommitted changes: {}\nCommit them, or rerun with --allow-uncommitted to store a patch.", .files.join(", "))]
    UncommittedChanges { files: Vec<String> },
    #[error("Invalid artifact name {name}: {reason}")]
    InvalidArtifactName { name: String, reason: String },
    #[error("{program} exited with {status}: {stderr}")]
    ExternalCommand {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl StoreError {
    /// Stable short code used in machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::VcsQuery(_) => "vcs_query",
            StoreError::NotReproducible { .. } | StoreError::RecipeMissing { .. } => {
                "not_reproducible"
            }
            StoreError::DuplicateArtifact { .. } => "duplicate_artifact",
            StoreError::ProvenanceLogMissing { .. } => "provenance_log_missing",
            StoreError::ProvenanceLogMalformed { .. } => "provenance_log_malformed",
            StoreError::TimingUnavailable(_) => "timing_unavailable",
            StoreError::StaleProvenance { .. } => "stale_provenance",
            StoreError::SourceMissing { .. } => "source_missing",
            StoreError::UncommittedChanges { .. } => "uncommitted_changes",
            StoreError::InvalidArtifactName { .. } => "invalid_artifact_name",
            StoreError::ExternalCommand { .. } => "external_command",
            StoreError::NotFound(_) => "not_found",
            StoreError::IoError(_) => "io",
        }
    }
}

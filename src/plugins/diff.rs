//! Compare a fresh result against the copy archived for another commit.
//!
//! The diff tool is opaque: it gets the two inputs and an output file name,
//! and its output file is not read back.

use crate::core::error::StoreError;
use crate::core::vcs::{CommitHash, VersionControl};
use crate::plugins::archive::ArchiveStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const DEFAULT_DIFF_PROGRAM: &str = "gdxdiff";

#[derive(Debug, Clone, Serialize)]
pub struct DiffOutcome {
    pub folder: CommitHash,
    pub stored: PathBuf,
    pub output: PathBuf,
    pub exit_code: Option<i32>,
}

/// Name of the file the diff tool writes for `artifact`.
pub fn diff_output_name(artifact: &str) -> String {
    format!("diffile_{}", artifact)
}

/// Path of `artifact` as archived for `reference`, if it exists.
pub fn stored_copy(
    vcs: &dyn VersionControl,
    archive: &ArchiveStore,
    artifact: &str,
    reference: &str,
) -> Result<(CommitHash, PathBuf), StoreError> {
    let folder = vcs.commit_folder_name(reference)?;
    let stored = archive.commit_folder(&folder).join(artifact);
    if !stored.is_file() {
        return Err(StoreError::NotFound(format!(
            "{} is not stored for commit {} ({})",
            artifact,
            reference,
            stored.display()
        )));
    }
    Ok((folder, stored))
}

/// Run `<program> <current> <stored> diffile_<name>` in `work_dir`.
pub fn run_diff(
    vcs: &dyn VersionControl,
    archive: &ArchiveStore,
    program: &str,
    work_dir: &Path,
    current: &Path,
    reference: &str,
) -> Result<DiffOutcome, StoreError> {
    let artifact = current
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| StoreError::SourceMissing {
            path: current.to_path_buf(),
        })?;
    if !work_dir.join(current).is_file() {
        return Err(StoreError::SourceMissing {
            path: current.to_path_buf(),
        });
    }
    let (folder, stored) = stored_copy(vcs, archive, &artifact, reference)?;
    info!(stored = %stored.display(), "found stored file");

    let output_name = diff_output_name(&artifact);
    debug!(program, current = %current.display(), stored = %stored.display(), output = %output_name, "diff");
    let output = Command::new(program)
        .arg(current)
        .arg(&stored)
        .arg(&output_name)
        .current_dir(work_dir)
        .output()?;
    let output_path = work_dir.join(&output_name);
    // Diff tools commonly exit non-zero when the inputs differ; only a
    // missing output file counts as a failure.
    if !output.status.success() && !output_path.exists() {
        return Err(StoreError::ExternalCommand {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(DiffOutcome {
        folder,
        stored,
        output: output_path,
        exit_code: output.status.code(),
    })
}

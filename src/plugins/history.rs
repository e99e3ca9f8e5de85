//! Commit history joined with archive contents.

use crate::core::error::StoreError;
use crate::core::vcs::{CommitHash, CommitLogEntry, VersionControl};
use crate::plugins::archive::ArchiveStore;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedCommit {
    pub entry: CommitLogEntry,
    pub folder: CommitHash,
    pub stored: BTreeSet<String>,
}

/// Annotate each log entry with what its commit folder holds. Order is kept.
pub fn correlate(
    entries: Vec<CommitLogEntry>,
    vcs: &dyn VersionControl,
    archive: &ArchiveStore,
) -> Result<Vec<AnnotatedCommit>, StoreError> {
    entries
        .into_iter()
        .map(|entry| {
            let folder = vcs.commit_folder_name(&entry.hash)?;
            let stored = archive.stored_entries(&folder)?;
            Ok(AnnotatedCommit {
                entry,
                folder,
                stored,
            })
        })
        .collect()
}

/// History since `since`, annotated.
pub fn history(
    vcs: &dyn VersionControl,
    archive: &ArchiveStore,
    since: Option<&str>,
) -> Result<Vec<AnnotatedCommit>, StoreError> {
    correlate(vcs.log(since)?, vcs, archive)
}

/// Plain-text rendering: each commit's log lines followed by a
/// "Stored files" block when its folder is not empty.
pub fn render_text(commits: &[AnnotatedCommit]) -> String {
    use colored::Colorize;

    let mut out = Vec::new();
    for commit in commits {
        for (i, line) in commit.entry.lines.iter().enumerate() {
            if i == 0 {
                out.push(line.yellow().to_string());
            } else {
                out.push(line.clone());
            }
        }
        if !commit.stored.is_empty() {
            out.push(String::new());
            out.push("Stored files".cyan().to_string());
            out.extend(commit.stored.iter().cloned());
        }
        out.push(String::new());
    }
    out.join("\n")
}

pub fn to_json(commits: &[AnnotatedCommit]) -> serde_json::Value {
    serde_json::Value::Array(
        commits
            .iter()
            .map(|c| {
                serde_json::json!({
                    "commit": c.entry.hash,
                    "folder": c.folder,
                    "stored": c.stored,
                })
            })
            .collect(),
    )
}

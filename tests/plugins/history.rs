use gdxstore::core::error::StoreError;
use gdxstore::core::vcs::{ChangeScope, CommitHash, CommitLogEntry, VersionControl, parse_log};
use gdxstore::plugins::archive::ArchiveStore;
use gdxstore::plugins::history::{correlate, history, render_text, to_json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const LOG: &str = "commit 353d204b05029d94cf4d82aa0011223344556677 (HEAD -> master)
Author: Test User <test@example.com>
Date:   Wed Jan 15 10:00:00 2025 +0100

    Tune damage function

commit 1111111122222222333333334444444455555555
Author: Test User <test@example.com>
Date:   Tue Jan 14 09:00:00 2025 +0100

    Initial model
";

/// Folder names are the first eight hex digits of the full hash.
struct LogOnly;

impl VersionControl for LogOnly {
    fn commit_identity(&self) -> Result<CommitHash, StoreError> {
        Ok(CommitHash::new("353d204"))
    }

    fn commit_folder_name(&self, reference: &str) -> Result<CommitHash, StoreError> {
        Ok(CommitHash::new(&reference[..8]))
    }

    fn changed_files(&self, _scope: ChangeScope) -> Result<Vec<PathBuf>, StoreError> {
        Ok(Vec::new())
    }

    fn capture_patch(&self, _destination: &Path) -> Result<(), StoreError> {
        Ok(())
    }

    fn log(&self, since: Option<&str>) -> Result<Vec<CommitLogEntry>, StoreError> {
        let entries = parse_log(LOG);
        Ok(match since {
            Some(_) => entries.into_iter().take(1).collect(),
            None => entries,
        })
    }
}

fn seeded_archive(root: &Path) -> ArchiveStore {
    let folder = root.join("353d204b");
    fs::create_dir_all(folder.join("recipes")).unwrap();
    fs::write(folder.join("results_ssp2_bau.gdx"), b"gdx").unwrap();
    fs::write(folder.join("results_x_011525_100000.gdx"), b"gdx").unwrap();
    fs::write(folder.join("results_x_011525_100000.patch"), b"diff").unwrap();
    fs::write(folder.join("recipes").join("run.sh"), b"#!/bin/sh").unwrap();
    fs::write(folder.join("recipes.txt"), "# header\n\nresults_x.gdx: run.sh\n").unwrap();
    ArchiveStore::new(root)
}

#[test]
fn test_correlate_keeps_log_order_and_lists_stored_files() {
    let dir = tempdir().unwrap();
    let archive = seeded_archive(dir.path());

    let commits = correlate(parse_log(LOG), &LogOnly, &archive).unwrap();
    assert_eq!(commits.len(), 2);

    assert_eq!(commits[0].folder.as_str(), "353d204b");
    let stored: Vec<&str> = commits[0].stored.iter().map(String::as_str).collect();
    assert_eq!(
        stored,
        vec![
            "results_ssp2_bau.gdx",
            "results_x_011525_100000.gdx",
            "results_x_011525_100000.patch",
        ]
    );

    assert_eq!(commits[1].folder.as_str(), "11111111");
    assert!(commits[1].stored.is_empty());
}

#[test]
fn test_history_passes_since_to_the_log() {
    let dir = tempdir().unwrap();
    let archive = seeded_archive(dir.path());

    let commits = history(&LogOnly, &archive, Some("2025-01-15")).unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].entry.hash, "353d204b05029d94cf4d82aa0011223344556677");
}

#[test]
fn test_render_text_adds_stored_block_only_when_not_empty() {
    colored::control::set_override(false);
    let dir = tempdir().unwrap();
    let archive = seeded_archive(dir.path());
    let commits = correlate(parse_log(LOG), &LogOnly, &archive).unwrap();

    let text = render_text(&commits);
    assert_eq!(text.matches("Stored files").count(), 1);
    assert!(text.contains("    Tune damage function\n\nStored files\nresults_ssp2_bau.gdx\n"));
    assert!(text.contains("    Initial model"));
    assert!(!text.contains("recipes"));

    let stored_at = text.find("Stored files").unwrap();
    let second_commit = text.find("commit 11111111").unwrap();
    assert!(stored_at < second_commit);
}

#[test]
fn test_to_json_shape() {
    let dir = tempdir().unwrap();
    let archive = seeded_archive(dir.path());
    let commits = correlate(parse_log(LOG), &LogOnly, &archive).unwrap();

    let json = to_json(&commits);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["folder"], "353d204b");
    assert_eq!(items[0]["stored"].as_array().unwrap().len(), 3);
    assert_eq!(items[1]["stored"].as_array().unwrap().len(), 0);
}

#[test]
fn test_missing_storage_root_yields_empty_annotations() {
    let dir = tempdir().unwrap();
    let archive = ArchiveStore::new(dir.path().join("never-created"));
    let commits = history(&LogOnly, &archive, None).unwrap();
    assert!(commits.iter().all(|c| c.stored.is_empty()));
}

//! Read-only queries against the repository's version control.
//!
//! Every operation shells out to `git` in the configured working directory.
//! Nothing here writes repository state; the only file this module creates
//! is the patch requested through [`VersionControl::capture_patch`].

use crate::core::error::StoreError;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Width of the abbreviated hash used as a commit folder name.
pub const FOLDER_HASH_WIDTH: usize = 8;

/// Abbreviated commit hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(hash: impl Into<String>) -> Self {
        CommitHash(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which change set to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// Files touched by the commit currently checked out.
    LastCommit,
    /// Tracked files that differ from the checked-out commit.
    Uncommitted,
}

/// One commit as printed by `git log`, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitLogEntry {
    /// Full commit hash.
    pub hash: String,
    /// Raw log lines for this commit, starting with the `commit <hash>` line.
    pub lines: Vec<String>,
}

pub trait VersionControl {
    /// Short hash of HEAD, for display.
    fn commit_identity(&self) -> Result<CommitHash, StoreError>;

    /// Resolve any commit reference to its folder name.
    fn commit_folder_name(&self, reference: &str) -> Result<CommitHash, StoreError>;

    /// Paths (resolved against the repository root) in the requested change set.
    fn changed_files(&self, scope: ChangeScope) -> Result<Vec<PathBuf>, StoreError>;

    fn has_uncommitted_changes(&self) -> Result<bool, StoreError> {
        Ok(!self.changed_files(ChangeScope::Uncommitted)?.is_empty())
    }

    /// Write the uncommitted diff verbatim to `destination`.
    fn capture_patch(&self, destination: &Path) -> Result<(), StoreError>;

    /// Commit history, newest first, optionally bounded by a `--since` date.
    fn log(&self, since: Option<&str>) -> Result<Vec<CommitLogEntry>, StoreError>;
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Git { dir: dir.into() }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(["-c", "core.quotepath=false"])
            .args(args)
            .current_dir(&self.dir);
        cmd
    }

    /// Run git and return trimmed stdout; a failing status is a query error.
    fn run_git(&self, args: &[&str]) -> Result<String, StoreError> {
        debug!(args = ?args, dir = %self.dir.display(), "git");
        let output = self
            .command(args)
            .output()
            .map_err(|e| StoreError::VcsQuery(format!("git {} failed: {}", args.join(" "), e)))?;

        if !output.status.success() {
            return Err(StoreError::VcsQuery(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn toplevel(&self) -> Result<PathBuf, StoreError> {
        let root = self.run_git(&["rev-parse", "--show-toplevel"])?;
        if root.is_empty() {
            return Err(StoreError::VcsQuery(
                "could not determine repository root".to_string(),
            ));
        }
        Ok(PathBuf::from(root))
    }

    fn non_empty_hash(&self, args: &[&str], what: &str) -> Result<CommitHash, StoreError> {
        let hash = self.run_git(args)?;
        if hash.is_empty() {
            return Err(StoreError::VcsQuery(format!("Could not get {}", what)));
        }
        Ok(CommitHash(hash))
    }
}

impl VersionControl for Git {
    fn commit_identity(&self) -> Result<CommitHash, StoreError> {
        self.non_empty_hash(&["rev-parse", "--short", "HEAD"], "commit hash")
    }

    fn commit_folder_name(&self, reference: &str) -> Result<CommitHash, StoreError> {
        // `--short` grows on ambiguity; folder names must not.
        let target = format!("{}^{{commit}}", reference);
        let full = self.non_empty_hash(
            &["rev-parse", "--verify", "--quiet", &target],
            &format!("commit folder name for {}", reference),
        )?;
        Ok(folder_prefix(full.as_str()))
    }

    fn changed_files(&self, scope: ChangeScope) -> Result<Vec<PathBuf>, StoreError> {
        let listing = match scope {
            ChangeScope::LastCommit => self.run_git(&["show", "--pretty=", "--name-only", "HEAD"])?,
            ChangeScope::Uncommitted => self.run_git(&["diff", "HEAD", "--name-only"])?,
        };
        let names = parse_name_list(&listing);
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let root = self.toplevel()?;
        Ok(names.into_iter().map(|name| root.join(name)).collect())
    }

    fn capture_patch(&self, destination: &Path) -> Result<(), StoreError> {
        let file = File::create(destination)?;
        debug!(destination = %destination.display(), "git diff HEAD > patch");
        let output = self
            .command(&["diff", "--no-color", "--no-ext-diff", "HEAD"])
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .output()?;
        if !output.status.success() {
            return Err(StoreError::VcsQuery(format!(
                "git diff failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn log(&self, since: Option<&str>) -> Result<Vec<CommitLogEntry>, StoreError> {
        let since_arg = since.map(|s| format!("--since={}", s));
        let mut args = vec!["log", "--no-color"];
        if let Some(arg) = since_arg.as_deref() {
            args.push(arg);
        }
        Ok(parse_log(&self.run_git(&args)?))
    }
}

/// Folder name for a full commit hash: its first [`FOLDER_HASH_WIDTH`] characters.
pub fn folder_prefix(full_hash: &str) -> CommitHash {
    CommitHash(full_hash.chars().take(FOLDER_HASH_WIDTH).collect())
}

fn parse_name_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split default-format `git log` output into per-commit entries.
pub fn parse_log(text: &str) -> Vec<CommitLogEntry> {
    let mut entries: Vec<CommitLogEntry> = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("commit ") {
            let hash = rest.split_whitespace().next().unwrap_or_default();
            entries.push(CommitLogEntry {
                hash: hash.to_string(),
                lines: vec![line.to_string()],
            });
        } else if let Some(current) = entries.last_mut() {
            current.lines.push(line.to_string());
        }
    }
    for entry in &mut entries {
        while entry.lines.last().is_some_and(|l| l.trim().is_empty()) {
            entry.lines.pop();
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "commit 353d204b05029d94cf4d82aa00112233445566778 (HEAD -> master)
Author: Test User <test@example.com>
Date:   Wed Jan 15 10:00:00 2025 +0100

    Tune damage function

commit 1111111111111111111111111111111111111111
Author: Test User <test@example.com>
Date:   Tue Jan 14 09:00:00 2025 +0100

    Initial model
";

    #[test]
    fn test_parse_log_splits_on_commit_lines() {
        let entries = parse_log(LOG);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, "353d204b05029d94cf4d82aa00112233445566778");
        assert_eq!(entries[1].hash, "1111111111111111111111111111111111111111");
        assert!(entries[0].lines[0].starts_with("commit 353d204b"));
        assert_eq!(entries[0].lines.last().unwrap().trim(), "Tune damage function");
    }

    #[test]
    fn test_parse_log_ignores_preamble_and_empty_input() {
        assert!(parse_log("").is_empty());
        assert!(parse_log("warning: something\n").is_empty());
    }

    #[test]
    fn test_folder_prefix_is_fixed_width() {
        let full = "353d204b05029d94cf4d82aa00112233445566778";
        assert_eq!(folder_prefix(full).as_str(), "353d204b");
        assert_eq!(folder_prefix("abc").as_str(), "abc");
    }

    #[test]
    fn test_parse_name_list_drops_blank_lines() {
        assert_eq!(
            parse_name_list("a.gms\n\n  data/b.inc \n"),
            vec!["a.gms".to_string(), "data/b.inc".to_string()]
        );
    }
}

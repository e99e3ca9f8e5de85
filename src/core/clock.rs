//! Provenance timestamps.
//!
//! Two independent clocks feed the timing gate: the newest modification time
//! among the source files of the current change set, and the production start
//! time the simulation wrote into its own log. Neither value is persisted.

use crate::core::error::StoreError;
use crate::core::time::Timestamp;
use crate::core::vcs::{ChangeScope, VersionControl};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;

/// The newest file in a change set.
///
/// Ties on the timestamp resolve to the first file in listing order; only
/// `at` is meaningful to the timing gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceChange {
    pub path: PathBuf,
    pub at: Timestamp,
}

/// Production start time read from a run's log header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionStart {
    pub log_path: PathBuf,
    /// The stamp exactly as written in the log (`01/15/25 10:00:00`).
    pub raw: String,
    pub at: Timestamp,
}

pub struct ProvenanceClock<'a> {
    vcs: &'a dyn VersionControl,
    log_dir: PathBuf,
}

impl<'a> ProvenanceClock<'a> {
    pub fn new(vcs: &'a dyn VersionControl, log_dir: impl Into<PathBuf>) -> Self {
        ProvenanceClock {
            vcs,
            log_dir: log_dir.into(),
        }
    }

    /// Newest modification across the last commit's files plus `extra_paths`.
    pub fn latest_source_change(&self, extra_paths: &[PathBuf]) -> Result<SourceChange, StoreError> {
        let mut paths = self.vcs.changed_files(ChangeScope::LastCommit)?;
        for extra in extra_paths {
            if !paths.contains(extra) {
                paths.push(extra.clone());
            }
        }
        let latest = latest_modification(&paths)?;
        info!(file = %latest.path.display(), modified = %latest.at, "latest source change");
        Ok(latest)
    }

    /// Production start of the run that wrote `artifact_name`.
    pub fn production_start(&self, artifact_name: &str) -> Result<ProductionStart, StoreError> {
        let run = run_name(artifact_name)?;
        let log_path = self.log_dir.join(log_file_name(&run));
        let start = read_production_start(&log_path)?;
        info!(log = %log_path.display(), started = %start.at, "production start");
        Ok(start)
    }
}

/// Run name encoded in an artifact file name: the text after the first
/// underscore and before the first dot (`results_ssp2_bau.gdx` -> `ssp2_bau`).
pub fn run_name(artifact_name: &str) -> Result<String, StoreError> {
    let file_name = Path::new(artifact_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| artifact_name.to_string());

    let Some((_, after)) = file_name.split_once('_') else {
        return Err(StoreError::InvalidArtifactName {
            name: file_name,
            reason: "expected <prefix>_<run>.<ext>".to_string(),
        });
    };
    let run = after.split('.').next().unwrap_or_default();
    if run.is_empty() {
        return Err(StoreError::InvalidArtifactName {
            name: file_name,
            reason: "run name is empty".to_string(),
        });
    }
    Ok(run.to_string())
}

pub fn log_file_name(run_name: &str) -> String {
    format!("errors_{}.txt", run_name)
}

/// Parse the first line of a provenance log: `<token> <MM/DD/YY HH:MM:SS>`.
pub fn read_production_start(log_path: &Path) -> Result<ProductionStart, StoreError> {
    let file = match File::open(log_path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::ProvenanceLogMissing {
                path: log_path.to_path_buf(),
            });
        }
        Err(e) => return Err(StoreError::IoError(e)),
    };

    let malformed = |reason: &str| StoreError::ProvenanceLogMalformed {
        path: log_path.to_path_buf(),
        reason: reason.to_string(),
    };

    // Only the header is decoded; solver output below it may be any encoding.
    let mut first_line = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut first_line)?;
    let header = std::str::from_utf8(&first_line).map_err(|_| malformed("header is not UTF-8"))?;
    let header = header.trim();
    if header.is_empty() {
        return Err(malformed("empty header"));
    }
    let Some((_, raw)) = header.split_once(' ') else {
        return Err(malformed("header has no timestamp field"));
    };
    let raw = raw.trim();
    let at = Timestamp::parse_log_stamp(raw)
        .ok_or_else(|| malformed(&format!("'{}' is not MM/DD/YY HH:MM:SS", raw)))?;

    Ok(ProductionStart {
        log_path: log_path.to_path_buf(),
        raw: raw.to_string(),
        at,
    })
}

/// Newest modification time among `paths`; the first of equal maxima wins.
pub fn latest_modification(paths: &[PathBuf]) -> Result<SourceChange, StoreError> {
    let mut latest: Option<SourceChange> = None;
    for path in paths {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| StoreError::TimingUnavailable(format!("{}: {}", path.display(), e)))?;
        let at = Timestamp::from_system_time(modified);
        if latest.as_ref().is_none_or(|current| at > current.at) {
            latest = Some(SourceChange {
                path: path.clone(),
                at,
            });
        }
    }
    latest.ok_or_else(|| StoreError::TimingUnavailable("change set is empty".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path, secs: i64) {
        fs::write(path, b"x").unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(Timestamp::from_unix_secs(secs).to_system_time())
            .unwrap();
    }

    #[test]
    fn test_run_name_takes_text_between_first_underscore_and_first_dot() {
        assert_eq!(run_name("results_ssp2_bau.gdx").unwrap(), "ssp2_bau");
        assert_eq!(run_name("out/results_x.v2.gdx").unwrap(), "x");
        assert_eq!(run_name("results_noext").unwrap(), "noext");
    }

    #[test]
    fn test_run_name_requires_underscore() {
        assert!(matches!(
            run_name("results.gdx"),
            Err(StoreError::InvalidArtifactName { .. })
        ));
        assert!(matches!(
            run_name("results_.gdx"),
            Err(StoreError::InvalidArtifactName { .. })
        ));
    }

    #[test]
    fn test_log_file_name() {
        assert_eq!(log_file_name("ssp2_bau"), "errors_ssp2_bau.txt");
    }

    #[test]
    fn test_read_production_start_parses_header() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("errors_ssp2_bau.txt");
        fs::write(&log, "run 01/15/25 10:00:00\nsecond line\n").unwrap();

        let start = read_production_start(&log).unwrap();
        assert_eq!(start.raw, "01/15/25 10:00:00");
        assert_eq!(start.at, Timestamp::parse_log_stamp("01/15/25 10:00:00").unwrap());
    }

    #[test]
    fn test_read_production_start_ignores_non_utf8_body() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("errors_ssp2_bau.txt");
        fs::write(&log, b"run 01/15/25 10:00:00\nsolver: \xe9chec \xff\n").unwrap();

        let start = read_production_start(&log).unwrap();
        assert_eq!(start.raw, "01/15/25 10:00:00");
    }

    #[test]
    fn test_read_production_start_missing_log() {
        let dir = tempdir().unwrap();
        let err = read_production_start(&dir.path().join("errors_x.txt")).unwrap_err();
        assert!(matches!(err, StoreError::ProvenanceLogMissing { .. }));
    }

    #[test]
    fn test_read_production_start_malformed_headers() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("errors_x.txt");
        for header in [
            &b""[..],
            &b"\n"[..],
            &b"run"[..],
            &b"run yesterday"[..],
            &b"run 2025-01-15 10:00:00"[..],
            &b"run \xe9 01/15/25 10:00:00\n"[..],
        ] {
            fs::write(&log, header).unwrap();
            let err = read_production_start(&log).unwrap_err();
            assert!(
                matches!(err, StoreError::ProvenanceLogMalformed { .. }),
                "header {:?} gave {:?}",
                header,
                err
            );
        }
    }

    #[test]
    fn test_latest_modification_picks_newest() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.gms");
        let b = dir.path().join("b.gms");
        touch(&a, 1_000);
        touch(&b, 2_000);

        let latest = latest_modification(&[a, b.clone()]).unwrap();
        assert_eq!(latest.path, b);
        assert_eq!(latest.at.as_unix_secs(), 2_000);
    }

    #[test]
    fn test_latest_modification_tie_keeps_first() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.gms");
        let b = dir.path().join("b.gms");
        touch(&a, 5_000);
        touch(&b, 5_000);

        let latest = latest_modification(&[a.clone(), b]).unwrap();
        assert_eq!(latest.path, a);
    }

    #[test]
    fn test_latest_modification_fails_on_missing_or_empty() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            latest_modification(&[]),
            Err(StoreError::TimingUnavailable(_))
        ));
        assert!(matches!(
            latest_modification(&[dir.path().join("deleted.gms")]),
            Err(StoreError::TimingUnavailable(_))
        ));
    }
}

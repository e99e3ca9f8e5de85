//! The storage protocol.
//!
//! One artifact at a time: resolve the commit, refuse duplicates, classify
//! reproducibility, inspect uncommitted changes, check timing, then copy.
//! The first failing stage ends that artifact's run. Side effects of earlier
//! stages (a created commit folder, a registered recipe) stay in place.

use crate::core::build_targets::BuildSystem;
use crate::core::clock::{ProductionStart, ProvenanceClock, SourceChange};
use crate::core::error::StoreError;
use crate::core::temporal::{self, TimingPolicy};
use crate::core::time::{Timestamp, file_stamp};
use crate::core::vcs::{ChangeScope, CommitHash, VersionControl};
use crate::plugins::archive::{ArchiveStore, PatchCapture, StoredArtifact};
use crate::plugins::classify::{Classifier, Reproducibility};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What to do when tracked files differ from the checked-out commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UncommittedPolicy {
    /// Refuse to store anything from a dirty tree.
    #[default]
    Reject,
    /// Store a timestamp-suffixed copy together with the diff.
    CapturePatch,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StorePolicy {
    pub timing: TimingPolicy,
    pub uncommitted: UncommittedPolicy,
}

#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Artifact path, relative to the working directory or absolute.
    pub artifact: PathBuf,
    pub recipe: Option<PathBuf>,
}

impl StoreRequest {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        StoreRequest {
            artifact: artifact.into(),
            recipe: None,
        }
    }

    pub fn with_recipe(mut self, recipe: Option<PathBuf>) -> Self {
        self.recipe = recipe;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub artifact: String,
    /// Short hash of HEAD at storage time.
    pub commit: CommitHash,
    pub folder: CommitHash,
    pub reproducibility: Reproducibility,
    pub uncommitted_files: Vec<PathBuf>,
    pub latest_change: Option<SourceChange>,
    pub production_start: Option<ProductionStart>,
    pub stored: StoredArtifact,
}

#[derive(Debug)]
pub struct ArtifactReport {
    pub artifact: PathBuf,
    pub result: Result<StoreOutcome, StoreError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub reports: Vec<ArtifactReport>,
}

impl BatchReport {
    pub fn stored(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.stored()
    }

    pub fn all_stored(&self) -> bool {
        self.failed() == 0
    }
}

pub struct StorePipeline<'a> {
    vcs: &'a dyn VersionControl,
    build: &'a dyn BuildSystem,
    archive: &'a ArchiveStore,
    work_dir: PathBuf,
    log_dir: PathBuf,
    policy: StorePolicy,
}

impl<'a> StorePipeline<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        build: &'a dyn BuildSystem,
        archive: &'a ArchiveStore,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        let work_dir = work_dir.into();
        StorePipeline {
            vcs,
            build,
            archive,
            log_dir: work_dir.clone(),
            work_dir,
            policy: StorePolicy::default(),
        }
    }

    /// Directory holding the `errors_<run>.txt` logs; relative paths resolve
    /// against the working directory.
    pub fn with_log_dir(mut self, log_dir: impl AsRef<Path>) -> Self {
        self.log_dir = self.work_dir.join(log_dir);
        self
    }

    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run every request in order. A failure does not stop later requests.
    pub fn store_all(&self, requests: &[StoreRequest]) -> BatchReport {
        let mut batch = BatchReport::default();
        for request in requests {
            let result = self.store_one(request);
            if let Err(err) = &result {
                warn!(artifact = %request.artifact.display(), code = err.code(), "storage refused");
            }
            batch.reports.push(ArtifactReport {
                artifact: request.artifact.clone(),
                result,
            });
        }
        batch
    }

    pub fn store_one(&self, request: &StoreRequest) -> Result<StoreOutcome, StoreError> {
        let source = self.work_dir.join(&request.artifact);
        let artifact = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::InvalidArtifactName {
                name: request.artifact.display().to_string(),
                reason: "no file name".to_string(),
            })?;

        let commit = self.vcs.commit_identity()?;
        let folder = self.vcs.commit_folder_name("HEAD")?;
        info!(artifact = %artifact, commit = %commit, folder = %folder, "storing");
        self.archive.ensure_commit_folder(&folder)?;

        if self.archive.already_stored(&folder, &artifact) {
            return Err(StoreError::DuplicateArtifact {
                artifact,
                commit: folder.to_string(),
            });
        }

        let reproducibility = Classifier::new(self.build, self.archive)
            .relative_to(&self.work_dir)
            .require_reproducible(&folder, &artifact, request.recipe.as_deref())?;

        let uncommitted_files = self.vcs.changed_files(ChangeScope::Uncommitted)?;
        if !uncommitted_files.is_empty() && self.policy.uncommitted == UncommittedPolicy::Reject {
            return Err(StoreError::UncommittedChanges {
                files: uncommitted_files
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            });
        }
        let capture_patch = !uncommitted_files.is_empty();

        let clock = ProvenanceClock::new(self.vcs, &self.log_dir);
        let (latest_change, production_start) = match self.policy.timing {
            TimingPolicy::Enforce => {
                let latest = clock.latest_source_change(&uncommitted_files)?;
                let start = clock.production_start(&artifact)?;
                temporal::validate_readings(&start, &latest)?;
                info!("execution time is after the latest change");
                (Some(latest), Some(start))
            }
            TimingPolicy::Skip => {
                // The start time is still wanted to name a patched copy; it
                // is not validated, and an unreadable log is not an error.
                let start = if capture_patch {
                    clock.production_start(&artifact).ok()
                } else {
                    None
                };
                (None, start)
            }
        };

        let patch = capture_patch.then(|| PatchCapture {
            file_stamp: match &production_start {
                Some(start) => file_stamp(&start.raw),
                None => file_stamp(&now_log_stamp()),
            },
            vcs: self.vcs,
        });

        let stored = self.archive.store(&folder, &source, patch)?;

        Ok(StoreOutcome {
            artifact,
            commit,
            folder,
            reproducibility,
            uncommitted_files,
            latest_change,
            production_start,
            stored,
        })
    }
}

fn now_log_stamp() -> String {
    Timestamp::from_system_time(std::time::SystemTime::now()).to_log_stamp()
}

//! Commit-scoped archive of result files.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<hash8>/<artifact>
//! <root>/<hash8>/<stem>_<stamp>.<ext>     artifact produced with uncommitted changes
//! <root>/<hash8>/<stem>_<stamp>.patch     the changes themselves
//! <root>/<hash8>/recipes/<script>
//! <root>/<hash8>/recipes.txt              "artifact: recipe" ledger
//! ```
//!
//! Addressing is by commit, never by content. The digest reported for a
//! stored file is informational.

use crate::core::error::StoreError;
use crate::core::vcs::{CommitHash, VersionControl};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RECIPES_DIR: &str = "recipes";
pub const RECIPE_LEDGER: &str = "recipes.txt";
const RECIPE_LEDGER_HEADER: &str =
    "# Scripts and makefiles for stored results that are not build targets\n\n";

#[derive(Debug, Clone, Serialize)]
pub struct StoredArtifact {
    pub artifact: String,
    pub commit: CommitHash,
    pub path: PathBuf,
    pub patch: Option<PathBuf>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeRecord {
    pub artifact: String,
    /// The recipe path as the operator supplied it.
    pub recipe: PathBuf,
    pub copied_to: PathBuf,
    pub ledger: PathBuf,
}

/// Uncommitted work to capture next to a stored artifact.
pub struct PatchCapture<'a> {
    /// Filesystem-safe production timestamp shared by artifact and patch.
    pub file_stamp: String,
    pub vcs: &'a dyn VersionControl,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArchiveStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn commit_folder(&self, commit: &CommitHash) -> PathBuf {
        self.root.join(commit.as_str())
    }

    /// Create the commit folder if it does not exist yet.
    pub fn ensure_commit_folder(&self, commit: &CommitHash) -> Result<PathBuf, StoreError> {
        let folder = self.commit_folder(commit);
        fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    /// Whether `artifact_name` already sits in the commit folder under its plain name.
    pub fn already_stored(&self, commit: &CommitHash, artifact_name: &str) -> bool {
        self.commit_folder(commit).join(artifact_name).is_file()
    }

    /// Copy a recipe into the commit's `recipes/` directory and append a ledger line.
    ///
    /// Registering the same recipe twice copies it again and appends a second
    /// identical ledger line.
    /// `recorded_as` is the path written to the ledger, usually the one the
    /// operator typed; `recipe` is where the file is read from.
    pub fn register_recipe(
        &self,
        commit: &CommitHash,
        artifact_name: &str,
        recipe: &Path,
        recorded_as: &Path,
    ) -> Result<RecipeRecord, StoreError> {
        let folder = self.ensure_commit_folder(commit)?;
        let recipe_dir = folder.join(RECIPES_DIR);
        fs::create_dir_all(&recipe_dir)?;

        let file_name = recipe.file_name().ok_or_else(|| {
            StoreError::NotFound(format!("recipe {} has no file name", recipe.display()))
        })?;
        let copied_to = recipe_dir.join(file_name);
        copy_preserving_metadata(recipe, &copied_to)?;

        let ledger = folder.join(RECIPE_LEDGER);
        let mut file = OpenOptions::new().create(true).append(true).open(&ledger)?;
        if file.metadata()?.len() == 0 {
            file.write_all(RECIPE_LEDGER_HEADER.as_bytes())?;
        }
        writeln!(file, "{}: {}", artifact_name, recorded_as.display())?;

        info!(artifact = artifact_name, recipe = %recorded_as.display(), "recipe registered");
        Ok(RecipeRecord {
            artifact: artifact_name.to_string(),
            recipe: recorded_as.to_path_buf(),
            copied_to,
            ledger,
        })
    }

    /// Copy `source` into the commit folder.
    ///
    /// With a patch capture, the artifact gets a timestamp suffix and the
    /// uncommitted diff is written next to it under the same stem.
    pub fn store(
        &self,
        commit: &CommitHash,
        source: &Path,
        patch: Option<PatchCapture<'_>>,
    ) -> Result<StoredArtifact, StoreError> {
        if !source.is_file() {
            return Err(StoreError::SourceMissing {
                path: source.to_path_buf(),
            });
        }
        let artifact = artifact_name(source)?;
        let folder = self.ensure_commit_folder(commit)?;

        let (dest, patch_path) = match &patch {
            Some(capture) => {
                let dest = folder.join(suffixed_name(&artifact, &capture.file_stamp, None));
                let patch_path =
                    folder.join(suffixed_name(&artifact, &capture.file_stamp, Some("patch")));
                (dest, Some(patch_path))
            }
            None => (folder.join(&artifact), None),
        };

        if dest.exists() {
            return Err(StoreError::DuplicateArtifact {
                artifact: dest
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or(artifact),
                commit: commit.to_string(),
            });
        }

        if let (Some(capture), Some(patch_path)) = (&patch, &patch_path) {
            capture.vcs.capture_patch(patch_path)?;
            info!(patch = %patch_path.display(), "patch saved");
        }

        copy_preserving_metadata(source, &dest)?;
        let sha256 = file_sha256(&dest)?;
        info!(dest = %dest.display(), "file stored");

        Ok(StoredArtifact {
            artifact,
            commit: commit.clone(),
            path: dest,
            patch: patch_path,
            sha256,
        })
    }

    /// Artifact, patch and recipe-derived names in a commit folder, excluding
    /// the recipe container and its ledger. A missing folder yields nothing.
    pub fn stored_entries(&self, commit: &CommitHash) -> Result<BTreeSet<String>, StoreError> {
        let folder = self.commit_folder(commit);
        let entries = match fs::read_dir(&folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(StoreError::IoError(e)),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().to_string();
            if name == RECIPES_DIR || name == RECIPE_LEDGER {
                continue;
            }
            names.insert(name);
        }
        Ok(names)
    }
}

fn artifact_name(source: &Path) -> Result<String, StoreError> {
    source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| StoreError::SourceMissing {
            path: source.to_path_buf(),
        })
}

/// `<stem>_<stamp>.<ext>`, splitting the artifact name at its first dot.
/// `extension` replaces the original one when given.
pub fn suffixed_name(artifact: &str, file_stamp: &str, extension: Option<&str>) -> String {
    let (stem, original_ext) = match artifact.split_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (artifact, None),
    };
    match extension.or(original_ext) {
        Some(ext) => format!("{}_{}.{}", stem, file_stamp, ext),
        None => format!("{}_{}", stem, file_stamp),
    }
}

/// Copy content and permission bits, then carry over access and modification times.
fn copy_preserving_metadata(source: &Path, dest: &Path) -> Result<(), StoreError> {
    fs::copy(source, dest)?;
    let meta = fs::metadata(source)?;
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);
    // Read-only handle: the copy may carry read-only permission bits.
    File::open(dest)?.set_times(times)?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String, StoreError> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_suffixed_name_splits_at_first_dot() {
        assert_eq!(
            suffixed_name("results_ssp2_bau.gdx", "011525_100000", None),
            "results_ssp2_bau_011525_100000.gdx"
        );
        assert_eq!(
            suffixed_name("results_ssp2_bau.gdx", "011525_100000", Some("patch")),
            "results_ssp2_bau_011525_100000.patch"
        );
        assert_eq!(suffixed_name("results", "s", None), "results_s");
    }

    #[test]
    fn test_store_round_trip_preserves_content_and_mtime() {
        let work = tempdir().unwrap();
        let root = tempdir().unwrap();
        let source = work.path().join("results_ssp2_bau.gdx");
        fs::write(&source, b"\x00gdx payload\xff").unwrap();
        let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let store = ArchiveStore::new(root.path());
        let commit = CommitHash::new("abcdef12");
        let stored = store.store(&commit, &source, None).unwrap();

        assert_eq!(stored.path, root.path().join("abcdef12/results_ssp2_bau.gdx"));
        assert_eq!(fs::read(&stored.path).unwrap(), fs::read(&source).unwrap());
        assert_eq!(fs::metadata(&stored.path).unwrap().modified().unwrap(), mtime);
        assert_eq!(stored.sha256.len(), 64);
        assert!(store.already_stored(&commit, "results_ssp2_bau.gdx"));
    }

    #[test]
    fn test_store_refuses_missing_source() {
        let root = tempdir().unwrap();
        let store = ArchiveStore::new(root.path());
        let err = store
            .store(&CommitHash::new("abcdef12"), &root.path().join("nope.gdx"), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::SourceMissing { .. }));
    }

    #[test]
    fn test_store_refuses_to_overwrite() {
        let work = tempdir().unwrap();
        let root = tempdir().unwrap();
        let source = work.path().join("results_a.gdx");
        fs::write(&source, b"first").unwrap();

        let store = ArchiveStore::new(root.path());
        let commit = CommitHash::new("abcdef12");
        store.store(&commit, &source, None).unwrap();

        fs::write(&source, b"second").unwrap();
        let err = store.store(&commit, &source, None).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateArtifact { .. }));
        assert_eq!(
            fs::read(root.path().join("abcdef12/results_a.gdx")).unwrap(),
            b"first"
        );
    }

    #[test]
    fn test_register_recipe_writes_header_once_and_duplicates_lines() {
        let work = tempdir().unwrap();
        let root = tempdir().unwrap();
        let recipe = work.path().join("run.sh");
        fs::write(&recipe, "#!/bin/sh\ngams main.gms\n").unwrap();

        let store = ArchiveStore::new(root.path());
        let commit = CommitHash::new("abcdef12");
        let first = store.register_recipe(&commit, "results_x.gdx", &recipe, &recipe).unwrap();
        store.register_recipe(&commit, "results_x.gdx", &recipe, &recipe).unwrap();

        assert_eq!(first.copied_to, root.path().join("abcdef12/recipes/run.sh"));
        assert!(first.copied_to.is_file());

        let ledger = fs::read_to_string(&first.ledger).unwrap();
        assert!(ledger.starts_with('#'));
        assert_eq!(ledger.matches('#').count(), 1);
        let line = format!("results_x.gdx: {}", recipe.display());
        assert_eq!(ledger.lines().filter(|l| *l == line).count(), 2);
    }

    #[test]
    fn test_stored_entries_excludes_recipe_bookkeeping() {
        let work = tempdir().unwrap();
        let root = tempdir().unwrap();
        let recipe = work.path().join("run.sh");
        let source = work.path().join("results_x.gdx");
        fs::write(&recipe, "echo").unwrap();
        fs::write(&source, "gdx").unwrap();

        let store = ArchiveStore::new(root.path());
        let commit = CommitHash::new("abcdef12");
        assert!(store.stored_entries(&commit).unwrap().is_empty());

        store.register_recipe(&commit, "results_x.gdx", &recipe, &recipe).unwrap();
        store.store(&commit, &source, None).unwrap();

        let names: Vec<_> = store.stored_entries(&commit).unwrap().into_iter().collect();
        assert_eq!(names, vec!["results_x.gdx".to_string()]);
    }
}

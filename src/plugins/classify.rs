//! Reproducibility gate.
//!
//! An artifact may be archived only if the build system declares it, or if
//! the operator hands over the recipe that produced it.

use crate::core::build_targets::BuildSystem;
use crate::core::error::StoreError;
use crate::core::vcs::CommitHash;
use crate::plugins::archive::{ArchiveStore, RecipeRecord};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reproducibility {
    /// Declared by the build system.
    Buildable,
    /// Not a build target, but a recipe was registered for it.
    RecipeProvided { record: RecipeRecord },
    Unclassified,
}

impl Reproducibility {
    pub fn is_reproducible(&self) -> bool {
        !matches!(self, Reproducibility::Unclassified)
    }
}

impl fmt::Display for Reproducibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reproducibility::Buildable => write!(f, "buildable"),
            Reproducibility::RecipeProvided { .. } => write!(f, "recipe provided"),
            Reproducibility::Unclassified => write!(f, "unclassified"),
        }
    }
}

pub struct Classifier<'a> {
    build: &'a dyn BuildSystem,
    archive: &'a ArchiveStore,
    base_dir: Option<PathBuf>,
}

impl<'a> Classifier<'a> {
    pub fn new(build: &'a dyn BuildSystem, archive: &'a ArchiveStore) -> Self {
        Classifier {
            build,
            archive,
            base_dir: None,
        }
    }

    /// Resolve relative recipe paths against `dir`. The ledger keeps the
    /// path as given.
    pub fn relative_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Classify `artifact_name`, registering `recipe` under `commit` when the
    /// build system does not declare the artifact and the recipe file exists.
    pub fn classify(
        &self,
        commit: &CommitHash,
        artifact_name: &str,
        recipe: Option<&Path>,
    ) -> Result<Reproducibility, StoreError> {
        let extension = artifact_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        let targets = if extension.is_empty() {
            Default::default()
        } else {
            self.build.declared_targets(extension)?
        };

        if targets.contains(artifact_name) {
            info!(artifact = artifact_name, "reproducible through the build system");
            return Ok(Reproducibility::Buildable);
        }

        let Some(recipe) = recipe else {
            return Ok(Reproducibility::Unclassified);
        };
        let resolved = match &self.base_dir {
            Some(base) => base.join(recipe),
            None => recipe.to_path_buf(),
        };
        if !resolved.is_file() {
            return Ok(Reproducibility::Unclassified);
        }
        let record = self
            .archive
            .register_recipe(commit, artifact_name, &resolved, recipe)?;
        Ok(Reproducibility::RecipeProvided { record })
    }

    /// [`Classifier::classify`], rejecting anything that is not reproducible.
    pub fn require_reproducible(
        &self,
        commit: &CommitHash,
        artifact_name: &str,
        recipe: Option<&Path>,
    ) -> Result<Reproducibility, StoreError> {
        let verdict = self.classify(commit, artifact_name, recipe)?;
        if verdict.is_reproducible() {
            return Ok(verdict);
        }
        Err(match recipe {
            Some(recipe) => StoreError::RecipeMissing {
                artifact: artifact_name.to_string(),
                recipe: recipe.to_path_buf(),
            },
            None => StoreError::NotReproducible {
                artifact: artifact_name.to_string(),
            },
        })
    }
}

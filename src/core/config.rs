//! `gdxstore.toml` loading.
//!
//! Every key is optional. Command-line flags take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "gdxstore.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage: StorageConfig,
    pub build: BuildConfig,
    pub provenance: ProvenanceConfig,
    pub history: HistoryConfig,
    pub diff: DiffConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Storage root; commit folders are created beneath it.
    pub folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Argv of the dry-run database dump.
    pub command: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            command: vec!["make".to_string(), "-qp".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProvenanceConfig {
    pub log_dir: PathBuf,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        ProvenanceConfig {
            log_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub since: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    pub program: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        DiffConfig {
            program: crate::plugins::diff::DEFAULT_DIFF_PROGRAM.to_string(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Config> {
        toml::from_str(content).context("invalid configuration")
    }

    /// Load `explicit`, or `gdxstore.toml` in `work_dir` when present.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>, work_dir: &Path) -> Result<Config> {
        let path = match explicit {
            Some(path) => work_dir.join(path),
            None => {
                let default = work_dir.join(CONFIG_FILE_NAME);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Config::parse(&content).with_context(|| format!("in {}", path.display()))
    }
}

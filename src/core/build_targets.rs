//! Declared-target queries against the build system.
//!
//! The default query dumps make's rule database without building anything
//! (`make -qp`) and picks out the file names of a given extension that the
//! rules declare, either as targets or as prerequisites.

use crate::core::error::StoreError;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

pub trait BuildSystem {
    /// File names ending in `.<extension>` that the build system declares.
    fn declared_targets(&self, extension: &str) -> Result<BTreeSet<String>, StoreError>;
}

/// Dry-run database query through an external command (make by default).
#[derive(Debug, Clone)]
pub struct MakeDatabase {
    argv: Vec<String>,
    dir: PathBuf,
}

impl MakeDatabase {
    pub fn new(argv: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        MakeDatabase {
            argv,
            dir: dir.into(),
        }
    }
}

impl BuildSystem for MakeDatabase {
    fn declared_targets(&self, extension: &str) -> Result<BTreeSet<String>, StoreError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(StoreError::NotFound(
                "build query command is empty".to_string(),
            ));
        };
        debug!(program = %program, args = ?args, "querying build targets");

        // `make -q` exits non-zero whenever something is out of date, so the
        // status carries no meaning here. Only the database dump matters.
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.dir)
            .output()?;

        Ok(parse_database(
            &String::from_utf8_lossy(&output.stdout),
            extension,
        ))
    }
}

/// Extract declared file names with `extension` from a make database dump.
///
/// A rule line qualifies when it starts with an alphanumeric target name
/// free of variable, comment and directory markers, and mentions a
/// `.<extension>` file that is not followed by `=`. Variable assignments
/// (`:=`, `::=`) are skipped. Names are taken from both sides of the colon.
pub fn parse_database(dump: &str, extension: &str) -> BTreeSet<String> {
    let suffix = format!(".{}", extension);
    let (Ok(rule_head), Ok(mention)) = (
        Regex::new(r"^[a-zA-Z0-9][^$#/\t=:]*:"),
        Regex::new(&format!(r"{}([^=]|$)", regex::escape(&suffix))),
    ) else {
        return BTreeSet::new();
    };

    let mut found = BTreeSet::new();
    for line in dump
        .lines()
        .filter(|line| rule_head.is_match(line) && mention.is_match(line))
    {
        let Some((targets, rest)) = line.split_once(':') else {
            continue;
        };
        if rest.starts_with('=') || rest.starts_with(":=") {
            continue;
        }
        let prerequisites = rest.trim_start_matches(':').split(':').next().unwrap_or("");
        for name in targets
            .split_whitespace()
            .chain(prerequisites.split_whitespace())
        {
            if name.ends_with(&suffix) && name.len() > suffix.len() {
                found.insert(name.to_string());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
# GNU Make 4.3
# Variables

RESULTS := results_ssp2_bau.gdx
MAKEFLAGS = qp
# Files

all: results_ssp2_bau.gdx results_ssp2_curpol.gdx
#  Phony target (prerequisite of .PHONY).

results_ssp2_bau.gdx: main.gms data_ssp2/ssp.gdx
\tgams main.gms --n=ssp2 --policy=bau

.PHONY: all clean
clean:
\trm -f *.gdx
";

    #[test]
    fn test_parse_database_collects_targets_and_prerequisites() {
        let found = parse_database(DUMP, "gdx");
        assert!(found.contains("results_ssp2_bau.gdx"));
        assert!(found.contains("results_ssp2_curpol.gdx"));
        assert!(!found.contains("main.gms"));
    }

    #[test]
    fn test_parse_database_skips_assignments_recipes_and_comments() {
        let dump = "RESULTS := other.gdx\n\tcp a.gdx b.gdx\n# x: commented.gdx\n";
        assert!(parse_database(dump, "gdx").is_empty());
    }

    #[test]
    fn test_parse_database_respects_extension() {
        let found = parse_database("report: summary.csv results_x.gdx\n", "csv");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["summary.csv"]);
    }

    #[test]
    fn test_parse_database_handles_double_colon_rules() {
        let found = parse_database("results_a.gdx:: model.gms\n", "gdx");
        assert!(found.contains("results_a.gdx"));
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let query = MakeDatabase::new(Vec::new(), ".");
        assert!(matches!(
            query.declared_targets("gdx"),
            Err(StoreError::NotFound(_))
        ));
    }
}

//! Timing gate: an artifact must not predate the source it claims to come from.

use crate::core::clock::{ProductionStart, SourceChange};
use crate::core::error::StoreError;
use crate::core::time::Timestamp;

/// Whether the timing gate runs for a storage request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingPolicy {
    #[default]
    Enforce,
    /// Operator override: storage proceeds without comparing timestamps.
    Skip,
}

/// Fails when production started strictly before the latest source change.
/// Equal timestamps pass.
pub fn validate(production_start: Timestamp, latest_change: Timestamp) -> Result<(), StoreError> {
    if production_start < latest_change {
        return Err(StoreError::StaleProvenance {
            production_start,
            latest_change,
            latest_file: Default::default(),
        });
    }
    Ok(())
}

/// [`validate`] over clock readings, naming the offending file on failure.
pub fn validate_readings(start: &ProductionStart, latest: &SourceChange) -> Result<(), StoreError> {
    validate(start.at, latest.at).map_err(|err| match err {
        StoreError::StaleProvenance {
            production_start,
            latest_change,
            ..
        } => StoreError::StaleProvenance {
            production_start,
            latest_change,
            latest_file: latest.path.clone(),
        },
        other => other,
    })
}

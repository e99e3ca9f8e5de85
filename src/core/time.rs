//! Timestamp helpers shared by the provenance clock, storage naming and
//! command envelopes.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// Format of the timestamp field in a provenance log header (`01/15/25 10:00:00`).
pub const LOG_STAMP_FORMAT: &str = "%m/%d/%y %H:%M:%S";

/// Whole seconds since the unix epoch.
///
/// File modification times are truncated to seconds before comparison, so a
/// file touched within the same second a run started does not count as newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_unix_secs(secs: i64) -> Self {
        Timestamp(secs)
    }

    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp(d.as_secs() as i64),
            Err(e) => {
                let before = e.duration();
                let secs = before.as_secs() as i64;
                // Round toward negative infinity like a floored stat mtime.
                if before.subsec_nanos() > 0 {
                    Timestamp(-secs - 1)
                } else {
                    Timestamp(-secs)
                }
            }
        }
    }

    /// Parse a `MM/DD/YY HH:MM:SS` stamp in the local time zone.
    ///
    /// Returns `None` when the text does not match, or when the wall-clock
    /// time does not exist locally (DST gap).
    pub fn parse_log_stamp(raw: &str) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(raw.trim(), LOG_STAMP_FORMAT).ok()?;
        let local = Local.from_local_datetime(&naive).earliest()?;
        Some(Timestamp(local.timestamp()))
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + std::time::Duration::from_secs(self.0 as u64)
        } else {
            UNIX_EPOCH - std::time::Duration::from_secs(self.0.unsigned_abs())
        }
    }

    pub fn to_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.0, 0).single()
    }

    /// Render in the provenance log format, local time.
    pub fn to_log_stamp(&self) -> String {
        match self.to_local() {
            Some(dt) => dt.format(LOG_STAMP_FORMAT).to_string(),
            None => self.0.to_string(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_local() {
            Some(dt) => write!(f, "{}", dt.format("%a %b %e %H:%M:%S %Y")),
            None => write!(f, "@{}", self.0),
        }
    }
}

/// Filesystem-safe form of a raw log stamp: spaces become `_`, `:` and `/`
/// are dropped (`01/15/25 10:00:00` -> `011525_100000`).
pub fn file_stamp(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            ':' | '/' => None,
            other => Some(other),
        })
        .collect()
}

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used for `--format json`.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}

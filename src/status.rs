//! Expiry status record and the renewal gate built on it.
//!
//! The status file is a single JSON object, `{"expired-date": "<timestamp>"}`.
//! It is the only thing consulted to decide whether a run should renew.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fs_utils::write_atomic;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("failed to write status file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize status record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted expiry of the certificate deployed by the last successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryRecord {
    #[serde(rename = "expired-date", serialize_with = "serialize_rfc3339")]
    pub expired_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "expired-date")]
    expired_date: Option<String>,
}

/// What was found at the status path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusState {
    Present(ExpiryRecord),
    Missing,
    Corrupt(String),
}

/// Read the status file. Never fails: problems are reported as [`StatusState::Corrupt`].
#[must_use]
pub fn load(path: &Path) -> StatusState {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StatusState::Missing,
        Err(e) => return StatusState::Corrupt(format!("unreadable: {e}")),
    };

    let raw: RawRecord = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => return StatusState::Corrupt(format!("invalid JSON: {e}")),
    };

    match raw.expired_date.as_deref().map(str::trim) {
        None | Some("") => StatusState::Corrupt("expired-date not found".to_string()),
        Some(value) => parse_timestamp(value).map_or_else(
            || StatusState::Corrupt(format!("unparsable expired-date '{value}'")),
            |expired_date| StatusState::Present(ExpiryRecord { expired_date }),
        ),
    }
}

/// Write the status file atomically.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized or the file cannot be replaced.
pub fn save(path: &Path, record: &ExpiryRecord) -> Result<(), StatusError> {
    let mut body = serde_json::to_string_pretty(record)?;
    body.push('\n');
    write_atomic(path, body.as_bytes()).map_err(|source| StatusError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), expires_at = %record.expired_date, "Saved status record");
    Ok(())
}

/// Parse an expiry timestamp and normalize it to UTC.
///
/// Accepts RFC 3339, the space-separated ISO form with an offset, and naive
/// date-times or dates, which are taken to be UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn serialize_rfc3339<S: serde::Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

/// Core contract of the gate: renewal is due once `now` reaches `expiry`.
#[must_use]
pub fn renewal_due(now: DateTime<Utc>, expiry: DateTime<Utc>) -> bool {
    now >= expiry
}

/// Why a run is going ahead with renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueReason {
    Expired { expires_at: DateTime<Utc> },
    NoRecord,
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Due(DueReason),
    NotDue { expires_at: DateTime<Utc> },
}

impl GateDecision {
    #[must_use]
    pub fn is_due(&self) -> bool {
        matches!(self, Self::Due(_))
    }
}

/// Decides whether this run renews, based on the status record.
#[derive(Debug, Clone, Copy)]
pub struct RenewalGate {
    renew_before: chrono::Duration,
}

impl RenewalGate {
    /// `renew_before` moves the threshold earlier than the recorded expiry.
    #[must_use]
    pub fn new(renew_before: chrono::Duration) -> Self {
        Self { renew_before }
    }

    #[must_use]
    pub fn evaluate(&self, now: DateTime<Utc>, state: &StatusState) -> GateDecision {
        match state {
            StatusState::Present(record) => {
                // A margin reaching past the representable range means "always due".
                let due = match record.expired_date.checked_sub_signed(self.renew_before) {
                    Some(threshold) => renewal_due(now, threshold),
                    None => true,
                };
                if due {
                    GateDecision::Due(DueReason::Expired {
                        expires_at: record.expired_date,
                    })
                } else {
                    GateDecision::NotDue {
                        expires_at: record.expired_date,
                    }
                }
            }
            StatusState::Missing => GateDecision::Due(DueReason::NoRecord),
            StatusState::Corrupt(reason) => GateDecision::Due(DueReason::Corrupt(reason.clone())),
        }
    }
}

impl Default for RenewalGate {
    fn default() -> Self {
        Self::new(chrono::Duration::zero())
    }
}

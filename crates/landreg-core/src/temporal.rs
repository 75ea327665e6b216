//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp type truncated to seconds
//! precision, and `ValidityWindow`, the drafting window an agreement
//! transition must fall inside.
//!
//! ## Security Invariant
//!
//! Timestamps must be UTC with Z suffix. Local timezone offsets would make
//! the same instant render differently between participants, so non-UTC
//! inputs are **rejected at parse time** — there is no silent conversion.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, rejecting non-UTC offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// **Rejects non-UTC inputs.** Only the `Z` suffix is accepted;
    /// explicit offsets like `+00:00` or `+05:30` are rejected even when
    /// semantically equivalent to UTC.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTimestamp` if the string is not valid
    /// RFC 3339 or uses a non-Z offset.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::InvalidTimestamp {
                value: s.to_string(),
                reason: "timestamp must use Z suffix (UTC only)".to_string(),
            });
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| CoreError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Render as RFC 3339 / ISO 8601 with Z suffix and seconds precision.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Access the inner UTC datetime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a datetime to whole seconds.
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// The instant pair an agreement-drafting transition must fall inside.
///
/// The window's start doubles as "now" for the drafting-date checks:
/// `from <= creation_date <= completion_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Earliest instant the transition is valid.
    pub from: Timestamp,
    /// Latest instant the transition is valid.
    pub until: Timestamp,
}

impl ValidityWindow {
    /// Build a window, rejecting `until < from`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvertedWindow` if the end precedes the start.
    pub fn new(from: Timestamp, until: Timestamp) -> Result<Self, CoreError> {
        if until < from {
            return Err(CoreError::InvertedWindow {
                from: from.to_string(),
                until: until.to_string(),
            });
        }
        Ok(Self { from, until })
    }

    /// Whether the given instant lies within the window (inclusive).
    pub fn contains(&self, t: &Timestamp) -> bool {
        self.from <= *t && *t <= self.until
    }
}

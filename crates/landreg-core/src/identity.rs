//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers in the conveyancing record set.
//! These prevent accidental identifier confusion — you cannot pass a
//! `RecordId` where a `TitleNumber` is expected.
//!
//! ## Security Invariant
//!
//! Type-level distinction between identifier namespaces prevents
//! cross-namespace confusion where a record-version identifier is
//! substituted for a land title number or vice versa.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Stable identity shared by every version of one record.
///
/// A transition that "updates" a record consumes the old version and
/// produces a new version carrying the same `RecordId`. The id never
/// changes across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a new random record identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "record:{}", self.0)
    }
}

/// A registered land title number, e.g. `ZQV888860`.
///
/// Validated on construction: non-empty, ASCII alphanumeric, stored
/// uppercased. The byte rendering of the title number is the canonical
/// payload for every detached signature in the record set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitleNumber(String);

impl TitleNumber {
    /// Parse and normalize a title number.
    ///
    /// # Errors
    ///
    /// Rejects empty input and any character outside `[A-Za-z0-9]`.
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidTitleNumber {
                value: raw.to_string(),
                reason: "title number must not be empty".to_string(),
            });
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidTitleNumber {
                value: raw.to_string(),
                reason: "title number must be ASCII alphanumeric".to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The normalized title number string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The canonical signing payload: the UTF-8 bytes of the normalized
    /// title number.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for TitleNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TitleNumber> for String {
    fn from(value: TitleNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for TitleNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//! # Violation Accumulation
//!
//! A validator run collects every broken rule into a [`Violations`] list
//! and fails only at the end. Reasons are human-readable strings prefixed
//! by their rule category (`cardinality:`, `authorization:`, `invariant:`,
//! `diff:`, `signature:`, `bundle:`), so a rejected transition reports the
//! full set of defects in one pass.

use thiserror::Error;

/// An accumulating list of validation violations.
///
/// Empty lists mean success; [`Violations::into_result`] converts to the
/// `Result` shape validators return. Implements `std::error::Error` with
/// a semicolon-joined `Display` of every reason.
#[derive(Debug, Default, Error)]
#[error("{} violation(s): {}", .reasons.len(), .reasons.join("; "))]
pub struct Violations {
    reasons: Vec<String>,
}

impl Violations {
    /// An empty violation list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation.
    pub fn push(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// Record a violation unless `condition` holds.
    pub fn require(&mut self, condition: bool, reason: impl Into<String>) {
        if !condition {
            self.push(reason);
        }
    }

    /// Absorb every violation from another run.
    pub fn extend(&mut self, other: Violations) {
        self.reasons.extend(other.reasons);
    }

    /// Whether no violation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Number of recorded violations.
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// The recorded reasons, in detection order.
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.reasons.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

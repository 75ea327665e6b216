//! # Error Types — Structured Error Hierarchy
//!
//! Errors raised by the primitive types in this crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! Validation-rule violations are *not* represented here — those belong to
//! the ledger crate's accumulating violation list. `CoreError` covers only
//! malformed primitives: bad title numbers, cross-currency arithmetic, and
//! timestamp parse failures.

use thiserror::Error;

/// Errors from constructing or combining core primitive types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A title number failed format validation.
    #[error("invalid title number {value:?}: {reason}")]
    InvalidTitleNumber {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Arithmetic attempted across two different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: String,
        /// Currency of the right operand.
        right: String,
    },

    /// A checked monetary operation overflowed or underflowed.
    #[error("monetary arithmetic out of range: {0}")]
    AmountOutOfRange(String),

    /// A timestamp string failed parsing or used a non-UTC offset.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A validity window's end precedes its start.
    #[error("validity window ends before it starts: {from} > {until}")]
    InvertedWindow {
        /// Window start.
        from: String,
        /// Window end.
        until: String,
    },
}

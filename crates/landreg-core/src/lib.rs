//! # landreg-core — Foundational Types for the Conveyancing Stack
//!
//! This crate is the bedrock of the land registry workspace. It defines the
//! primitive types every other crate builds on: record identifiers, title
//! numbers, monetary amounts, and UTC-only timestamps. Every other crate in
//! the workspace depends on `landreg-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `RecordId`, `TitleNumber`,
//!    `Money` — all newtypes with validated constructors. No bare strings
//!    for identifiers, no bare integers for amounts.
//!
//! 2. **Currency-safe arithmetic.** `Money` combines only through checked
//!    operations that refuse cross-currency arithmetic. There is no `Add`
//!    impl that could silently mix currencies.
//!
//! 3. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision. Non-UTC inputs are rejected at
//!    construction.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `landreg-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::CoreError;
pub use identity::{RecordId, TitleNumber};
pub use money::{Currency, Money};
pub use temporal::{Timestamp, ValidityWindow};

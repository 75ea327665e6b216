//! # landreg-ledger — Conveyancing Records and Transition Validation
//!
//! Models an end-to-end land-conveyancing record set: issuance of title,
//! instruction of a conveyancer, drafting and signing of a sale agreement,
//! management of charges and restrictions against a title, and escrow
//! payment confirmation.
//!
//! ## Record Model
//!
//! All six record types are immutable, versioned entities. Each record has
//! a stable [`RecordId`](landreg_core::RecordId) shared by every version;
//! a transition consumes prior versions and produces new ones. Nothing is
//! ever mutated in place — "update" means "produce a new version and
//! retire the old one in the same transition".
//!
//! ## Validation
//!
//! The core of the crate is one validator per record type, each a pure
//! function over a [`TransitionBundle`](bundle::TransitionBundle):
//! consumed versions, produced versions, action tags, and the set of
//! endorsing identities. Validators accumulate *every* detected violation
//! rather than short-circuiting, so a single rejected transition reports
//! all broken rules. [`bundle::validate`] dispatches every action tag in a
//! bundle and accepts only if every touched validator accepts — the
//! all-or-nothing atomicity contract.
//!
//! Validation is synchronous, side-effect-free, and deterministic: no
//! I/O, no shared state, same verdict for the same bundle. Sequencing of
//! historical versions is the caller's concern.
//!
//! ## Module Map
//!
//! - [`violation`] — the accumulating violation list.
//! - [`diff`] — the revert-and-compare diff-integrity gate.
//! - [`bundle`] — transition bundles, action tags, atomic dispatch.
//! - [`instruction`], [`issuance`], [`title`], [`agreement`], [`charges`],
//!   [`payment`] — one module per record type: the record, its status
//!   machine, and its validator.

pub mod agreement;
pub mod bundle;
pub mod charges;
pub mod diff;
pub mod instruction;
pub mod issuance;
pub mod payment;
pub mod title;
pub mod violation;

pub use bundle::{validate, Action, RecordVersion, TransitionBundle};
pub use violation::Violations;

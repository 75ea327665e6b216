//! # Title Issuance Request
//!
//! A conveyancer's request that the registry issue a land title.
//!
//! ## States
//!
//! ```text
//! (none) ──Request──▶ PENDING ──Approve──────▶ APPROVED
//!                        │ │
//!                        │ └──MarkFailed─────▶ FAILED ──RetryAfterFailure──▶ PENDING
//!                        └────Reject─────────▶ TITLE_ALREADY_ISSUED
//! ```
//!
//! Approval may co-produce a land title and a charges-and-restrictions
//! record in the same bundle; those sub-transitions are validated by
//! their own modules. The failed→pending retry is itself an explicitly
//! modelled transition — there is no validator-internal recovery.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::{RecordId, TitleNumber};
use landreg_crypto::Party;

use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::diff::require_unchanged_except;
use crate::instruction::InstructionStatus;
use crate::violation::Violations;

/// Lifecycle state of an issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuanceStatus {
    /// Awaiting the registry's decision.
    Pending,
    /// The registry approved; a title is issued in the same transition.
    Approved,
    /// The registry could not process the request.
    Failed,
    /// Rejected because the title is already issued (terminal).
    TitleAlreadyIssued,
}

impl IssuanceStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Failed => "FAILED",
            Self::TitleAlreadyIssued => "TITLE_ALREADY_ISSUED",
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::TitleAlreadyIssued)
    }
}

impl std::fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on an issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuanceAction {
    /// Submit a new request, standalone or chained from an accepted
    /// instruction.
    Request,
    /// The registry approves the request.
    Approve,
    /// The registry marks the request failed.
    MarkFailed,
    /// The conveyancer resubmits a failed request.
    RetryAfterFailure,
    /// The registry rejects: the title is already issued.
    Reject,
}

/// One version of a title issuance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The title requested.
    pub title_number: TitleNumber,
    /// The registry identity asked to issue.
    pub title_issuer: Party,
    /// The conveyancer acting for the seller.
    pub seller_conveyancer: Party,
    /// Lifecycle state.
    pub status: IssuanceStatus,
    /// The accepted instruction this request was chained from, if any.
    pub instruction_id: Option<RecordId>,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
}

/// Validate an issuance-request sub-transition.
pub fn validate(bundle: &TransitionBundle, action: IssuanceAction) -> Result<(), Violations> {
    let mut v = Violations::new();
    let consumed = bundle.consumed_issuances();
    let produced = bundle.produced_issuances();

    match action {
        IssuanceAction::Request => {
            expect_none(&consumed, "consumed issuance request", &mut v);
            let Some(out) = expect_one(&produced, "produced issuance request", &mut v) else {
                return v.into_result();
            };
            v.require(
                out.status == IssuanceStatus::Pending,
                format!("invariant: a new request must be PENDING, found {}", out.status),
            );
            common_request_checks(bundle, out, &mut v);

            // Chained variant: the request retires the accepted instruction
            // it was raised from.
            let instructions = bundle.consumed_instructions();
            match instructions.as_slice() {
                [] => {}
                [instr] => {
                    v.require(
                        instr.status == InstructionStatus::Accepted,
                        format!(
                            "invariant: chained request requires an ACCEPTED instruction, found {}",
                            instr.status
                        ),
                    );
                    v.require(
                        instr.title_number == out.title_number,
                        "invariant: chained request must carry the instruction's title number",
                    );
                    v.require(
                        out.instruction_id == Some(instr.record_id),
                        "invariant: chained request must link the retired instruction",
                    );
                }
                more => {
                    v.push(format!(
                        "cardinality: at most one instruction may be retired, found {}",
                        more.len()
                    ));
                }
            }
        }
        IssuanceAction::Approve => {
            let Some((input, _)) = status_transition(
                bundle,
                IssuanceStatus::Pending,
                IssuanceStatus::Approved,
                "approve",
                &mut v,
            ) else {
                return v.into_result();
            };
            v.require(
                bundle.endorsed_by(&input.title_issuer),
                "authorization: approval must be endorsed by the title issuer",
            );
        }
        IssuanceAction::MarkFailed => {
            let Some((input, _)) = status_transition(
                bundle,
                IssuanceStatus::Pending,
                IssuanceStatus::Failed,
                "mark-failed",
                &mut v,
            ) else {
                return v.into_result();
            };
            v.require(
                bundle.endorsed_by(&input.title_issuer),
                "authorization: failure must be endorsed by the title issuer",
            );
        }
        IssuanceAction::RetryAfterFailure => {
            let Some((input, out)) = status_transition(
                bundle,
                IssuanceStatus::Failed,
                IssuanceStatus::Pending,
                "retry",
                &mut v,
            ) else {
                return v.into_result();
            };
            v.require(
                bundle.endorsed_by_exactly(&[input.seller_conveyancer]),
                "authorization: retry must be endorsed by exactly the seller conveyancer",
            );
            v.require(
                out.title_issuer != out.seller_conveyancer,
                "invariant: title issuer and seller conveyancer must differ",
            );
        }
        IssuanceAction::Reject => {
            let Some((input, _)) = status_transition(
                bundle,
                IssuanceStatus::Pending,
                IssuanceStatus::TitleAlreadyIssued,
                "reject",
                &mut v,
            ) else {
                return v.into_result();
            };
            v.require(
                bundle.endorsed_by(&input.title_issuer),
                "authorization: rejection must be endorsed by the title issuer",
            );
        }
    }
    v.into_result()
}

/// Field rules shared by the standalone and chained `Request` variants.
fn common_request_checks(bundle: &TransitionBundle, out: &IssuanceRequest, v: &mut Violations) {
    v.require(
        out.title_issuer != out.seller_conveyancer,
        "invariant: title issuer and seller conveyancer must differ",
    );
    v.require(
        bundle.endorsed_by_exactly(&[out.seller_conveyancer]),
        "authorization: request must be endorsed by exactly the seller conveyancer",
    );
    let expected: BTreeSet<Party> = [out.title_issuer, out.seller_conveyancer].into_iter().collect();
    v.require(
        out.participants == expected,
        "invariant: participants must be exactly {issuer, conveyancer}",
    );
}

/// A 1→1 status move where every other field is frozen.
///
/// Returns the matched pair so callers can layer authorization checks on
/// top; `None` means cardinality already failed.
fn status_transition<'a>(
    bundle: &'a TransitionBundle,
    from: IssuanceStatus,
    to: IssuanceStatus,
    action: &str,
    v: &mut Violations,
) -> Option<(&'a IssuanceRequest, &'a IssuanceRequest)> {
    let input = expect_one(&bundle.consumed_issuances(), "consumed issuance request", v)?;
    let out = expect_one(&bundle.produced_issuances(), "produced issuance request", v)?;
    v.require(
        input.record_id == out.record_id,
        format!("invariant: {action} must preserve the record identity"),
    );
    v.require(
        input.status == from,
        format!("invariant: {action} requires a {from} input, found {}", input.status),
    );
    v.require(
        out.status == to,
        format!("invariant: {action} must produce {to}, found {}", out.status),
    );
    require_unchanged_except(v, input, out, action, "status", |c, old| {
        c.status = old.status;
    });
    Some((input, out))
}

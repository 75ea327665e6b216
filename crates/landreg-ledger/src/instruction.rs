//! # Conveyancer Instruction
//!
//! The record by which a title issuer instructs a conveyancer to act for
//! a land owner.
//!
//! ## States
//!
//! ```text
//! (none) ──Create──▶ ISSUED ──Accept──▶ ACCEPTED
//! ```
//!
//! An accepted instruction is later retired by the chained issuance
//! request that links back to it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::{RecordId, TitleNumber};
use landreg_crypto::{Party, VerifiedParty};

use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::diff::require_unchanged_except;
use crate::violation::Violations;

/// Lifecycle state of a conveyancer instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionStatus {
    /// Instruction issued, awaiting the conveyancer's acceptance.
    Issued,
    /// The conveyancer has accepted the instruction.
    Accepted,
}

impl InstructionStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "ISSUED",
            Self::Accepted => "ACCEPTED",
        }
    }
}

impl std::fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a conveyancer instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionAction {
    /// Issue a new instruction.
    Create,
    /// The instructed conveyancer accepts.
    Accept,
}

/// One version of a conveyancer instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConveyancerInstruction {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The title the instruction concerns.
    pub title_number: TitleNumber,
    /// The issuing registry identity.
    pub title_issuer: Party,
    /// The instructed conveyancer.
    pub conveyancer: Party,
    /// The land owner on whose behalf the conveyancer is instructed.
    pub user: VerifiedParty,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
    /// Lifecycle state.
    pub status: InstructionStatus,
}

/// Validate an instruction sub-transition.
///
/// All detected violations are accumulated; the result is `Err` iff any
/// rule broke.
pub fn validate(bundle: &TransitionBundle, action: InstructionAction) -> Result<(), Violations> {
    let mut v = Violations::new();
    let consumed = bundle.consumed_instructions();
    let produced = bundle.produced_instructions();

    match action {
        InstructionAction::Create => {
            expect_none(&consumed, "consumed instruction", &mut v);
            let Some(out) = expect_one(&produced, "produced instruction", &mut v) else {
                return v.into_result();
            };
            v.require(
                out.status == InstructionStatus::Issued,
                format!("invariant: created instruction must be ISSUED, found {}", out.status),
            );
            v.require(
                out.title_issuer != out.conveyancer,
                "invariant: title issuer and conveyancer must differ",
            );
            v.require(
                out.user.identity_verified,
                "invariant: instructing user's identity must be verified",
            );
            v.require(
                bundle.endorsed_by_exactly(&[out.title_issuer]),
                "authorization: creation must be endorsed by exactly the title issuer",
            );
            let expected: BTreeSet<Party> = [out.title_issuer, out.conveyancer].into_iter().collect();
            v.require(
                out.participants == expected,
                "invariant: participants must be exactly {issuer, conveyancer}",
            );
        }
        InstructionAction::Accept => {
            let input = expect_one(&consumed, "consumed instruction", &mut v);
            let out = expect_one(&produced, "produced instruction", &mut v);
            let (Some(input), Some(out)) = (input, out) else {
                return v.into_result();
            };
            v.require(
                input.record_id == out.record_id,
                "invariant: accept must preserve the record identity",
            );
            v.require(
                input.status == InstructionStatus::Issued,
                format!("invariant: accept requires an ISSUED input, found {}", input.status),
            );
            v.require(
                out.status == InstructionStatus::Accepted,
                format!("invariant: accept must produce ACCEPTED, found {}", out.status),
            );
            v.require(
                bundle.endorsed_by_exactly(&[input.conveyancer]),
                "authorization: acceptance must be endorsed by exactly the conveyancer",
            );
            require_unchanged_except(&mut v, input, out, "accept", "status", |c, old| {
                c.status = old.status;
            });
        }
    }
    v.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Action, RecordVersion};
    use landreg_crypto::KeyPair;

    fn issuer() -> Party {
        Party::of(&KeyPair::from_seed(&[1u8; 32]))
    }

    fn conveyancer() -> Party {
        Party::of(&KeyPair::from_seed(&[2u8; 32]))
    }

    fn owner() -> Party {
        Party::of(&KeyPair::from_seed(&[3u8; 32]))
    }

    fn make_instruction() -> ConveyancerInstruction {
        ConveyancerInstruction {
            record_id: RecordId::new(),
            title_number: TitleNumber::new("ZQV888860").unwrap(),
            title_issuer: issuer(),
            conveyancer: conveyancer(),
            user: VerifiedParty::verified(owner()),
            participants: [issuer(), conveyancer()].into_iter().collect(),
            status: InstructionStatus::Issued,
        }
    }

    fn create_bundle(out: ConveyancerInstruction) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle.produced.push(RecordVersion::Instruction(out));
        bundle.actions.push(Action::Instruction(InstructionAction::Create));
        bundle.endorsers.insert(issuer());
        bundle
    }

    fn accept_bundle(input: ConveyancerInstruction, out: ConveyancerInstruction) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle.consumed.push(RecordVersion::Instruction(input));
        bundle.produced.push(RecordVersion::Instruction(out));
        bundle.actions.push(Action::Instruction(InstructionAction::Accept));
        bundle.endorsers.insert(conveyancer());
        bundle
    }

    #[test]
    fn test_create_happy_path() {
        let bundle = create_bundle(make_instruction());
        validate(&bundle, InstructionAction::Create).unwrap();
    }

    #[test]
    fn test_create_rejects_consumed_input() {
        let mut bundle = create_bundle(make_instruction());
        bundle.consumed.push(RecordVersion::Instruction(make_instruction()));
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("cardinality:")));
    }

    #[test]
    fn test_create_rejects_issuer_as_conveyancer() {
        let mut instr = make_instruction();
        instr.conveyancer = issuer();
        instr.participants = [issuer()].into_iter().collect();
        let bundle = create_bundle(instr);
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("must differ")));
    }

    #[test]
    fn test_create_rejects_unverified_user() {
        let mut instr = make_instruction();
        instr.user = VerifiedParty::unverified(owner());
        let bundle = create_bundle(instr);
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("identity must be verified")));
    }

    #[test]
    fn test_create_rejects_wrong_endorser() {
        let mut bundle = create_bundle(make_instruction());
        bundle.endorsers.clear();
        bundle.endorsers.insert(conveyancer());
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("authorization:")));
    }

    #[test]
    fn test_create_rejects_extra_endorser() {
        let mut bundle = create_bundle(make_instruction());
        bundle.endorsers.insert(conveyancer());
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("authorization:")));
    }

    #[test]
    fn test_create_rejects_wrong_participants() {
        let mut instr = make_instruction();
        instr.participants.insert(owner());
        let bundle = create_bundle(instr);
        let err = validate(&bundle, InstructionAction::Create).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("participants")));
    }

    #[test]
    fn test_accept_happy_path() {
        let input = make_instruction();
        let mut out = input.clone();
        out.status = InstructionStatus::Accepted;
        validate(&accept_bundle(input, out), InstructionAction::Accept).unwrap();
    }

    #[test]
    fn test_accept_rejects_wrong_predecessor_status() {
        let mut input = make_instruction();
        input.status = InstructionStatus::Accepted;
        let out = input.clone();
        let err = validate(&accept_bundle(input, out), InstructionAction::Accept).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("requires an ISSUED input")));
    }

    #[test]
    fn test_accept_rejects_field_drift() {
        let input = make_instruction();
        let mut out = input.clone();
        out.status = InstructionStatus::Accepted;
        out.title_number = TitleNumber::new("OTHER1").unwrap();
        let err = validate(&accept_bundle(input, out), InstructionAction::Accept).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("diff:")));
    }

    #[test]
    fn test_accept_rejects_identity_swap() {
        let input = make_instruction();
        let mut out = input.clone();
        out.status = InstructionStatus::Accepted;
        out.record_id = RecordId::new();
        let err = validate(&accept_bundle(input, out), InstructionAction::Accept).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("record identity")));
    }

    #[test]
    fn test_accept_requires_conveyancer_endorsement() {
        let input = make_instruction();
        let mut out = input.clone();
        out.status = InstructionStatus::Accepted;
        let mut bundle = accept_bundle(input, out);
        bundle.endorsers.clear();
        bundle.endorsers.insert(issuer());
        let err = validate(&bundle, InstructionAction::Accept).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("authorization:")));
    }
}

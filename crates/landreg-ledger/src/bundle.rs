//! # Transition Bundles and Atomic Dispatch
//!
//! The atomic unit of change: consumed record versions, produced record
//! versions, one action tag per record type touched, and the identities
//! whose signatures cover the bundle. [`validate`] dispatches every action
//! tag to its validator and accepts only when every touched validator
//! accepts — all-or-nothing.
//!
//! Action tags are closed enums and the dispatch match is exhaustive, so
//! an unrecognised action is unrepresentable. The runtime analogues that
//! remain — an empty action list, duplicate actions for one record type,
//! or produced versions of a type with no matching action — are fatal
//! bundle-level violations reported before any validator runs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::ValidityWindow;
use landreg_crypto::Party;

use crate::agreement::{self, AgreementAction, LandAgreement};
use crate::charges::{self, ChargesAction, ChargesAndRestrictions};
use crate::instruction::{self, ConveyancerInstruction, InstructionAction};
use crate::issuance::{self, IssuanceAction, IssuanceRequest};
use crate::payment::{self, PaymentAction, PaymentConfirmation};
use crate::title::{self, LandTitle, TitleAction};
use crate::violation::Violations;

/// The record types a bundle can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Conveyancer instruction.
    Instruction,
    /// Title issuance request.
    Issuance,
    /// Land title.
    Title,
    /// Sale agreement.
    Agreement,
    /// Charges and restrictions.
    Charges,
    /// Payment confirmation.
    Payment,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Instruction => "instruction",
            Self::Issuance => "issuance request",
            Self::Title => "land title",
            Self::Agreement => "sale agreement",
            Self::Charges => "charges and restrictions",
            Self::Payment => "payment confirmation",
        };
        f.write_str(s)
    }
}

/// One immutable record version carried by a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordVersion {
    /// A conveyancer-instruction version.
    Instruction(ConveyancerInstruction),
    /// An issuance-request version.
    Issuance(IssuanceRequest),
    /// A land-title version.
    Title(LandTitle),
    /// A sale-agreement version.
    Agreement(LandAgreement),
    /// A charges-and-restrictions version.
    Charges(ChargesAndRestrictions),
    /// A payment-confirmation version.
    Payment(PaymentConfirmation),
}

impl RecordVersion {
    /// The record type of this version.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Instruction(_) => RecordKind::Instruction,
            Self::Issuance(_) => RecordKind::Issuance,
            Self::Title(_) => RecordKind::Title,
            Self::Agreement(_) => RecordKind::Agreement,
            Self::Charges(_) => RecordKind::Charges,
            Self::Payment(_) => RecordKind::Payment,
        }
    }
}

/// An action tag: which business operation a sub-transition represents.
///
/// One tag per record type touched; the per-type enums are closed, so the
/// dispatch in [`validate`] is exhaustive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// An instruction operation.
    Instruction(InstructionAction),
    /// An issuance-request operation.
    Issuance(IssuanceAction),
    /// A land-title operation.
    Title(TitleAction),
    /// A sale-agreement operation.
    Agreement(AgreementAction),
    /// A charges-and-restrictions operation.
    Charges(ChargesAction),
    /// A payment-confirmation operation.
    Payment(PaymentAction),
}

impl Action {
    /// The record type this action operates on.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Instruction(_) => RecordKind::Instruction,
            Self::Issuance(_) => RecordKind::Issuance,
            Self::Title(_) => RecordKind::Title,
            Self::Agreement(_) => RecordKind::Agreement,
            Self::Charges(_) => RecordKind::Charges,
            Self::Payment(_) => RecordKind::Payment,
        }
    }
}

/// The atomic unit of change submitted to the validators.
///
/// Assembled by the external orchestration collaborator, which is also
/// responsible for collecting and verifying the endorsing signatures over
/// the serialized bundle. Validators check endorser-set membership and
/// size; the in-record detached signatures are the only cryptography
/// verified here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionBundle {
    /// Record versions retired by this transition.
    pub consumed: Vec<RecordVersion>,
    /// Record versions introduced by this transition.
    pub produced: Vec<RecordVersion>,
    /// One action tag per record type touched.
    pub actions: Vec<Action>,
    /// Identities whose signatures cover this bundle.
    pub endorsers: BTreeSet<Party>,
    /// Drafting window; mandatory for agreement drafting, absent elsewhere.
    pub validity_window: Option<ValidityWindow>,
}

impl TransitionBundle {
    /// An empty bundle to be filled by the caller.
    pub fn new() -> Self {
        Self {
            consumed: Vec::new(),
            produced: Vec::new(),
            actions: Vec::new(),
            endorsers: BTreeSet::new(),
            validity_window: None,
        }
    }

    // ── Typed version accessors ──────────────────────────────────────

    /// Consumed conveyancer instructions.
    pub fn consumed_instructions(&self) -> Vec<&ConveyancerInstruction> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Instruction(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced conveyancer instructions.
    pub fn produced_instructions(&self) -> Vec<&ConveyancerInstruction> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Instruction(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Consumed issuance requests.
    pub fn consumed_issuances(&self) -> Vec<&IssuanceRequest> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Issuance(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced issuance requests.
    pub fn produced_issuances(&self) -> Vec<&IssuanceRequest> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Issuance(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Consumed land titles.
    pub fn consumed_titles(&self) -> Vec<&LandTitle> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Title(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced land titles.
    pub fn produced_titles(&self) -> Vec<&LandTitle> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Title(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Consumed sale agreements.
    pub fn consumed_agreements(&self) -> Vec<&LandAgreement> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Agreement(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced sale agreements.
    pub fn produced_agreements(&self) -> Vec<&LandAgreement> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Agreement(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Consumed charges-and-restrictions records.
    pub fn consumed_charges(&self) -> Vec<&ChargesAndRestrictions> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Charges(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced charges-and-restrictions records.
    pub fn produced_charges(&self) -> Vec<&ChargesAndRestrictions> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Charges(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Consumed payment confirmations.
    pub fn consumed_payments(&self) -> Vec<&PaymentConfirmation> {
        self.consumed
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Payment(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Produced payment confirmations.
    pub fn produced_payments(&self) -> Vec<&PaymentConfirmation> {
        self.produced
            .iter()
            .filter_map(|r| match r {
                RecordVersion::Payment(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    // ── Endorsement helpers ──────────────────────────────────────────

    /// Whether the given identity endorsed this bundle.
    pub fn endorsed_by(&self, party: &Party) -> bool {
        self.endorsers.contains(party)
    }

    /// Whether the endorser set is exactly the given identities — no
    /// missing members, no extras.
    pub fn endorsed_by_exactly(&self, parties: &[Party]) -> bool {
        let expected: BTreeSet<Party> = parties.iter().copied().collect();
        self.endorsers == expected
    }
}

impl Default for TransitionBundle {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a cardinality violation unless the slice holds exactly one item,
/// returning that item.
pub(crate) fn expect_one<'a, T>(
    items: &[&'a T],
    label: &str,
    violations: &mut Violations,
) -> Option<&'a T> {
    if items.len() == 1 {
        Some(items[0])
    } else {
        violations.push(format!("cardinality: expected exactly one {label}, found {}", items.len()));
        None
    }
}

/// Record a cardinality violation unless the slice is empty.
pub(crate) fn expect_none<T>(items: &[&T], label: &str, violations: &mut Violations) {
    if !items.is_empty() {
        violations.push(format!("cardinality: expected no {label}, found {}", items.len()));
    }
}

/// Validate a full transition bundle: dispatch every action tag to its
/// validator, accumulate every violation from every touched validator,
/// and succeed only if all succeed.
///
/// Bundle-level structural defects — no actions, duplicate actions for a
/// record type, produced versions with no matching action — are fatal and
/// reported without running any validator. A consumed version with no
/// same-type action is retirement; its legality is the consuming
/// validator's business.
///
/// # Errors
///
/// The concatenated violations of every failing validator, or the fatal
/// structural violations.
pub fn validate(bundle: &TransitionBundle) -> Result<(), Violations> {
    let mut violations = Violations::new();

    if bundle.actions.is_empty() {
        violations.push("bundle: no action tag supplied");
    }
    let mut seen: BTreeSet<RecordKind> = BTreeSet::new();
    for action in &bundle.actions {
        if !seen.insert(action.kind()) {
            violations.push(format!("bundle: more than one action for record type {}", action.kind()));
        }
    }
    for version in &bundle.produced {
        if !seen.contains(&version.kind()) {
            violations.push(format!(
                "bundle: produced {} version carries no matching action",
                version.kind()
            ));
        }
    }
    // Structural defects pre-empt rule evaluation.
    if !violations.is_empty() {
        return Err(violations);
    }

    for action in &bundle.actions {
        let verdict = match action {
            Action::Instruction(a) => instruction::validate(bundle, *a),
            Action::Issuance(a) => issuance::validate(bundle, *a),
            Action::Title(a) => title::validate(bundle, *a),
            Action::Agreement(a) => agreement::validate(bundle, *a),
            Action::Charges(a) => charges::validate(bundle, *a),
            Action::Payment(a) => payment::validate(bundle, *a),
        };
        if let Err(v) = verdict {
            violations.extend(v);
        }
    }
    violations.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionStatus;
    use landreg_core::TitleNumber;
    use landreg_crypto::{KeyPair, VerifiedParty};

    fn sample_instruction() -> ConveyancerInstruction {
        let issuer = Party::of(&KeyPair::from_seed(&[1u8; 32]));
        let conveyancer = Party::of(&KeyPair::from_seed(&[2u8; 32]));
        ConveyancerInstruction {
            record_id: landreg_core::RecordId::new(),
            title_number: TitleNumber::new("ZQV888860").unwrap(),
            title_issuer: issuer,
            conveyancer,
            user: VerifiedParty::verified(conveyancer),
            participants: [issuer, conveyancer].into_iter().collect(),
            status: InstructionStatus::Issued,
        }
    }

    #[test]
    fn test_empty_bundle_rejected() {
        let bundle = TransitionBundle::new();
        let err = validate(&bundle).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("no action tag")));
    }

    #[test]
    fn test_duplicate_action_per_type_rejected() {
        let mut bundle = TransitionBundle::new();
        bundle.actions.push(Action::Instruction(InstructionAction::Create));
        bundle.actions.push(Action::Instruction(InstructionAction::Accept));
        let err = validate(&bundle).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("more than one action")));
    }

    #[test]
    fn test_produced_without_action_rejected() {
        let mut bundle = TransitionBundle::new();
        bundle.actions.push(Action::Issuance(IssuanceAction::Request));
        bundle.produced.push(RecordVersion::Instruction(sample_instruction()));
        let err = validate(&bundle).unwrap_err();
        assert!(err
            .reasons()
            .iter()
            .any(|r| r.contains("carries no matching action")));
    }

    #[test]
    fn test_typed_accessors_partition_by_kind() {
        let mut bundle = TransitionBundle::new();
        bundle.consumed.push(RecordVersion::Instruction(sample_instruction()));
        assert_eq!(bundle.consumed_instructions().len(), 1);
        assert!(bundle.consumed_issuances().is_empty());
        assert!(bundle.produced_instructions().is_empty());
    }

    #[test]
    fn test_endorsed_by_exactly_rejects_extras() {
        let a = Party::of(&KeyPair::from_seed(&[1u8; 32]));
        let b = Party::of(&KeyPair::from_seed(&[2u8; 32]));
        let mut bundle = TransitionBundle::new();
        bundle.endorsers.insert(a);
        bundle.endorsers.insert(b);
        assert!(!bundle.endorsed_by_exactly(&[a]));
        assert!(bundle.endorsed_by_exactly(&[a, b]));
        assert!(bundle.endorsed_by(&a));
    }
}

//! # Charges and Restrictions
//!
//! The register of charges (mortgages) and restrictions recorded against
//! a title, and the consent flows that discharge them or admit new ones.
//!
//! ## States
//!
//! ```text
//! (co-issued with title) ──▶ ISSUED ──RequestDischarge──▶ REQUEST_TO_ADD_CONSENT_FOR_DISCHARGE
//!                              │                                      │
//!                              │                         ConsentToDischarge
//!                              │                                      ▼
//!                              │                            CONSENT_FOR_DISCHARGE
//!                              │
//!                              └──AssignBuyerConveyancer──▶ ASSIGN_BUYER_CONVEYANCER
//!                                                                     │
//!                                                          ConsentToNewCharge
//!                                                                     ▼
//!                                                          CONSENT_FOR_NEW_CHARGE
//!                                                                     │
//!                                                                 Transfer
//!                                                                     ▼
//!                                                          ISSUED (new owner)
//! ```
//!
//! The discharge flow may flip only a restriction's action and consent
//! flags — identity, consenting party, text, and the nested charge
//! payload are frozen. The new-charge flow may additionally append
//! restrictions, which must arrive pre-consented.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use landreg_core::{Money, RecordId, TitleNumber, Timestamp};
use landreg_crypto::Party;

use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::diff::{require_unchanged_except, unchanged_except};
use crate::violation::Violations;

/// A registered charge (e.g. a mortgage) against a title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Charge {
    /// When the charge was registered.
    pub date: Timestamp,
    /// The lending identity holding the charge.
    pub lender: Party,
    /// The secured amount.
    pub amount: Money,
}

/// What a restriction is currently asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RestrictionAction {
    /// No action pending.
    NoAction,
    /// Discharge of the underlying charge requested.
    Discharge,
    /// A new restriction being added for the incoming owner.
    AddRestriction,
}

impl RestrictionAction {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "NO_ACTION",
            Self::Discharge => "DISCHARGE",
            Self::AddRestriction => "ADD_RESTRICTION",
        }
    }
}

impl std::fmt::Display for RestrictionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A restriction recorded against a title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Restriction {
    /// Identity of this restriction, stable across versions.
    pub id: String,
    /// The party whose consent the restriction requires.
    pub consenting_party: Party,
    /// Free-text terms of the restriction.
    pub text: String,
    /// What the restriction is currently asking for.
    pub action: RestrictionAction,
    /// Whether the consenting party has consented.
    pub consent_given: bool,
    /// The charge this restriction secures, if charge-backed.
    pub charge: Option<Charge>,
}

/// Lifecycle state of a charges-and-restrictions record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargesStatus {
    /// In force for the current owner.
    Issued,
    /// Discharge requested, awaiting the lender's consent.
    RequestToAddConsentForDischarge,
    /// The lender consented to discharge.
    ConsentForDischarge,
    /// A buyer conveyancer has been assigned for sale.
    AssignBuyerConveyancer,
    /// The buyer side consented to the incoming owner's new charge.
    ConsentForNewCharge,
}

impl ChargesStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "ISSUED",
            Self::RequestToAddConsentForDischarge => "REQUEST_TO_ADD_CONSENT_FOR_DISCHARGE",
            Self::ConsentForDischarge => "CONSENT_FOR_DISCHARGE",
            Self::AssignBuyerConveyancer => "ASSIGN_BUYER_CONVEYANCER",
            Self::ConsentForNewCharge => "CONSENT_FOR_NEW_CHARGE",
        }
    }
}

impl std::fmt::Display for ChargesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a charges-and-restrictions record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargesAction {
    /// Issue alongside a newly issued title.
    Issue,
    /// The owner conveyancer requests discharge of the charges.
    RequestDischarge,
    /// The consenting party consents to discharge.
    ConsentToDischarge,
    /// Assign the buyer's conveyancer for a sale.
    AssignBuyerConveyancer,
    /// The buyer conveyancer consents to the incoming owner's charge.
    ConsentToNewCharge,
    /// Re-issue for the new owner on transfer.
    Transfer,
}

/// One version of a charges-and-restrictions record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargesAndRestrictions {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The title the register belongs to.
    pub title_number: TitleNumber,
    /// The conveyancer acting for the current owner.
    pub owner_conveyancer: Party,
    /// The conveyancer acting for the buyer, once assigned.
    pub buyer_conveyancer: Option<Party>,
    /// Charges secured against the title.
    pub charges: BTreeSet<Charge>,
    /// Restrictions recorded against the title.
    pub restrictions: BTreeSet<Restriction>,
    /// Whether discharge of the charges has been consented.
    pub discharge_consented: bool,
    /// Whether the incoming owner's new charge has been consented.
    pub new_charge_consented: bool,
    /// Lifecycle state.
    pub status: ChargesStatus,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
}

/// Validate a charges-and-restrictions sub-transition.
pub fn validate(bundle: &TransitionBundle, action: ChargesAction) -> Result<(), Violations> {
    let mut v = Violations::new();

    match action {
        ChargesAction::Issue => validate_issue(bundle, &mut v),
        ChargesAction::RequestDischarge => validate_request_discharge(bundle, &mut v),
        ChargesAction::ConsentToDischarge => validate_consent_to_discharge(bundle, &mut v),
        ChargesAction::AssignBuyerConveyancer => validate_assign(bundle, &mut v),
        ChargesAction::ConsentToNewCharge => validate_consent_to_new_charge(bundle, &mut v),
        ChargesAction::Transfer => validate_transfer(bundle, &mut v),
    }
    v.into_result()
}

fn validate_issue(bundle: &TransitionBundle, v: &mut Violations) {
    expect_none(&bundle.consumed_charges(), "consumed charges record", v);
    let Some(out) = expect_one(&bundle.produced_charges(), "produced charges record", v) else {
        return;
    };
    let Some(title) = expect_one(&bundle.produced_titles(), "co-produced land title", v) else {
        return;
    };
    v.require(
        out.status == ChargesStatus::Issued,
        format!("invariant: issued charges record must be ISSUED, found {}", out.status),
    );
    v.require(
        out.title_number == title.title_number,
        "invariant: charges record must carry the co-issued title's number",
    );
    v.require(
        out.charges == title.charges,
        "invariant: charge set must equal the co-issued title's",
    );
    v.require(
        out.restrictions == title.restrictions,
        "invariant: restriction set must equal the co-issued title's",
    );
    v.require(
        !out.discharge_consented && !out.new_charge_consented,
        "invariant: consent flags must start false",
    );
    v.require(
        out.buyer_conveyancer.is_none(),
        "invariant: no buyer conveyancer at issuance",
    );
    for r in &out.restrictions {
        v.require(
            r.action == RestrictionAction::NoAction && !r.consent_given,
            format!("invariant: restriction {} must start NO_ACTION without consent", r.id),
        );
        if r.charge.is_some() {
            v.require(
                r.consenting_party == title.owner_lender,
                format!(
                    "invariant: charge-backed restriction {} must name the owner's lender",
                    r.id
                ),
            );
        }
    }
    v.require(
        bundle.endorsed_by_exactly(&[title.issuer]),
        "authorization: issuance must be endorsed by exactly the title issuer",
    );
    v.require(
        out.participants == title.participants,
        "invariant: participants must mirror the co-issued title's",
    );
}

fn validate_request_discharge(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        ChargesStatus::Issued,
        ChargesStatus::RequestToAddConsentForDischarge,
        "request-discharge",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.owner_conveyancer]),
        "authorization: discharge request must be endorsed by exactly the owner conveyancer",
    );
    if let Some(pairs) = paired_restrictions(input, out, v) {
        for (old, new) in pairs {
            v.require(
                unchanged_except(old, new, |c, o| c.action = o.action),
                format!("diff: discharge request may change only restriction {}'s action", old.id),
            );
            v.require(
                new.action == RestrictionAction::Discharge,
                format!("invariant: restriction {} must read DISCHARGE", new.id),
            );
        }
    }
    require_unchanged_except(v, input, out, "request-discharge", "status and restrictions", |c, old| {
        c.status = old.status;
        c.restrictions = old.restrictions.clone();
    });
}

fn validate_consent_to_discharge(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        ChargesStatus::RequestToAddConsentForDischarge,
        ChargesStatus::ConsentForDischarge,
        "consent-to-discharge",
        v,
    );
    // Exactly one endorser, and it must be the consenting party of every
    // restriction being consented.
    let endorsers: Vec<&Party> = bundle.endorsers.iter().collect();
    match endorsers.as_slice() {
        [sole] => {
            for r in &out.restrictions {
                v.require(
                    r.consenting_party == **sole,
                    format!(
                        "authorization: endorser is not the consenting party of restriction {}",
                        r.id
                    ),
                );
            }
        }
        _ => v.push(format!(
            "authorization: consent must carry exactly one endorser, found {}",
            endorsers.len()
        )),
    }
    if let Some(pairs) = paired_restrictions(input, out, v) {
        for (old, new) in pairs {
            v.require(
                unchanged_except(old, new, |c, o| c.consent_given = o.consent_given),
                format!(
                    "diff: discharge consent may change only restriction {}'s consent flag",
                    old.id
                ),
            );
            v.require(
                new.consent_given,
                format!("invariant: restriction {} must carry consent", new.id),
            );
        }
    }
    v.require(
        out.discharge_consented,
        "invariant: discharge-consented flag must be set",
    );
    require_unchanged_except(
        v,
        input,
        out,
        "consent-to-discharge",
        "status, restrictions, and the discharge flag",
        |c, old| {
            c.status = old.status;
            c.restrictions = old.restrictions.clone();
            c.discharge_consented = old.discharge_consented;
        },
    );
}

fn validate_assign(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        ChargesStatus::Issued,
        ChargesStatus::AssignBuyerConveyancer,
        "assign-buyer-conveyancer",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.owner_conveyancer]),
        "authorization: assignment must be endorsed by exactly the owner conveyancer",
    );
    let title = expect_one(&bundle.consumed_titles(), "co-consumed land title", v);
    if let Some(title) = title {
        v.require(
            title.title_number == input.title_number,
            "invariant: co-consumed title number mismatch",
        );
    }
    // The drafting bundle also introduces the agreement and the escrow
    // payment record; their own validators own most of their rules.
    let agreement = expect_one(&bundle.produced_agreements(), "co-produced sale agreement", v);
    expect_one(&bundle.produced_payments(), "co-produced payment confirmation", v);
    if let Some(agreement) = agreement {
        v.require(
            out.buyer_conveyancer == Some(agreement.buyer_conveyancer),
            "invariant: buyer conveyancer must match the co-produced agreement's",
        );
        let mut expected = input.participants.clone();
        expected.insert(agreement.buyer_conveyancer);
        v.require(
            out.participants == expected,
            "invariant: participants must grow by exactly the buyer conveyancer",
        );
    }
    require_unchanged_except(
        v,
        input,
        out,
        "assign-buyer-conveyancer",
        "status, buyer conveyancer, and participants",
        |c, old| {
            c.status = old.status;
            c.buyer_conveyancer = old.buyer_conveyancer;
            c.participants = old.participants.clone();
        },
    );
}

fn validate_consent_to_new_charge(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        ChargesStatus::AssignBuyerConveyancer,
        ChargesStatus::ConsentForNewCharge,
        "consent-to-new-charge",
        v,
    );
    match input.buyer_conveyancer {
        Some(buyer_conveyancer) => v.require(
            bundle.endorsed_by_exactly(&[buyer_conveyancer]),
            "authorization: new-charge consent must be endorsed by exactly the buyer conveyancer",
        ),
        None => v.push("invariant: new-charge consent requires an assigned buyer conveyancer"),
    }
    // Existing restrictions may flip action and consent; appended ones
    // must arrive pre-consented. Nothing may be removed.
    let Some(by_id_in) = restrictions_by_id(&input.restrictions, v) else {
        return;
    };
    let Some(by_id_out) = restrictions_by_id(&out.restrictions, v) else {
        return;
    };
    for id in by_id_in.keys() {
        if !by_id_out.contains_key(id) {
            v.push(format!("diff: restriction {id} may not be removed"));
        }
    }
    for (id, new) in &by_id_out {
        if let Some(old) = by_id_in.get(id) {
            v.require(
                unchanged_except(*old, *new, |c, o| {
                    c.action = o.action;
                    c.consent_given = o.consent_given;
                }),
                format!("diff: new-charge consent may change only restriction {id}'s action and consent"),
            );
        }
        v.require(
            new.action == RestrictionAction::AddRestriction && new.consent_given,
            format!("invariant: restriction {id} must read ADD_RESTRICTION with consent"),
        );
    }
    v.require(
        out.new_charge_consented,
        "invariant: new-charge-consented flag must be set",
    );
    require_unchanged_except(
        v,
        input,
        out,
        "consent-to-new-charge",
        "status, restrictions, and the new-charge flag",
        |c, old| {
            c.status = old.status;
            c.restrictions = old.restrictions.clone();
            c.new_charge_consented = old.new_charge_consented;
        },
    );
}

fn validate_transfer(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        ChargesStatus::ConsentForNewCharge,
        ChargesStatus::Issued,
        "transfer",
        v,
    );
    let title_in = expect_one(&bundle.consumed_titles(), "co-consumed land title", v);
    let title_out = expect_one(&bundle.produced_titles(), "co-produced land title", v);
    expect_one(&bundle.consumed_agreements(), "co-consumed sale agreement", v);

    match input.buyer_conveyancer {
        Some(buyer_conveyancer) => {
            v.require(
                bundle.endorsed_by(&buyer_conveyancer),
                "authorization: transfer must be endorsed by the buyer conveyancer",
            );
            v.require(
                out.owner_conveyancer == buyer_conveyancer,
                "invariant: the buyer conveyancer becomes the owner conveyancer",
            );
        }
        None => v.push("invariant: transfer requires an assigned buyer conveyancer"),
    }
    v.require(
        bundle.endorsed_by(&input.owner_conveyancer),
        "authorization: transfer must be endorsed by the seller conveyancer",
    );
    if let Some(title_in) = title_in {
        v.require(
            bundle.endorsed_by(&title_in.issuer),
            "authorization: transfer must be endorsed by the title issuer",
        );
    }
    v.require(
        out.buyer_conveyancer.is_none(),
        "invariant: buyer conveyancer must reset on transfer",
    );
    v.require(
        !out.discharge_consented && !out.new_charge_consented,
        "invariant: consent flags must reset on transfer",
    );
    if let (Some(pairs), Some(title_out)) = (paired_restrictions(input, out, v), title_out) {
        for (old, new) in pairs {
            v.require(
                unchanged_except(old, new, |c, o| {
                    c.action = o.action;
                    c.consent_given = o.consent_given;
                    c.consenting_party = o.consenting_party;
                }),
                format!(
                    "diff: transfer may change only restriction {}'s action, consent, and consenting party",
                    old.id
                ),
            );
            v.require(
                new.action == RestrictionAction::NoAction && !new.consent_given,
                format!("invariant: restriction {} must reset to NO_ACTION without consent", new.id),
            );
            v.require(
                new.consenting_party == title_out.owner_lender,
                format!(
                    "invariant: restriction {} must name the new owner's lender",
                    new.id
                ),
            );
        }
    }
    require_unchanged_except(
        v,
        input,
        out,
        "transfer",
        "status, conveyancers, restrictions, consent flags, and participants",
        |c, old| {
            c.status = old.status;
            c.owner_conveyancer = old.owner_conveyancer;
            c.buyer_conveyancer = old.buyer_conveyancer;
            c.restrictions = old.restrictions.clone();
            c.discharge_consented = old.discharge_consented;
            c.new_charge_consented = old.new_charge_consented;
            c.participants = old.participants.clone();
        },
    );
}

// ── Shared helpers ───────────────────────────────────────────────────

/// The 1→1 consumed/produced pair every post-issuance action operates on.
fn consumed_produced_pair<'a>(
    bundle: &'a TransitionBundle,
    v: &mut Violations,
) -> Option<(&'a ChargesAndRestrictions, &'a ChargesAndRestrictions)> {
    let input = expect_one(&bundle.consumed_charges(), "consumed charges record", v)?;
    let out = expect_one(&bundle.produced_charges(), "produced charges record", v)?;
    v.require(
        input.record_id == out.record_id,
        "invariant: transition must preserve the record identity",
    );
    Some((input, out))
}

fn require_status_move(
    input: &ChargesAndRestrictions,
    out: &ChargesAndRestrictions,
    from: ChargesStatus,
    to: ChargesStatus,
    action: &str,
    v: &mut Violations,
) {
    v.require(
        input.status == from,
        format!("invariant: {action} requires a {from} input, found {}", input.status),
    );
    v.require(
        out.status == to,
        format!("invariant: {action} must produce {to}, found {}", out.status),
    );
}

/// Key a version's restrictions by id.
///
/// The set's ordering covers every field, so two restrictions sharing an
/// id can coexist in it; keying by id would silently collapse them and
/// let the collapsed one dodge the per-restriction diff. Duplicate ids
/// are therefore rejected outright.
fn restrictions_by_id<'a>(
    set: &'a BTreeSet<Restriction>,
    v: &mut Violations,
) -> Option<BTreeMap<&'a str, &'a Restriction>> {
    let by_id: BTreeMap<&str, &Restriction> = set.iter().map(|r| (r.id.as_str(), r)).collect();
    if by_id.len() != set.len() {
        v.push("invariant: restriction ids must be unique within a version");
        return None;
    }
    Some(by_id)
}

/// Pair input and output restrictions by id, requiring identical id sets.
fn paired_restrictions<'a>(
    input: &'a ChargesAndRestrictions,
    out: &'a ChargesAndRestrictions,
    v: &mut Violations,
) -> Option<Vec<(&'a Restriction, &'a Restriction)>> {
    let by_id_in = restrictions_by_id(&input.restrictions, v)?;
    let by_id_out = restrictions_by_id(&out.restrictions, v)?;
    if by_id_in.len() != by_id_out.len()
        || !by_id_in.keys().all(|id| by_id_out.contains_key(id))
    {
        v.push("diff: restriction identities must be preserved".to_string());
        return None;
    }
    Some(
        by_id_in
            .iter()
            .map(|(id, old)| (*old, by_id_out[id]))
            .collect(),
    )
}

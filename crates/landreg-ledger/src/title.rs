//! # Land Title
//!
//! The registered title itself: who owns it, which conveyancers act for
//! owner and buyer, and the charges and restrictions recorded against
//! it. A title is born from an approved issuance request and changes
//! hands through the sale flow.
//!
//! ## States
//!
//! ```text
//! (issuance approved) ──Issue──▶ ISSUED ──AssignBuyerConveyancer──▶ ASSIGN_BUYER_CONVEYANCER ─┐
//!                                  │                                                          │
//!                           TransferRequest                                               Transfer
//!                                  ▼                                                          │
//!                        PENDING_BUYER_APPROVAL ──────────────Transfer──────────────▶ TRANSFERRED
//! ```
//!
//! Ownership assertions are cryptographic: whoever is recorded as owner
//! must carry a valid detached signature over the title number.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::{Money, RecordId, TitleNumber};
use landreg_crypto::{Party, VerifiedParty};

use crate::agreement::AgreementStatus;
use crate::charges::{Charge, Restriction, RestrictionAction};
use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::diff::require_unchanged_except;
use crate::violation::Violations;

/// Lifecycle state of a land title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TitleStatus {
    /// Registered to the current owner.
    Issued,
    /// A buyer conveyancer has been assigned for sale.
    AssignBuyerConveyancer,
    /// Transfer drafted and awaiting the buyer side's completion.
    PendingBuyerApproval,
    /// Transferred to the new owner.
    Transferred,
}

impl TitleStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "ISSUED",
            Self::AssignBuyerConveyancer => "ASSIGN_BUYER_CONVEYANCER",
            Self::PendingBuyerApproval => "PENDING_BUYER_APPROVAL",
            Self::Transferred => "TRANSFERRED",
        }
    }
}

impl std::fmt::Display for TitleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a land title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TitleAction {
    /// Issue the title from an approved issuance request.
    Issue,
    /// Assign the buyer's conveyancer when a sale is drafted.
    AssignBuyerConveyancer,
    /// The seller requests transfer to a named buyer.
    TransferRequest,
    /// Complete the transfer to the buyer.
    Transfer,
}

/// One version of a land title record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandTitle {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The registry title number, unique per title.
    pub title_number: TitleNumber,
    /// The registry that issued the title.
    pub issuer: Party,
    /// The registered owner, with their ownership signature.
    pub owner: VerifiedParty,
    /// The conveyancer acting for the owner.
    pub owner_conveyancer: Party,
    /// The lender holding the owner's mortgage.
    pub owner_lender: Party,
    /// The incoming buyer, once a transfer is drafted.
    pub buyer: Option<VerifiedParty>,
    /// The conveyancer acting for the buyer, once assigned.
    pub buyer_conveyancer: Option<Party>,
    /// Lifecycle state.
    pub status: TitleStatus,
    /// What the title last sold for, if it has ever been sold.
    pub last_sold_value: Option<Money>,
    /// Charges secured against the title.
    pub charges: BTreeSet<Charge>,
    /// Restrictions recorded against the title.
    pub restrictions: BTreeSet<Restriction>,
    /// The sale agreement currently in flight, if any.
    pub agreement_id: Option<RecordId>,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
}

/// Validate a land-title sub-transition.
pub fn validate(bundle: &TransitionBundle, action: TitleAction) -> Result<(), Violations> {
    let mut v = Violations::new();

    match action {
        TitleAction::Issue => validate_issue(bundle, &mut v),
        TitleAction::AssignBuyerConveyancer => validate_assign(bundle, &mut v),
        TitleAction::TransferRequest => validate_transfer_request(bundle, &mut v),
        TitleAction::Transfer => validate_transfer(bundle, &mut v),
    }
    v.into_result()
}

fn validate_issue(bundle: &TransitionBundle, v: &mut Violations) {
    expect_none(&bundle.consumed_titles(), "consumed land title", v);
    let Some(out) = expect_one(&bundle.produced_titles(), "produced land title", v) else {
        return;
    };
    // Issuing retires the request it answers. When approval happens in
    // this same bundle the approved version sits on the produced side;
    // otherwise the already-approved version is consumed here.
    let produced_requests = bundle.produced_issuances();
    let request = if produced_requests.is_empty() {
        expect_one(&bundle.consumed_issuances(), "consumed issuance request", v)
    } else {
        expect_one(&produced_requests, "issuance request", v)
    };
    if let Some(request) = request {
        v.require(
            request.status == crate::issuance::IssuanceStatus::Approved,
            format!(
                "invariant: issuance request must be APPROVED before a title issues, found {}",
                request.status
            ),
        );
        v.require(
            request.title_number == out.title_number,
            "invariant: issued title number must match the request's",
        );
        v.require(
            request.title_issuer == out.issuer,
            "invariant: issued title must name the requesting registry",
        );
    }
    v.require(
        out.status == TitleStatus::Issued,
        format!("invariant: a new title must be ISSUED, found {}", out.status),
    );
    v.require(
        out.owner.identity_verified,
        "invariant: the first owner must have a verified identity",
    );
    v.require(
        out.issuer != out.owner_conveyancer,
        "invariant: the registry may not act as the owner's conveyancer",
    );
    v.require(
        out.last_sold_value.is_none(),
        "invariant: a new title has no sale history",
    );
    v.require(
        out.buyer.is_none() && out.buyer_conveyancer.is_none(),
        "invariant: a new title has no buyer side",
    );
    v.require(
        out.agreement_id.is_none(),
        "invariant: a new title has no agreement in flight",
    );
    v.require(
        bundle.endorsed_by(&out.issuer),
        "authorization: issuance must be endorsed by the registry",
    );
    let expected: BTreeSet<Party> = [out.issuer, out.owner_conveyancer].into_iter().collect();
    v.require(
        out.participants == expected,
        "invariant: participants must be exactly the registry and the owner conveyancer",
    );
}

fn validate_assign(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        TitleStatus::Issued,
        TitleStatus::AssignBuyerConveyancer,
        "assign-buyer-conveyancer",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.owner_conveyancer]),
        "authorization: assignment must be endorsed by exactly the owner conveyancer",
    );
    let agreement = expect_one(&bundle.produced_agreements(), "co-produced sale agreement", v);
    if let Some(agreement) = agreement {
        v.require(
            out.buyer_conveyancer == Some(agreement.buyer_conveyancer),
            "invariant: buyer conveyancer must match the co-produced agreement's",
        );
        v.require(
            out.agreement_id == Some(agreement.record_id),
            "invariant: the title must reference the co-produced agreement",
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
        "status, buyer conveyancer, agreement reference, and participants",
        |c, old| {
            c.status = old.status;
            c.buyer_conveyancer = old.buyer_conveyancer;
            c.agreement_id = old.agreement_id;
            c.participants = old.participants.clone();
        },
    );
}

fn validate_transfer_request(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        TitleStatus::Issued,
        TitleStatus::PendingBuyerApproval,
        "transfer-request",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.owner_conveyancer]),
        "authorization: a transfer request must be endorsed by exactly the owner conveyancer",
    );
    match (&out.buyer, &out.buyer_conveyancer) {
        (Some(buyer), Some(buyer_conveyancer)) => {
            v.require(
                buyer.party != input.owner.party,
                "invariant: the owner may not buy their own title",
            );
            let mut expected = input.participants.clone();
            expected.insert(*buyer_conveyancer);
            v.require(
                out.participants == expected,
                "invariant: participants must grow by exactly the buyer conveyancer",
            );
        }
        _ => v.push("invariant: a transfer request must name a buyer and a buyer conveyancer"),
    }
    v.require(
        out.owner.signed_title(&out.title_number),
        "signature: the owner's transfer assertion does not verify against the title number",
    );
    v.require(
        out.owner.party == input.owner.party,
        "invariant: a transfer request may not change the owner",
    );
    require_unchanged_except(
        v,
        input,
        out,
        "transfer-request",
        "status, owner signature, buyer side, and participants",
        |c, old| {
            c.status = old.status;
            c.owner = old.owner.clone();
            c.buyer = old.buyer.clone();
            c.buyer_conveyancer = old.buyer_conveyancer;
            c.participants = old.participants.clone();
        },
    );
}

fn validate_transfer(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    v.require(
        matches!(
            input.status,
            TitleStatus::PendingBuyerApproval | TitleStatus::AssignBuyerConveyancer
        ),
        format!(
            "invariant: transfer requires a PENDING_BUYER_APPROVAL or ASSIGN_BUYER_CONVEYANCER input, found {}",
            input.status
        ),
    );
    v.require(
        out.status == TitleStatus::Transferred,
        format!("invariant: transfer must produce TRANSFERRED, found {}", out.status),
    );
    match (&input.buyer, bundle.consumed_agreements().first()) {
        // Drafted through the agreement flow: the buyer comes from there.
        (None, Some(agreement)) => {
            v.require(
                out.owner.party == agreement.buyer.party,
                "invariant: the new owner must be the agreement's buyer",
            );
        }
        (Some(buyer), _) => {
            v.require(
                out.owner.party == buyer.party,
                "invariant: the new owner must be the named buyer",
            );
        }
        (None, None) => {
            v.push("invariant: transfer requires a named buyer or a co-consumed agreement");
        }
    }
    v.require(
        out.owner.signed_title(&out.title_number),
        "signature: the new owner's assertion does not verify against the title number",
    );
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
    v.require(
        bundle.endorsed_by(&input.issuer),
        "authorization: transfer must be endorsed by the registry",
    );
    v.require(
        out.buyer.is_none() && out.buyer_conveyancer.is_none(),
        "invariant: the buyer side must reset on transfer",
    );
    v.require(
        out.agreement_id.is_none(),
        "invariant: the agreement reference must reset on transfer",
    );
    if let Some(agreement) = bundle.consumed_agreements().first() {
        // The buyer and price are only trustworthy once the agreement has
        // reached COMPLETED; earlier versions carry unsettled terms.
        v.require(
            agreement.status == AgreementStatus::Completed,
            format!(
                "invariant: transfer may settle only a COMPLETED agreement, found {}",
                agreement.status
            ),
        );
        v.require(
            out.last_sold_value == Some(agreement.purchase_price),
            "invariant: the sale value must be recorded from the agreement's price",
        );
    }
    for r in &out.restrictions {
        v.require(
            r.action == RestrictionAction::NoAction && !r.consent_given,
            format!("invariant: restriction {} must reset to NO_ACTION without consent", r.id),
        );
        v.require(
            r.consenting_party == out.owner_lender,
            format!("invariant: restriction {} must name the new owner's lender", r.id),
        );
    }
    // Title number, registry, and the charge set survive transfer intact.
    require_unchanged_except(
        v,
        input,
        out,
        "transfer",
        "owner side, buyer side, status, sale value, restrictions, and participants",
        |c, old| {
            c.status = old.status;
            c.owner = old.owner.clone();
            c.owner_conveyancer = old.owner_conveyancer;
            c.owner_lender = old.owner_lender;
            c.buyer = old.buyer.clone();
            c.buyer_conveyancer = old.buyer_conveyancer;
            c.last_sold_value = old.last_sold_value;
            c.agreement_id = old.agreement_id;
            c.restrictions = old.restrictions.clone();
            c.participants = old.participants.clone();
        },
    );
}

// ── Shared helpers ───────────────────────────────────────────────────

fn consumed_produced_pair<'a>(
    bundle: &'a TransitionBundle,
    v: &mut Violations,
) -> Option<(&'a LandTitle, &'a LandTitle)> {
    let input = expect_one(&bundle.consumed_titles(), "consumed land title", v)?;
    let out = expect_one(&bundle.produced_titles(), "produced land title", v)?;
    v.require(
        input.record_id == out.record_id,
        "invariant: transition must preserve the record identity",
    );
    Some((input, out))
}

fn require_status_move(
    input: &LandTitle,
    out: &LandTitle,
    from: TitleStatus,
    to: TitleStatus,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Action, RecordVersion};
    use crate::issuance::{IssuanceRequest, IssuanceStatus};
    use landreg_crypto::KeyPair;

    fn issuer_key() -> KeyPair {
        KeyPair::from_seed(&[1u8; 32])
    }

    fn conveyancer() -> Party {
        Party::of(&KeyPair::from_seed(&[2u8; 32]))
    }

    fn owner_key() -> KeyPair {
        KeyPair::from_seed(&[3u8; 32])
    }

    fn lender() -> Party {
        Party::of(&KeyPair::from_seed(&[4u8; 32]))
    }

    fn buyer_key() -> KeyPair {
        KeyPair::from_seed(&[5u8; 32])
    }

    fn buyer_conveyancer() -> Party {
        Party::of(&KeyPair::from_seed(&[6u8; 32]))
    }

    fn title_number() -> TitleNumber {
        TitleNumber::new("ZQV888860").unwrap()
    }

    fn signed_owner(key: &KeyPair) -> VerifiedParty {
        VerifiedParty::verified(Party::of(key)).with_signature(key.sign_title(&title_number()))
    }

    fn make_title(status: TitleStatus) -> LandTitle {
        LandTitle {
            record_id: RecordId::new(),
            title_number: title_number(),
            issuer: Party::of(&issuer_key()),
            owner: signed_owner(&owner_key()),
            owner_conveyancer: conveyancer(),
            owner_lender: lender(),
            buyer: None,
            buyer_conveyancer: None,
            status,
            last_sold_value: None,
            charges: BTreeSet::new(),
            restrictions: BTreeSet::new(),
            agreement_id: None,
            participants: [Party::of(&issuer_key()), conveyancer()].into_iter().collect(),
        }
    }

    fn approved_request(title: &LandTitle) -> IssuanceRequest {
        IssuanceRequest {
            record_id: RecordId::new(),
            title_number: title.title_number.clone(),
            title_issuer: title.issuer,
            seller_conveyancer: title.owner_conveyancer,
            status: IssuanceStatus::Approved,
            instruction_id: None,
            participants: title.participants.clone(),
        }
    }

    fn issue_bundle(title: LandTitle) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle
            .consumed
            .push(RecordVersion::Issuance(approved_request(&title)));
        bundle.produced.push(RecordVersion::Title(title));
        bundle.actions.push(Action::Title(TitleAction::Issue));
        bundle.endorsers.insert(Party::of(&issuer_key()));
        bundle
    }

    #[test]
    fn test_issue_happy_path() {
        let bundle = issue_bundle(make_title(TitleStatus::Issued));
        validate(&bundle, TitleAction::Issue).unwrap();
    }

    #[test]
    fn test_issue_rejects_pending_request() {
        let title = make_title(TitleStatus::Issued);
        let mut bundle = issue_bundle(title.clone());
        bundle.consumed.clear();
        let mut request = approved_request(&title);
        request.status = IssuanceStatus::Pending;
        bundle.consumed.push(RecordVersion::Issuance(request));
        let err = validate(&bundle, TitleAction::Issue).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("must be APPROVED")));
    }

    #[test]
    fn test_issue_rejects_sale_history() {
        let mut title = make_title(TitleStatus::Issued);
        title.last_sold_value = Some(Money::gbp(1_000));
        let bundle = issue_bundle(title);
        let err = validate(&bundle, TitleAction::Issue).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("no sale history")));
    }

    #[test]
    fn test_issue_rejects_unverified_owner() {
        let mut title = make_title(TitleStatus::Issued);
        title.owner.identity_verified = false;
        let bundle = issue_bundle(title);
        let err = validate(&bundle, TitleAction::Issue).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("verified identity")));
    }

    fn transfer_requested(input: &LandTitle) -> LandTitle {
        let mut out = input.clone();
        out.status = TitleStatus::PendingBuyerApproval;
        out.buyer = Some(VerifiedParty::verified(Party::of(&buyer_key())));
        out.buyer_conveyancer = Some(buyer_conveyancer());
        out.participants.insert(buyer_conveyancer());
        out
    }

    fn pair_bundle(
        input: LandTitle,
        out: LandTitle,
        action: TitleAction,
        endorsers: &[Party],
    ) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle.consumed.push(RecordVersion::Title(input));
        bundle.produced.push(RecordVersion::Title(out));
        bundle.actions.push(Action::Title(action));
        bundle.endorsers.extend(endorsers.iter().copied());
        bundle
    }

    #[test]
    fn test_transfer_request_happy_path() {
        let input = make_title(TitleStatus::Issued);
        let out = transfer_requested(&input);
        let bundle = pair_bundle(input, out, TitleAction::TransferRequest, &[conveyancer()]);
        validate(&bundle, TitleAction::TransferRequest).unwrap();
    }

    #[test]
    fn test_transfer_request_rejects_self_sale() {
        let input = make_title(TitleStatus::Issued);
        let mut out = transfer_requested(&input);
        out.buyer = Some(VerifiedParty::verified(input.owner.party));
        let bundle = pair_bundle(input, out, TitleAction::TransferRequest, &[conveyancer()]);
        let err = validate(&bundle, TitleAction::TransferRequest).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("buy their own title")));
    }

    #[test]
    fn test_transfer_request_rejects_forged_owner_signature() {
        let input = make_title(TitleStatus::Issued);
        let mut out = transfer_requested(&input);
        // Signature from the wrong key over the right payload.
        out.owner.signature = Some(buyer_key().sign_title(&title_number()));
        let bundle = pair_bundle(input, out, TitleAction::TransferRequest, &[conveyancer()]);
        let err = validate(&bundle, TitleAction::TransferRequest).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("signature:")));
    }

    fn transferred(input: &LandTitle) -> LandTitle {
        let mut out = input.clone();
        out.status = TitleStatus::Transferred;
        out.owner =
            VerifiedParty::verified(Party::of(&buyer_key())).with_signature(buyer_key().sign_title(&title_number()));
        out.owner_conveyancer = buyer_conveyancer();
        out.buyer = None;
        out.buyer_conveyancer = None;
        out
    }

    #[test]
    fn test_transfer_happy_path() {
        let input = transfer_requested(&make_title(TitleStatus::Issued));
        let out = transferred(&input);
        let bundle = pair_bundle(
            input,
            out,
            TitleAction::Transfer,
            &[conveyancer(), buyer_conveyancer(), Party::of(&issuer_key())],
        );
        validate(&bundle, TitleAction::Transfer).unwrap();
    }

    #[test]
    fn test_transfer_requires_registry_endorsement() {
        let input = transfer_requested(&make_title(TitleStatus::Issued));
        let out = transferred(&input);
        let bundle = pair_bundle(
            input,
            out,
            TitleAction::Transfer,
            &[conveyancer(), buyer_conveyancer()],
        );
        let err = validate(&bundle, TitleAction::Transfer).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("endorsed by the registry")));
    }

    #[test]
    fn test_transfer_rejects_owner_other_than_buyer() {
        let input = transfer_requested(&make_title(TitleStatus::Issued));
        let mut out = transferred(&input);
        let interloper = KeyPair::from_seed(&[9u8; 32]);
        out.owner = VerifiedParty::verified(Party::of(&interloper))
            .with_signature(interloper.sign_title(&title_number()));
        let bundle = pair_bundle(
            input,
            out,
            TitleAction::Transfer,
            &[conveyancer(), buyer_conveyancer(), Party::of(&issuer_key())],
        );
        let err = validate(&bundle, TitleAction::Transfer).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("must be the named buyer")));
    }

    #[test]
    fn test_transfer_rejects_unsettled_agreement() {
        use crate::agreement::LandAgreement;
        use landreg_core::Timestamp;

        let input = transfer_requested(&make_title(TitleStatus::Issued));
        let mut out = transferred(&input);
        out.last_sold_value = Some(Money::gbp(1_000));
        // Consumed alongside the transfer with no agreement action, so
        // nothing else in the bundle vouches for its contents.
        let agreement = LandAgreement {
            record_id: RecordId::new(),
            title_number: title_number(),
            title_id: input.record_id,
            buyer: VerifiedParty::verified(Party::of(&buyer_key())),
            seller: VerifiedParty::verified(input.owner.party),
            buyer_conveyancer: buyer_conveyancer(),
            seller_conveyancer: conveyancer(),
            creation_date: Timestamp::parse("2026-03-01T12:00:00Z").unwrap(),
            completion_date: Timestamp::parse("2026-04-01T12:00:00Z").unwrap(),
            purchase_price: Money::gbp(1_000),
            deposit: Money::gbp(100),
            balance: Money::gbp(900),
            specific_mortgage_terms: true,
            payment_id: None,
            status: AgreementStatus::Signed,
            participants: [conveyancer(), buyer_conveyancer()].into_iter().collect(),
        };
        let mut bundle = pair_bundle(
            input,
            out,
            TitleAction::Transfer,
            &[conveyancer(), buyer_conveyancer(), Party::of(&issuer_key())],
        );
        bundle.consumed.push(RecordVersion::Agreement(agreement));
        let err = validate(&bundle, TitleAction::Transfer).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("COMPLETED agreement")));
    }

    #[test]
    fn test_transfer_rejects_title_number_drift() {
        let input = transfer_requested(&make_title(TitleStatus::Issued));
        let mut out = transferred(&input);
        out.title_number = TitleNumber::new("ZQV999999").unwrap();
        let bundle = pair_bundle(
            input,
            out,
            TitleAction::Transfer,
            &[conveyancer(), buyer_conveyancer(), Party::of(&issuer_key())],
        );
        assert!(validate(&bundle, TitleAction::Transfer).is_err());
    }
}

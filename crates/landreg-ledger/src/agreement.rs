//! # Land Agreement
//!
//! The sale contract between owner and buyer: price, deposit, balance,
//! completion date, and the exchange of signatures that makes the
//! contract binding.
//!
//! ## States
//!
//! ```text
//! CreateDraft ──▶ CREATED ──Approve──▶ APPROVED ──SellerSign──▶ SIGNED
//!                                                                 │
//!                                                             BuyerSign
//!                                                                 ▼
//!                 TRANSFERRED ◀──Finalize── COMPLETED ◀───────────┘
//! ```
//!
//! Both signatures are detached Ed25519 assertions over the title
//! number. Once placed, signature bytes are frozen: later transitions
//! must carry them through unchanged.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::{Money, RecordId, TitleNumber, Timestamp};
use landreg_crypto::{Party, VerifiedParty};

use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::diff::require_unchanged_except;
use crate::violation::Violations;

/// Lifecycle state of a sale agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// Drafted by the seller's conveyancer.
    Created,
    /// Approved by the buyer's conveyancer.
    Approved,
    /// Signed by the seller.
    Signed,
    /// Counter-signed by the buyer.
    Completed,
    /// The sale settled and the title changed hands.
    Transferred,
}

impl AgreementStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Approved => "APPROVED",
            Self::Signed => "SIGNED",
            Self::Completed => "COMPLETED",
            Self::Transferred => "TRANSFERRED",
        }
    }

    /// Whether the agreement has reached its final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transferred)
    }
}

impl std::fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a sale agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementAction {
    /// The seller's conveyancer drafts the contract.
    CreateDraft,
    /// The buyer's conveyancer approves the draft terms.
    Approve,
    /// The seller signs.
    SellerSign,
    /// The buyer counter-signs.
    BuyerSign,
    /// The sale settles alongside the title transfer.
    Finalize,
}

/// One version of a sale agreement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandAgreement {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The title being sold.
    pub title_number: TitleNumber,
    /// The land title record this agreement was drafted against.
    pub title_id: RecordId,
    /// The buyer, carrying their signature once placed.
    pub buyer: VerifiedParty,
    /// The seller, carrying their signature once placed.
    pub seller: VerifiedParty,
    /// The conveyancer acting for the buyer.
    pub buyer_conveyancer: Party,
    /// The conveyancer acting for the seller.
    pub seller_conveyancer: Party,
    /// When the contract was drafted.
    pub creation_date: Timestamp,
    /// The contractual completion date.
    pub completion_date: Timestamp,
    /// Full purchase price.
    pub purchase_price: Money,
    /// Deposit payable on exchange.
    pub deposit: Money,
    /// Balance payable on completion.
    pub balance: Money,
    /// Whether the buyer's mortgage terms have been settled.
    pub specific_mortgage_terms: bool,
    /// The payment confirmation tracking settlement, once issued.
    pub payment_id: Option<RecordId>,
    /// Lifecycle state.
    pub status: AgreementStatus,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
}

/// Validate a sale-agreement sub-transition.
pub fn validate(bundle: &TransitionBundle, action: AgreementAction) -> Result<(), Violations> {
    let mut v = Violations::new();

    match action {
        AgreementAction::CreateDraft => validate_create_draft(bundle, &mut v),
        AgreementAction::Approve => validate_approve(bundle, &mut v),
        AgreementAction::SellerSign => validate_seller_sign(bundle, &mut v),
        AgreementAction::BuyerSign => validate_buyer_sign(bundle, &mut v),
        AgreementAction::Finalize => validate_finalize(bundle, &mut v),
    }
    v.into_result()
}

fn validate_create_draft(bundle: &TransitionBundle, v: &mut Violations) {
    expect_none(&bundle.consumed_agreements(), "consumed sale agreement", v);
    let Some(out) = expect_one(&bundle.produced_agreements(), "produced sale agreement", v) else {
        return;
    };
    v.require(
        out.status == AgreementStatus::Created,
        format!("invariant: a draft must be CREATED, found {}", out.status),
    );
    v.require(
        bundle.endorsed_by_exactly(&[out.seller_conveyancer]),
        "authorization: a draft must be endorsed by exactly the seller conveyancer",
    );
    // The draft is cut against the live title.
    if let Some(title) = expect_one(&bundle.consumed_titles(), "co-consumed land title", v) {
        v.require(
            out.title_number == title.title_number,
            "invariant: the draft must carry the title's number",
        );
        v.require(
            out.title_id == title.record_id,
            "invariant: the draft must reference the consumed title",
        );
        v.require(
            out.seller.party == title.owner.party,
            "invariant: the seller must be the registered owner",
        );
        v.require(
            out.seller_conveyancer == title.owner_conveyancer,
            "invariant: the seller conveyancer must be the owner's conveyancer",
        );
    }
    v.require(
        out.buyer.party != out.seller.party,
        "invariant: buyer and seller must differ",
    );
    v.require(
        out.buyer_conveyancer != out.seller_conveyancer,
        "invariant: each side must have its own conveyancer",
    );
    match &bundle.validity_window {
        Some(window) => {
            v.require(
                window.contains(&out.creation_date),
                "invariant: the creation date must fall inside the bundle's validity window",
            );
            v.require(
                out.creation_date <= out.completion_date,
                "invariant: completion may not precede creation",
            );
        }
        None => v.push("bundle: drafting an agreement requires a validity window"),
    }
    match out.deposit.lt(&out.purchase_price) {
        Ok(true) => {}
        Ok(false) => v.push("invariant: the deposit must be less than the purchase price"),
        Err(e) => v.push(format!("invariant: {e}")),
    }
    match out.purchase_price.checked_sub(&out.deposit) {
        Ok(expected) if expected == out.balance => {}
        Ok(_) => v.push("invariant: the balance must equal price minus deposit"),
        Err(e) => v.push(format!("invariant: {e}")),
    }
    v.require(
        !out.specific_mortgage_terms,
        "invariant: mortgage terms are settled at approval, not drafting",
    );
    v.require(
        out.buyer.signature.is_none() && out.seller.signature.is_none(),
        "invariant: a draft carries no signatures",
    );
    let expected: BTreeSet<Party> =
        [out.seller_conveyancer, out.buyer_conveyancer].into_iter().collect();
    v.require(
        out.participants == expected,
        "invariant: participants must be exactly the two conveyancers",
    );
}

fn validate_approve(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(input, out, AgreementStatus::Created, AgreementStatus::Approved, "approval", v);
    v.require(
        bundle.endorsed_by_exactly(&[input.buyer_conveyancer]),
        "authorization: approval must be endorsed by exactly the buyer conveyancer",
    );
    v.require(
        out.specific_mortgage_terms,
        "invariant: approval settles the buyer's mortgage terms",
    );
    require_unchanged_except(v, input, out, "approval", "status and mortgage terms", |c, old| {
        c.status = old.status;
        c.specific_mortgage_terms = old.specific_mortgage_terms;
    });
}

fn validate_seller_sign(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(input, out, AgreementStatus::Approved, AgreementStatus::Signed, "seller signing", v);
    v.require(
        bundle.endorsed_by_exactly(&[input.seller_conveyancer]),
        "authorization: seller signing must be endorsed by exactly the seller conveyancer",
    );
    v.require(
        out.seller.party == input.seller.party,
        "invariant: signing may not substitute the seller",
    );
    v.require(
        out.seller.signed_title(&out.title_number),
        "signature: the seller's signature does not verify against the title number",
    );
    require_unchanged_except(v, input, out, "seller signing", "status and the seller's signature", |c, old| {
        c.status = old.status;
        c.seller = old.seller.clone();
    });
}

fn validate_buyer_sign(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(input, out, AgreementStatus::Signed, AgreementStatus::Completed, "buyer signing", v);
    v.require(
        bundle.endorsed_by_exactly(&[input.buyer_conveyancer]),
        "authorization: buyer signing must be endorsed by exactly the buyer conveyancer",
    );
    v.require(
        out.buyer.party == input.buyer.party,
        "invariant: signing may not substitute the buyer",
    );
    v.require(
        out.buyer.signed_title(&out.title_number),
        "signature: the buyer's signature does not verify against the title number",
    );
    v.require(
        out.seller.signature == input.seller.signature,
        "invariant: the seller's signature bytes must carry through unchanged",
    );
    require_unchanged_except(v, input, out, "buyer signing", "status and the buyer's signature", |c, old| {
        c.status = old.status;
        c.buyer = old.buyer.clone();
    });
}

fn validate_finalize(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(input, out, AgreementStatus::Completed, AgreementStatus::Transferred, "finalization", v);
    if let Some(title) = expect_one(&bundle.consumed_titles(), "co-consumed land title", v) {
        v.require(
            title.record_id == input.title_id,
            "invariant: finalization must consume the title the agreement references",
        );
        v.require(
            title.title_number == input.title_number,
            "invariant: co-consumed title number mismatch",
        );
        v.require(
            bundle.endorsed_by(&title.issuer),
            "authorization: finalization must be endorsed by the registry",
        );
    }
    v.require(
        bundle.endorsed_by(&input.seller_conveyancer),
        "authorization: finalization must be endorsed by the seller conveyancer",
    );
    v.require(
        bundle.endorsed_by(&input.buyer_conveyancer),
        "authorization: finalization must be endorsed by the buyer conveyancer",
    );
    v.require(
        out.seller.signature == input.seller.signature
            && out.buyer.signature == input.buyer.signature,
        "invariant: both signatures must carry through unchanged",
    );
    require_unchanged_except(v, input, out, "finalization", "status", |c, old| {
        c.status = old.status;
    });
}

// ── Shared helpers ───────────────────────────────────────────────────

fn consumed_produced_pair<'a>(
    bundle: &'a TransitionBundle,
    v: &mut Violations,
) -> Option<(&'a LandAgreement, &'a LandAgreement)> {
    let input = expect_one(&bundle.consumed_agreements(), "consumed sale agreement", v)?;
    let out = expect_one(&bundle.produced_agreements(), "produced sale agreement", v)?;
    v.require(
        input.record_id == out.record_id,
        "invariant: transition must preserve the record identity",
    );
    Some((input, out))
}

fn require_status_move(
    input: &LandAgreement,
    out: &LandAgreement,
    from: AgreementStatus,
    to: AgreementStatus,
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
    use crate::title::{LandTitle, TitleStatus};
    use landreg_core::ValidityWindow;
    use landreg_crypto::KeyPair;

    fn issuer() -> Party {
        Party::of(&KeyPair::from_seed(&[1u8; 32]))
    }

    fn seller_conveyancer() -> Party {
        Party::of(&KeyPair::from_seed(&[2u8; 32]))
    }

    fn seller_key() -> KeyPair {
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

    fn live_title() -> LandTitle {
        LandTitle {
            record_id: RecordId::new(),
            title_number: title_number(),
            issuer: issuer(),
            owner: VerifiedParty::verified(Party::of(&seller_key()))
                .with_signature(seller_key().sign_title(&title_number())),
            owner_conveyancer: seller_conveyancer(),
            owner_lender: lender(),
            buyer: None,
            buyer_conveyancer: None,
            status: TitleStatus::Issued,
            last_sold_value: None,
            charges: BTreeSet::new(),
            restrictions: BTreeSet::new(),
            agreement_id: None,
            participants: [issuer(), seller_conveyancer()].into_iter().collect(),
        }
    }

    fn draft_against(title: &LandTitle) -> LandAgreement {
        LandAgreement {
            record_id: RecordId::new(),
            title_number: title.title_number.clone(),
            title_id: title.record_id,
            buyer: VerifiedParty::verified(Party::of(&buyer_key())),
            seller: VerifiedParty::verified(title.owner.party),
            buyer_conveyancer: buyer_conveyancer(),
            seller_conveyancer: seller_conveyancer(),
            creation_date: Timestamp::parse("2026-03-01T12:00:00Z").unwrap(),
            completion_date: Timestamp::parse("2026-04-01T12:00:00Z").unwrap(),
            purchase_price: Money::gbp(1_000),
            deposit: Money::gbp(50),
            balance: Money::gbp(950),
            specific_mortgage_terms: false,
            payment_id: None,
            status: AgreementStatus::Created,
            participants: [seller_conveyancer(), buyer_conveyancer()].into_iter().collect(),
        }
    }

    fn window() -> ValidityWindow {
        ValidityWindow::new(
            Timestamp::parse("2026-03-01T00:00:00Z").unwrap(),
            Timestamp::parse("2026-03-02T00:00:00Z").unwrap(),
        )
        .unwrap()
    }

    fn draft_bundle(title: LandTitle, draft: LandAgreement) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle.consumed.push(RecordVersion::Title(title));
        bundle.produced.push(RecordVersion::Agreement(draft));
        bundle.actions.push(Action::Agreement(AgreementAction::CreateDraft));
        bundle.endorsers.insert(seller_conveyancer());
        bundle.validity_window = Some(window());
        bundle
    }

    #[test]
    fn test_create_draft_happy_path() {
        let title = live_title();
        let draft = draft_against(&title);
        let bundle = draft_bundle(title, draft);
        validate(&bundle, AgreementAction::CreateDraft).unwrap();
    }

    #[test]
    fn test_create_draft_requires_validity_window() {
        let title = live_title();
        let draft = draft_against(&title);
        let mut bundle = draft_bundle(title, draft);
        bundle.validity_window = None;
        let err = validate(&bundle, AgreementAction::CreateDraft).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("requires a validity window")));
    }

    #[test]
    fn test_create_draft_rejects_stale_creation_date() {
        let title = live_title();
        let mut draft = draft_against(&title);
        draft.creation_date = Timestamp::parse("2026-02-01T12:00:00Z").unwrap();
        let bundle = draft_bundle(title, draft);
        let err = validate(&bundle, AgreementAction::CreateDraft).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("validity window")));
    }

    #[test]
    fn test_create_draft_rejects_creation_after_window_end() {
        let title = live_title();
        let mut draft = draft_against(&title);
        draft.creation_date = Timestamp::parse("2026-03-03T12:00:00Z").unwrap();
        let bundle = draft_bundle(title, draft);
        let err = validate(&bundle, AgreementAction::CreateDraft).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("validity window")));
    }

    #[test]
    fn test_create_draft_rejects_wrong_balance() {
        let title = live_title();
        let mut draft = draft_against(&title);
        draft.balance = Money::gbp(900);
        let bundle = draft_bundle(title, draft);
        let err = validate(&bundle, AgreementAction::CreateDraft).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("price minus deposit")));
    }

    #[test]
    fn test_create_draft_rejects_currency_mismatch() {
        let title = live_title();
        let mut draft = draft_against(&title);
        draft.deposit = Money::usd(50);
        let bundle = draft_bundle(title, draft);
        assert!(validate(&bundle, AgreementAction::CreateDraft).is_err());
    }

    #[test]
    fn test_create_draft_rejects_seller_other_than_owner() {
        let title = live_title();
        let mut draft = draft_against(&title);
        draft.seller = VerifiedParty::verified(Party::of(&KeyPair::from_seed(&[9u8; 32])));
        let bundle = draft_bundle(title, draft);
        let err = validate(&bundle, AgreementAction::CreateDraft).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("registered owner")));
    }

    fn pair_bundle(
        input: LandAgreement,
        out: LandAgreement,
        action: AgreementAction,
        endorsers: &[Party],
    ) -> TransitionBundle {
        let mut bundle = TransitionBundle::new();
        bundle.consumed.push(RecordVersion::Agreement(input));
        bundle.produced.push(RecordVersion::Agreement(out));
        bundle.actions.push(Action::Agreement(action));
        bundle.endorsers.extend(endorsers.iter().copied());
        bundle
    }

    fn approved(input: &LandAgreement) -> LandAgreement {
        let mut out = input.clone();
        out.status = AgreementStatus::Approved;
        out.specific_mortgage_terms = true;
        out
    }

    #[test]
    fn test_approve_happy_path() {
        let input = draft_against(&live_title());
        let out = approved(&input);
        let bundle = pair_bundle(input, out, AgreementAction::Approve, &[buyer_conveyancer()]);
        validate(&bundle, AgreementAction::Approve).unwrap();
    }

    #[test]
    fn test_approve_rejects_seller_conveyancer_endorsement() {
        let input = draft_against(&live_title());
        let out = approved(&input);
        let bundle = pair_bundle(input, out, AgreementAction::Approve, &[seller_conveyancer()]);
        let err = validate(&bundle, AgreementAction::Approve).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("authorization:")));
    }

    #[test]
    fn test_approve_rejects_price_change() {
        let input = draft_against(&live_title());
        let mut out = approved(&input);
        out.purchase_price = Money::gbp(2_000);
        let bundle = pair_bundle(input, out, AgreementAction::Approve, &[buyer_conveyancer()]);
        let err = validate(&bundle, AgreementAction::Approve).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("diff:")));
    }

    fn seller_signed(input: &LandAgreement) -> LandAgreement {
        let mut out = input.clone();
        out.status = AgreementStatus::Signed;
        out.seller = out.seller.with_signature(seller_key().sign_title(&title_number()));
        out
    }

    #[test]
    fn test_seller_sign_happy_path() {
        let input = approved(&draft_against(&live_title()));
        let out = seller_signed(&input);
        let bundle = pair_bundle(input, out, AgreementAction::SellerSign, &[seller_conveyancer()]);
        validate(&bundle, AgreementAction::SellerSign).unwrap();
    }

    #[test]
    fn test_seller_sign_rejects_wrong_key() {
        let input = approved(&draft_against(&live_title()));
        let mut out = input.clone();
        out.status = AgreementStatus::Signed;
        out.seller = out.seller.with_signature(buyer_key().sign_title(&title_number()));
        let bundle = pair_bundle(input, out, AgreementAction::SellerSign, &[seller_conveyancer()]);
        let err = validate(&bundle, AgreementAction::SellerSign).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.starts_with("signature:")));
    }

    fn buyer_signed(input: &LandAgreement) -> LandAgreement {
        let mut out = input.clone();
        out.status = AgreementStatus::Completed;
        out.buyer = out.buyer.with_signature(buyer_key().sign_title(&title_number()));
        out
    }

    #[test]
    fn test_buyer_sign_happy_path() {
        let input = seller_signed(&approved(&draft_against(&live_title())));
        let out = buyer_signed(&input);
        let bundle = pair_bundle(input, out, AgreementAction::BuyerSign, &[buyer_conveyancer()]);
        validate(&bundle, AgreementAction::BuyerSign).unwrap();
    }

    #[test]
    fn test_buyer_sign_rejects_seller_signature_swap() {
        let input = seller_signed(&approved(&draft_against(&live_title())));
        let mut out = buyer_signed(&input);
        out.seller = out.seller.with_signature(buyer_key().sign_title(&title_number()));
        let bundle = pair_bundle(input, out, AgreementAction::BuyerSign, &[buyer_conveyancer()]);
        let err = validate(&bundle, AgreementAction::BuyerSign).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("carry through unchanged")));
    }

    #[test]
    fn test_finalize_happy_path() {
        let title = live_title();
        let input = buyer_signed(&seller_signed(&approved(&draft_against(&title))));
        let mut out = input.clone();
        out.status = AgreementStatus::Transferred;
        let mut bundle = pair_bundle(
            input,
            out,
            AgreementAction::Finalize,
            &[seller_conveyancer(), buyer_conveyancer(), issuer()],
        );
        bundle.consumed.push(RecordVersion::Title(title));
        validate(&bundle, AgreementAction::Finalize).unwrap();
    }

    #[test]
    fn test_finalize_rejects_foreign_title() {
        let title = live_title();
        let input = buyer_signed(&seller_signed(&approved(&draft_against(&title))));
        let mut out = input.clone();
        out.status = AgreementStatus::Transferred;
        let mut foreign = live_title();
        foreign.record_id = RecordId::new();
        let mut bundle = pair_bundle(
            input,
            out,
            AgreementAction::Finalize,
            &[seller_conveyancer(), buyer_conveyancer(), issuer()],
        );
        bundle.consumed.push(RecordVersion::Title(foreign));
        let err = validate(&bundle, AgreementAction::Finalize).unwrap_err();
        assert!(err.reasons().iter().any(|r| r.contains("the title the agreement references")));
    }
}

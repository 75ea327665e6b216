//! # Payment Confirmation
//!
//! Tracks settlement of the purchase price through an escrow holder
//! (the settling party): request for funds, receipt into escrow, and
//! release to the seller on completion.
//!
//! ## States
//!
//! ```text
//! Issue ──▶ ISSUED ──RequestPayment──▶ REQUEST_FOR_PAYMENT
//!                                              │
//!                                    ConfirmEscrowReceipt
//!                                              ▼
//!                          CONFIRM_PAYMENT_RECEIVED_IN_ESCROW
//!                                              │
//!                                    ConfirmFundsReleased
//!                                              ▼
//!                               CONFIRM_FUNDS_RELEASED
//! ```
//!
//! Every field but the status is frozen at issuance: the record moves
//! through its states carrying the agreed terms unchanged.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use landreg_core::{Money, RecordId, TitleNumber};
use landreg_crypto::{Party, VerifiedParty};

use crate::bundle::{expect_none, expect_one, TransitionBundle};
use crate::violation::Violations;

/// Lifecycle state of a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Issued alongside the drafted agreement.
    Issued,
    /// The buyer side has been asked to fund escrow.
    RequestForPayment,
    /// The settling party holds the funds in escrow.
    ConfirmPaymentReceivedInEscrow,
    /// The funds were released to the seller.
    ConfirmFundsReleased,
}

impl PaymentStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "ISSUED",
            Self::RequestForPayment => "REQUEST_FOR_PAYMENT",
            Self::ConfirmPaymentReceivedInEscrow => "CONFIRM_PAYMENT_RECEIVED_IN_ESCROW",
            Self::ConfirmFundsReleased => "CONFIRM_FUNDS_RELEASED",
        }
    }

    /// Whether settlement has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConfirmFundsReleased)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations on a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentAction {
    /// Issue alongside the drafted agreement.
    Issue,
    /// The buyer conveyancer calls for the funds.
    RequestPayment,
    /// The settling party confirms receipt into escrow.
    ConfirmEscrowReceipt,
    /// The funds are released to the seller on completion.
    ConfirmFundsReleased,
}

/// One version of a payment confirmation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Stable record identity across versions.
    pub record_id: RecordId,
    /// The agreement whose price this settles.
    pub agreement_id: RecordId,
    /// The title being bought.
    pub title_number: TitleNumber,
    /// The buyer funding the purchase.
    pub buyer: VerifiedParty,
    /// The seller receiving the funds.
    pub seller: VerifiedParty,
    /// The conveyancer acting for the buyer.
    pub buyer_conveyancer: Party,
    /// The conveyancer acting for the seller.
    pub seller_conveyancer: Party,
    /// The amount being settled.
    pub purchase_price: Money,
    /// The escrow holder.
    pub settling_party: Party,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Identities with visibility of this record.
    pub participants: BTreeSet<Party>,
}

/// Validate a payment-confirmation sub-transition.
pub fn validate(bundle: &TransitionBundle, action: PaymentAction) -> Result<(), Violations> {
    let mut v = Violations::new();

    match action {
        PaymentAction::Issue => validate_issue(bundle, &mut v),
        PaymentAction::RequestPayment => validate_request_payment(bundle, &mut v),
        PaymentAction::ConfirmEscrowReceipt => validate_escrow_receipt(bundle, &mut v),
        PaymentAction::ConfirmFundsReleased => validate_funds_released(bundle, &mut v),
    }
    v.into_result()
}

fn validate_issue(bundle: &TransitionBundle, v: &mut Violations) {
    expect_none(&bundle.consumed_payments(), "consumed payment confirmation", v);
    let Some(out) = expect_one(&bundle.produced_payments(), "produced payment confirmation", v)
    else {
        return;
    };
    v.require(
        out.status == PaymentStatus::Issued,
        format!("invariant: a new payment record must be ISSUED, found {}", out.status),
    );
    // The record mirrors the agreement it settles.
    if let Some(agreement) =
        expect_one(&bundle.produced_agreements(), "co-produced sale agreement", v)
    {
        v.require(
            out.agreement_id == agreement.record_id,
            "invariant: the payment record must reference the co-produced agreement",
        );
        v.require(
            out.title_number == agreement.title_number,
            "invariant: title number must match the agreement's",
        );
        v.require(
            out.buyer.party == agreement.buyer.party,
            "invariant: the buyer must match the agreement's",
        );
        v.require(
            out.seller.party == agreement.seller.party,
            "invariant: the seller must match the agreement's",
        );
        v.require(
            out.buyer_conveyancer == agreement.buyer_conveyancer
                && out.seller_conveyancer == agreement.seller_conveyancer,
            "invariant: conveyancers must match the agreement's",
        );
        v.require(
            out.purchase_price == agreement.purchase_price,
            "invariant: the settled amount must be the agreement's price",
        );
    }
    v.require(
        bundle.endorsed_by_exactly(&[out.seller_conveyancer]),
        "authorization: issuance must be endorsed by exactly the seller conveyancer",
    );
    let expected: BTreeSet<Party> =
        [out.settling_party, out.buyer_conveyancer, out.seller_conveyancer]
            .into_iter()
            .collect();
    v.require(
        out.participants == expected,
        "invariant: participants must be the settling party and both conveyancers",
    );
}

fn validate_request_payment(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        PaymentStatus::Issued,
        PaymentStatus::RequestForPayment,
        "payment request",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.buyer_conveyancer]),
        "authorization: a payment request must be endorsed by exactly the buyer conveyancer",
    );
    require_terms_frozen(input, out, "payment request", v);
}

fn validate_escrow_receipt(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        PaymentStatus::RequestForPayment,
        PaymentStatus::ConfirmPaymentReceivedInEscrow,
        "escrow receipt",
        v,
    );
    v.require(
        bundle.endorsed_by_exactly(&[input.settling_party]),
        "authorization: escrow receipt must be endorsed by exactly the settling party",
    );
    require_terms_frozen(input, out, "escrow receipt", v);
}

fn validate_funds_released(bundle: &TransitionBundle, v: &mut Violations) {
    let Some((input, out)) = consumed_produced_pair(bundle, v) else {
        return;
    };
    require_status_move(
        input,
        out,
        PaymentStatus::ConfirmPaymentReceivedInEscrow,
        PaymentStatus::ConfirmFundsReleased,
        "funds release",
        v,
    );
    // Release happens inside the settlement bundle, alongside the
    // agreement finalization and title transfer.
    if let Some(agreement) =
        expect_one(&bundle.consumed_agreements(), "co-consumed sale agreement", v)
    {
        v.require(
            agreement.record_id == input.agreement_id,
            "invariant: release must settle the agreement the record references",
        );
    }
    if let Some(title) = expect_one(&bundle.consumed_titles(), "co-consumed land title", v) {
        v.require(
            title.title_number == input.title_number,
            "invariant: co-consumed title number mismatch",
        );
        v.require(
            bundle.endorsed_by(&title.issuer),
            "authorization: funds release must be endorsed by the registry",
        );
    }
    v.require(
        bundle.endorsed_by(&input.seller_conveyancer),
        "authorization: funds release must be endorsed by the seller conveyancer",
    );
    v.require(
        bundle.endorsed_by(&input.buyer_conveyancer),
        "authorization: funds release must be endorsed by the buyer conveyancer",
    );
    v.require(
        bundle.endorsed_by(&input.settling_party),
        "authorization: funds release must be endorsed by the settling party",
    );
    require_terms_frozen(input, out, "funds release", v);
}

// ── Shared helpers ───────────────────────────────────────────────────

fn consumed_produced_pair<'a>(
    bundle: &'a TransitionBundle,
    v: &mut Violations,
) -> Option<(&'a PaymentConfirmation, &'a PaymentConfirmation)> {
    let input = expect_one(&bundle.consumed_payments(), "consumed payment confirmation", v)?;
    let out = expect_one(&bundle.produced_payments(), "produced payment confirmation", v)?;
    v.require(
        input.record_id == out.record_id,
        "invariant: transition must preserve the record identity",
    );
    Some((input, out))
}

fn require_status_move(
    input: &PaymentConfirmation,
    out: &PaymentConfirmation,
    from: PaymentStatus,
    to: PaymentStatus,
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

/// Only the status moves after issuance; name the drifting field.
fn require_terms_frozen(
    input: &PaymentConfirmation,
    out: &PaymentConfirmation,
    action: &str,
    v: &mut Violations,
) {
    let drifted = |field: &str| format!("diff: {action} may not change the {field}");
    v.require(out.agreement_id == input.agreement_id, drifted("agreement reference"));
    v.require(out.title_number == input.title_number, drifted("title number"));
    v.require(out.buyer == input.buyer, drifted("buyer"));
    v.require(out.seller == input.seller, drifted("seller"));
    v.require(out.buyer_conveyancer == input.buyer_conveyancer, drifted("buyer conveyancer"));
    v.require(out.seller_conveyancer == input.seller_conveyancer, drifted("seller conveyancer"));
    v.require(out.purchase_price == input.purchase_price, drifted("purchase price"));
    v.require(out.settling_party == input.settling_party, drifted("settling party"));
    v.require(out.participants == input.participants, drifted("participants"));
}

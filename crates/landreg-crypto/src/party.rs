//! # Party Identity Handles
//!
//! `Party` is the opaque identity handle the validators authorize against:
//! a wrapper around an Ed25519 verification key. Endorser and participant
//! sets are `BTreeSet<Party>`, so identity comparison and set membership
//! are byte-wise over the key.
//!
//! `VerifiedParty` is a party as it appears *inside* a record payload,
//! carrying the identity-verification flag and, optionally, a detached
//! signature over the record's title number.

use landreg_core::TitleNumber;
use serde::{Deserialize, Serialize};

use crate::ed25519::{verify_title, KeyPair, PublicKey, Signature};

/// An opaque identity handle wrapping a verification public key.
///
/// Two parties are the same identity iff their keys are byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Party(PublicKey);

impl Party {
    /// Create a party handle from a verification key.
    pub fn from_public_key(key: PublicKey) -> Self {
        Self(key)
    }

    /// The identity handle for a key pair's verification key.
    pub fn of(keys: &KeyPair) -> Self {
        Self(keys.public_key())
    }

    /// The party's verification key.
    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }
}

impl std::fmt::Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key prefix only; full keys make violation messages unreadable.
        let hex: String = self.0.as_bytes().iter().take(4).map(|b| format!("{b:02x}")).collect();
        write!(f, "party:{hex}")
    }
}

/// A party as recorded inside a record payload.
///
/// Carries the KYC identity-verification flag and an optional detached
/// signature. The signature, when present, is always over the record's
/// title number and always verifies against *this* party's key — the
/// payload/key binding is explicit here, never positional.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerifiedParty {
    /// The identity handle.
    pub party: Party,
    /// Whether the party's identity has been verified out of band.
    pub identity_verified: bool,
    /// Detached signature over the record's title number, if given.
    pub signature: Option<Signature>,
}

impl VerifiedParty {
    /// A record party with a verified identity and no signature yet.
    pub fn verified(party: Party) -> Self {
        Self { party, identity_verified: true, signature: None }
    }

    /// A record party whose identity has not been verified.
    pub fn unverified(party: Party) -> Self {
        Self { party, identity_verified: false, signature: None }
    }

    /// Return a copy carrying the given detached signature.
    pub fn with_signature(&self, signature: Signature) -> Self {
        Self { signature: Some(signature), ..self.clone() }
    }

    /// Whether the carried signature verifies over the given title number
    /// against this party's own key.
    ///
    /// Returns `false` when no signature is carried.
    pub fn signed_title(&self, title: &TitleNumber) -> bool {
        match &self.signature {
            Some(sig) => verify_title(title, sig, self.party.public_key()).is_ok(),
            None => false,
        }
    }
}

//! # landreg-crypto — Keys, Signatures, and Party Identities
//!
//! Ed25519 signing and verification for the conveyancing record set, and
//! the `Party` identity handle the validators authorize against.
//!
//! ## Security Invariant
//!
//! The only signable payload in this system is a title number. There is no
//! API for signing arbitrary bytes — `KeyPair::sign_title()` takes a
//! `&TitleNumber`, and `verify_title()` verifies against the same payload.
//! The key that verifies a signature carried inside a record is always the
//! carrying party's key; the binding is explicit in
//! [`party::VerifiedParty::signed_title`], never positional.

pub mod ed25519;
pub mod party;

pub use ed25519::{verify_title, CryptoError, KeyPair, PublicKey, Signature};
pub use party::{Party, VerifiedParty};

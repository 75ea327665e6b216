//! # Ed25519 Signing and Verification
//!
//! Ed25519 key generation, title signing, and verification for detached
//! record signatures.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be a `&TitleNumber` — you cannot sign raw bytes.
//!   Every detached signature in the record set covers the same canonical
//!   payload: the UTF-8 bytes of the normalized title number.
//! - Private keys are never serialized or logged. `KeyPair` does not
//!   implement `Serialize` and its `Debug` redacts the key material.
//! - Signatures are 64-byte blobs compared byte-for-byte; equality is
//!   value equality on the bytes, never reference identity.
//!
//! ## Serde
//!
//! Public keys and signatures serialize/deserialize as lowercase
//! hex-encoded strings.

use ed25519_dalek::{Signer, Verifier};
use landreg_core::TitleNumber;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}

/// An Ed25519 verification key (32 bytes).
///
/// Serializes as a hex-encoded string for JSON interoperability.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; 32]);

/// An Ed25519 detached signature (64 bytes).
///
/// Equality is byte-wise over the full 64 bytes. Serializes as a
/// hex-encoded string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing operations.
///
/// Does not implement `Serialize` — private keys must not be accidentally
/// serialized into logs, responses, or artifacts.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// PublicKey impls
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the public key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a public key from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let hex = hex.trim().to_lowercase();
        if hex.len() != 64 {
            return Err(CryptoError::KeyError(format!(
                "public key hex must be 64 chars, got {}",
                hex.len()
            )));
        }
        let bytes = hex_to_bytes(&hex).map_err(CryptoError::KeyError)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Convert to an `ed25519_dalek::VerifyingKey` for verification.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Signature impls
// ---------------------------------------------------------------------------

impl Signature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Render the signature as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a signature from a 128-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let hex = hex.trim().to_lowercase();
        if hex.len() != 128 {
            return Err(CryptoError::VerificationFailed(format!(
                "signature hex must be 128 chars, got {}",
                hex.len()
            )));
        }
        let bytes = hex_to_bytes(&hex).map_err(CryptoError::VerificationFailed)?;
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// KeyPair impls
// ---------------------------------------------------------------------------

impl KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Self { signing_key }
    }

    /// Create a key pair from a raw 32-byte private key seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// The verification key for this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Produce a detached signature over a title number.
    ///
    /// The payload is the UTF-8 byte rendering of the normalized title
    /// number — the only signable payload in the record set. There is no
    /// way to sign arbitrary bytes through this API.
    pub fn sign_title(&self, title: &TitleNumber) -> Signature {
        let sig = self.signing_key.sign(title.as_bytes());
        Signature(sig.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a detached signature over a title number.
///
/// # Errors
///
/// Returns `CryptoError::VerificationFailed` if the signature does not
/// verify over the title-number bytes under the given key, or
/// `CryptoError::KeyError` if the key bytes are not a valid curve point.
pub fn verify_title(
    title: &TitleNumber,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), CryptoError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(title.as_bytes(), &sig)
        .map_err(|e| CryptoError::VerificationFailed(format!("title signature invalid: {e}")))
}

// ---------------------------------------------------------------------------
// Hex utilities (no external hex crate dependency)
// ---------------------------------------------------------------------------

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("hex string must have even length".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at position {i}: {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title() -> TitleNumber {
        TitleNumber::new("ZQV888860").unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = kp.sign_title(&title());
        verify_title(&title(), &sig, &kp.public_key()).expect("valid signature should verify");
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let kp1 = KeyPair::generate();
        let kp2 = KeyPair::generate();
        let sig = kp1.sign_title(&title());
        assert!(verify_title(&title(), &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn test_verify_wrong_title_fails() {
        let kp = KeyPair::generate();
        let sig = kp.sign_title(&title());
        let other = TitleNumber::new("ABC123456").unwrap();
        assert!(verify_title(&other, &sig, &kp.public_key()).is_err());
    }

    #[test]
    fn test_deterministic_from_seed() {
        let kp1 = KeyPair::from_seed(&[42u8; 32]);
        let kp2 = KeyPair::from_seed(&[42u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.sign_title(&title()), kp2.sign_title(&title()));
    }

    #[test]
    fn test_signature_byte_equality() {
        let kp = KeyPair::from_seed(&[7u8; 32]);
        let a = kp.sign_title(&title());
        let b = Signature::from_bytes(*a.as_bytes());
        // Two independently constructed values with the same bytes are equal.
        assert_eq!(a, b);
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = KeyPair::generate().public_key();
        let hex = pk.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(PublicKey::from_hex(&hex).unwrap(), pk);
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let kp = KeyPair::generate();
        let sig = kp.sign_title(&title());
        let hex = sig.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(Signature::from_hex(&hex).unwrap(), sig);
    }

    #[test]
    fn test_public_key_serde_roundtrip() {
        let pk = KeyPair::generate().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert!(json.starts_with('"'));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let kp = KeyPair::generate();
        let sig = kp.sign_title(&title());
        let json = serde_json::to_string(&sig).unwrap();
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, back);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(PublicKey::from_hex("not-hex").is_err());
        assert!(PublicKey::from_hex(&"zz".repeat(32)).is_err());
        assert!(Signature::from_hex("aabb").is_err());
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let kp = KeyPair::generate();
        let debug = format!("{kp:?}");
        assert_eq!(debug, "KeyPair(<private>)");
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::keys::{KeyError, PublicKey};

/// Signing scheme tag carried alongside public key material.
///
/// Ed25519 is the only scheme the engine ships, but the tag is part of the
/// wire format so that key ids stay stable if other schemes are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    Ed25519,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureScheme::Ed25519 => write!(f, "ed25519"),
        }
    }
}

/// Identifier of a public key, derived from the key material itself.
///
/// The id is the hex SHA-256 of the canonical encoding of the [`Key`]
/// record, so it cannot be chosen independently of the key it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // abbreviated for log lines; the full id is 64 hex chars, but ids
        // from the wire are arbitrary strings, so stay on char boundaries
        write!(f, "{}", self.0.get(..8).unwrap_or(&self.0))
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId(s.to_string())
    }
}

/// Public key record as distributed in root and delegation metadata.
///
/// Carries only public material; verification resolves it to a
/// [`PublicKey`] on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// Signing scheme this key is used with.
    pub scheme: SignatureScheme,
    /// Hex-encoded public key bytes.
    pub public: String,
}

impl Key {
    /// Build a key record from an Ed25519 public key.
    pub fn from_public(public: &PublicKey) -> Self {
        Key {
            scheme: SignatureScheme::Ed25519,
            public: public.to_hex(),
        }
    }

    /// Derive this key's identifier.
    ///
    /// Hashes the canonical encoding of the record, which is deterministic
    /// because the record has a fixed field order and hex-encoded material.
    pub fn key_id(&self) -> KeyId {
        let encoded = serde_json::to_vec(self).expect("key record serializes");
        let digest = Sha256::digest(&encoded);
        KeyId(hex::encode(digest))
    }

    /// Resolve the record to a verifying key.
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_hex(&self.public)
    }
}

/// A detached signature and the key id that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Id of the key (listed in root or delegation metadata) that signed.
    pub keyid: KeyId,
    /// Hex-encoded Ed25519 signature over the canonical payload bytes.
    pub sig: String,
}

impl Signature {
    /// Decode the hex signature into the dalek representation.
    pub fn to_ed25519(&self) -> Result<ed25519_dalek::Signature, KeyError> {
        let bytes = hex::decode(&self.sig).map_err(|_| KeyError::HexDecode { what: "signature" })?;
        let arr: [u8; 64] = bytes.as_slice().try_into().map_err(|_| KeyError::InvalidSize {
            what: "signature",
            expected: 64,
            got: bytes.len(),
        })?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn test_key_id_is_stable() {
        let secret = SecretKey::generate();
        let key = Key::from_public(&secret.public());
        assert_eq!(key.key_id(), key.key_id());
        assert_eq!(key.key_id().as_str().len(), 64);
    }

    #[test]
    fn test_key_id_display_abbreviates() {
        let id = KeyId::from("deadbeefdeadbeef");
        assert_eq!(format!("{id}"), "deadbeef");
        // ids arrive from the wire and need not be hex or even ascii
        let odd = KeyId::from("€€€€");
        assert_eq!(format!("{odd}"), "€€€€");
        let short = KeyId::from("ab");
        assert_eq!(format!("{short}"), "ab");
    }

    #[test]
    fn test_distinct_keys_distinct_ids() {
        let a = Key::from_public(&SecretKey::generate().public());
        let b = Key::from_public(&SecretKey::generate().public());
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn test_key_resolves_to_public() {
        let secret = SecretKey::generate();
        let key = Key::from_public(&secret.public());
        let public = key.public_key().unwrap();
        assert_eq!(public.to_bytes(), secret.public().to_bytes());
    }
}

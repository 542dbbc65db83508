use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Size of Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("hex decode error for {what}")]
    HexDecode { what: &'static str },
    #[error("invalid {what} size, expected {expected}, got {got}")]
    InvalidSize {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid public key bytes")]
    InvalidKey,
    #[error("failed to parse PEM: {0}")]
    Pem(String),
    #[error("invalid PEM tag, expected PRIVATE KEY")]
    PemTag,
}

/// Public half of an Ed25519 keypair used to check metadata signatures
///
/// A thin wrapper around `ed25519_dalek::VerifyingKey`. Roles never embed
/// this type directly; they carry the serializable [`Key`](super::Key)
/// record and resolve it to a `PublicKey` at verification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl Deref for PublicKey {
    type Target = ed25519_dalek::VerifyingKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<ed25519_dalek::VerifyingKey> for PublicKey {
    fn from(key: ed25519_dalek::VerifyingKey) -> Self {
        PublicKey(key)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(KeyError::InvalidSize {
                what: "public key",
                expected: PUBLIC_KEY_SIZE,
                got: bytes.len(),
            });
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        let key = ed25519_dalek::VerifyingKey::from_bytes(&buff)
            .map_err(|_| KeyError::InvalidKey)?;
        Ok(PublicKey(key))
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| KeyError::HexDecode { what: "public key" })?;
        Self::try_from(&buff[..])
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not verify for this key.
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify_strict(msg, signature)
    }
}

/// Secret half of an Ed25519 keypair used to sign role metadata
///
/// This key should be kept offline for root and may live on a signing host
/// for the volatile roles (timestamp, snapshot). Persist it as PEM; never
/// embed it in metadata.
#[derive(Debug, Clone)]
pub struct SecretKey(ed25519_dalek::SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&secret))
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PRIVATE_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| KeyError::HexDecode { what: "private key" })?;
        Ok(Self::from(buff))
    }

    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert secret key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Encode secret key in PEM format for secure storage
    ///
    /// Returns a PEM-encoded string with tag "PRIVATE KEY".
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_bytes().to_vec());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "PRIVATE KEY"
    /// - The key size is incorrect
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| KeyError::Pem(e.to_string()))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(KeyError::PemTag);
        }

        let contents = pem.contents();
        if contents.len() != PRIVATE_KEY_SIZE {
            return Err(KeyError::InvalidSize {
                what: "private key",
                expected: PRIVATE_KEY_SIZE,
                got: contents.len(),
            });
        }

        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self::from(bytes))
    }

    /// Sign a message with this secret key using Ed25519.
    ///
    /// Returns a detached signature that can be verified with the
    /// corresponding public key.
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        use ed25519_dalek::Signer;
        self.0.sign(msg)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Key;

    #[test]
    fn test_hex_round_trip() {
        let secret = SecretKey::generate();
        let recovered = SecretKey::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(secret.to_bytes(), recovered.to_bytes());

        let public = secret.public();
        let recovered = PublicKey::from_hex(&public.to_hex()).unwrap();
        assert_eq!(public.to_bytes(), recovered.to_bytes());
    }

    #[test]
    fn test_pem_round_trip_preserves_key_id() {
        let secret = SecretKey::generate();
        let recovered = SecretKey::from_pem(&secret.to_pem()).unwrap();
        assert_eq!(secret.to_bytes(), recovered.to_bytes());

        // a key reloaded from its PEM file must still be recognized under
        // the id that root metadata lists for it
        assert_eq!(
            Key::from_public(&secret.public()).key_id(),
            Key::from_public(&recovered.public()).key_id()
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let secret = SecretKey::generate();
        let public = secret.public();
        let payload = br#"{"_type":"timestamp","version":1}"#;

        let signature = secret.sign(payload);
        assert!(public.verify(payload, &signature).is_ok());

        // a different payload or a different key does not verify
        assert!(public.verify(b"{}", &signature).is_err());
        let other = SecretKey::generate().public();
        assert!(other.verify(payload, &signature).is_err());
    }
}

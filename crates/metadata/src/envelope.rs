//! # Envelope
//!
//! An envelope pairs one signed role payload with its collected signatures.
//! It owns the signing entry point and the wire encoding:
//!
//! - **Signing** computes an Ed25519 signature over the canonical payload
//!   bytes and appends it, replacing any prior signature from the same key
//! - **Wire format** is JSON: `{ "signed": { "_type": ..., ... },
//!   "signatures": [ { "keyid", "sig" }, ... ] }`
//! - **Trust** is decided by the threshold verifier against a root's role
//!   definitions, never by the envelope alone

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Key, KeyId, SecretKey, Signature};
use crate::error::Result;
use crate::role::RoleSigned;
use crate::verify;

/// A signed role payload plus its collected signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The role payload the signatures cover.
    pub signed: RoleSigned,
    /// Collected signatures, at most one per key id.
    pub signatures: Vec<Signature>,
}

impl Envelope {
    /// Wrap an unsigned payload.
    pub fn new(signed: RoleSigned) -> Self {
        Envelope {
            signed,
            signatures: Vec::new(),
        }
    }

    /// The canonical byte encoding of the payload, used as the signed
    /// message.
    ///
    /// Deterministic because every map in a payload is ordered and struct
    /// fields serialize in declaration order.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.signed)?)
    }

    /// Sign the payload and collect the signature.
    ///
    /// Re-signing with the same key replaces the prior signature rather
    /// than accumulating, so an envelope never carries two signatures from
    /// one key id. The secret is borrowed only for this computation.
    pub fn sign(&mut self, secret: &SecretKey) -> Result<KeyId> {
        let keyid = Key::from_public(&secret.public()).key_id();
        let message = self.canonical_bytes()?;
        let sig = secret.sign(&message);
        self.signatures.retain(|s| s.keyid != keyid);
        self.signatures.push(Signature {
            keyid: keyid.clone(),
            sig: hex::encode(sig.to_bytes()),
        });
        tracing::debug!(role = %self.signed.role_type(), keyid = %keyid, "signed payload");
        Ok(keyid)
    }

    /// Whether this envelope meets the named role's threshold under `root`.
    ///
    /// See [`verify::verify_envelope`] for the counting rules.
    pub fn is_trusted(
        &self,
        root: &crate::role::Root,
        role_name: &str,
        now: DateTime<Utc>,
    ) -> bool {
        verify::verify_envelope(self, root, role_name, now).is_ok()
    }

    /// Encode to the wire format (human-readable JSON).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode from the wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

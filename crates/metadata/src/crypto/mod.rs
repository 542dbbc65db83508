//! Cryptographic primitives for the trust engine
//!
//! This module provides the signing foundation for role metadata:
//!
//! - **Keypairs**: Ed25519 (`SecretKey`/`PublicKey`) for producing and
//!   checking detached signatures over canonical payload bytes
//! - **Key records**: the public-only [`Key`] form that root metadata
//!   distributes, with its deterministically derived [`KeyId`]
//! - **Signatures**: the `{keyid, sig}` pairs carried by an envelope
//!
//! # Security Model
//!
//! Private material never appears in metadata. Roles reference keys only by
//! [`KeyId`], which is the SHA-256 of the canonical encoding of the public
//! key record, so an id cannot be chosen independently of the key it names.
//! A `SecretKey` is handed to the signing entry point for the duration of
//! one signature computation and is not retained.

mod key;
mod keys;

pub use key::{Key, KeyId, Signature, SignatureScheme};
pub use keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

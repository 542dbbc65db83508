//! Error types for metadata construction and verification.

use crate::crypto::KeyId;

/// Errors that can occur while building or verifying role metadata.
///
/// Every failure mode is surfaced to the caller as a distinct variant; nothing
/// is absorbed and the core never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// A role threshold outside `1 ..= |keyids|`
    #[error("invalid threshold {threshold} for role '{role}' with {keyids} key(s)")]
    InvalidThreshold {
        role: String,
        threshold: u32,
        keyids: usize,
    },

    /// A key was added twice to the same role
    #[error("duplicate key {keyid} for role '{role}'")]
    DuplicateKey { role: String, keyid: KeyId },

    /// A key id was referenced that the role does not hold
    #[error("unknown key {keyid} for role '{role}'")]
    UnknownKey { role: String, keyid: KeyId },

    /// A role name was referenced that root does not define
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// A target path that is empty or not in normalized form
    #[error("invalid target path '{0}'")]
    InvalidPath(String),

    /// A version went backwards where monotonicity is required
    #[error("rollback: version {new} is older than trusted version {current}")]
    Rollback { current: u64, new: u64 },

    /// Metadata whose expiry is not after the verification clock
    #[error("metadata for role '{role}' expired at {expires}")]
    Expired {
        role: String,
        expires: chrono::DateTime<chrono::Utc>,
    },

    /// Fewer distinct valid signatures than the role's threshold
    #[error("signature threshold not met for role '{role}': need {required}, got {valid}")]
    VerificationFailure {
        role: String,
        required: u32,
        valid: u32,
    },

    /// A candidate root that fails the dual-threshold rotation rule
    #[error("root rotation to version {candidate} rejected: {reason}")]
    Rotation { candidate: u64, reason: String },

    /// A delegation chain that revisits a role
    #[error("delegation cycle through role '{0}'")]
    DelegationCycle(String),

    /// A delegation chain deeper than the recursion cap
    #[error("delegation depth exceeded (max {0})")]
    DelegationDepthExceeded(usize),

    /// No role in the delegation graph claims the path
    #[error("target '{0}' not found in any trusted role")]
    TargetNotFound(String),

    /// A delegation path pattern that is not a valid glob
    #[error("invalid path pattern '{0}'")]
    InvalidPattern(String),

    /// Canonical encoding or wire decoding failure
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Malformed key or signature material
    #[error("key error: {0}")]
    Key(#[from] crate::crypto::KeyError),
}

/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

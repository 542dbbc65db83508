//! # Threshold verification
//!
//! Decides whether an envelope is trusted: an envelope is TRUSTED only if
//! the count of distinct, cryptographically valid signatures from keys in
//! the role's authorized set meets the role's threshold, and the payload has
//! not expired at the verification clock reading.
//!
//! Counting rules:
//!
//! - signatures whose key id is not in the role's authorized set, or whose
//!   key root does not distribute, are ignored: they neither fail
//!   verification nor count toward the threshold
//! - at most one valid signature counts per distinct key id
//! - malformed or non-verifying signatures simply do not count
//!
//! Root is special-cased twice: bootstrap (a root vouching for itself when
//! trust is first established out of band) and rotation (the dual-threshold
//! rule for replacing the anchor). These are distinct entry points rather
//! than recursion through the generic path.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::crypto::{Key, KeyId};
use crate::envelope::Envelope;
use crate::error::{MetadataError, Result};
use crate::role::{Role, RoleSigned, RoleType, Root};

/// Count distinct valid signatures on `envelope` from keys authorized by
/// `role`, resolving key material from `keys`.
pub(crate) fn count_valid(
    envelope: &Envelope,
    role: &Role,
    keys: &BTreeMap<KeyId, Key>,
) -> Result<u32> {
    let message = envelope.canonical_bytes()?;
    let mut counted: BTreeSet<&KeyId> = BTreeSet::new();
    for signature in &envelope.signatures {
        if counted.contains(&signature.keyid) {
            continue;
        }
        if !role.holds(&signature.keyid) {
            // unauthorized signer: ignored, not an error
            continue;
        }
        let Some(key) = keys.get(&signature.keyid) else {
            // authorized id with no distributed key material
            continue;
        };
        let Ok(public) = key.public_key() else {
            continue;
        };
        let Ok(sig) = signature.to_ed25519() else {
            continue;
        };
        if public.verify(&message, &sig).is_ok() {
            counted.insert(&signature.keyid);
        }
    }
    Ok(counted.len() as u32)
}

/// Reject the envelope if its payload has expired at `now`.
fn check_expiry(envelope: &Envelope, role_name: &str, now: DateTime<Utc>) -> Result<()> {
    let expires = envelope.signed.expires();
    if expires <= now {
        return Err(MetadataError::Expired {
            role: role_name.to_string(),
            expires,
        });
    }
    Ok(())
}

/// Verify an envelope against the named role definition in `root`.
///
/// Returns the number of valid signatures counted. Expiry dominates: an
/// expired payload is rejected no matter how many valid signatures it
/// carries.
pub fn verify_envelope(
    envelope: &Envelope,
    root: &Root,
    role_name: &str,
    now: DateTime<Utc>,
) -> Result<u32> {
    check_expiry(envelope, role_name, now)?;
    let role = root.role(role_name)?;
    let valid = count_valid(envelope, role, &root.keys)?;
    if valid < role.threshold {
        tracing::warn!(
            role = role_name,
            required = role.threshold,
            valid,
            "signature threshold not met"
        );
        return Err(MetadataError::VerificationFailure {
            role: role_name.to_string(),
            required: role.threshold,
            valid,
        });
    }
    Ok(valid)
}

/// Verify an envelope against an explicit role definition and key set.
///
/// Used for delegated targets roles, whose authority comes from the
/// delegating edge rather than from root's role map.
pub fn verify_delegate(
    envelope: &Envelope,
    role_name: &str,
    role: &Role,
    keys: &BTreeMap<KeyId, Key>,
    now: DateTime<Utc>,
) -> Result<u32> {
    check_expiry(envelope, role_name, now)?;
    let valid = count_valid(envelope, role, keys)?;
    if valid < role.threshold {
        return Err(MetadataError::VerificationFailure {
            role: role_name.to_string(),
            required: role.threshold,
            valid,
        });
    }
    Ok(valid)
}

/// Establish initial trust in a root envelope obtained out of band.
///
/// The root vouches for itself: its signatures are checked against its own
/// `"root"` role entry. This is the bootstrap case only; moving from one
/// trusted root to the next goes through [`verify_root_rotation`].
pub fn verify_root_bootstrap(envelope: &Envelope, now: DateTime<Utc>) -> Result<Root> {
    let RoleSigned::Root(ref root) = envelope.signed else {
        return Err(MetadataError::UnknownRole(
            envelope.signed.role_type().to_string(),
        ));
    };
    root.validate()?;
    verify_envelope(envelope, root, RoleType::Root.as_str(), now)?;
    Ok(root.clone())
}

/// Verify a candidate next root under the dual-threshold rotation rule.
///
/// Accepting candidate version `N+1` requires BOTH:
///
/// (a) a threshold of signatures valid under the *old* root's `"root"`
///     role, so holders of new keys alone cannot self-install, AND
/// (b) a threshold of signatures valid under the candidate's own `"root"`
///     role, so a quorum of old keys alone cannot hand trust to keys that
///     never signed.
///
/// Both are evaluated independently over the same signature set. On any
/// failure the old root remains the active trust anchor; on success the
/// accepted candidate is returned as the new anchor.
pub fn verify_root_rotation(
    old_root: &Root,
    candidate: &Envelope,
    now: DateTime<Utc>,
) -> Result<Root> {
    let RoleSigned::Root(ref new_root) = candidate.signed else {
        return Err(MetadataError::Rotation {
            candidate: candidate.signed.version(),
            reason: format!("payload is {}, not root", candidate.signed.role_type()),
        });
    };
    if new_root.version <= old_root.version {
        return Err(MetadataError::Rollback {
            current: old_root.version,
            new: new_root.version,
        });
    }
    new_root.validate()?;
    check_expiry(candidate, RoleType::Root.as_str(), now)?;

    let root_name = RoleType::Root.as_str();
    let old_role = old_root.role(root_name)?;
    let new_role = new_root.role(root_name)?;

    let valid_old = count_valid(candidate, old_role, &old_root.keys)?;
    if valid_old < old_role.threshold {
        return Err(MetadataError::Rotation {
            candidate: new_root.version,
            reason: format!(
                "outgoing root threshold not met: need {}, got {}",
                old_role.threshold, valid_old
            ),
        });
    }

    let valid_new = count_valid(candidate, new_role, &new_root.keys)?;
    if valid_new < new_role.threshold {
        return Err(MetadataError::Rotation {
            candidate: new_root.version,
            reason: format!(
                "incoming root threshold not met: need {}, got {}",
                new_role.threshold, valid_new
            ),
        });
    }

    tracing::debug!(
        from = old_root.version,
        to = new_root.version,
        "root rotation accepted"
    );
    Ok(new_root.clone())
}

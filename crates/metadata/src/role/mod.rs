//! Role payloads for the four top-level trust roles
//!
//! Every metadata file carries exactly one signed payload:
//!
//! - **Root** — the trust anchor: which keys exist, which roles they may
//!   sign for, and each role's signature threshold
//! - **Targets** — integrity: the protected files, their lengths and
//!   digests, plus optional delegation of path authority to further roles
//! - **Snapshot** — consistency: the latest version of every targets
//!   metadata file, pinning the repository to one point in time
//! - **Timestamp** — freshness: the latest snapshot version under a short
//!   expiry, so stale repositories are detected
//!
//! The payloads share `spec_version`/`version`/`expires` but differ in
//! shape; [`RoleSigned`] is the tagged union dispatched on the `_type`
//! field.

mod root;
mod snapshot;
mod targets;
mod timestamp;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::KeyId;
use crate::error::{MetadataError, Result};

pub use root::Root;
pub use snapshot::{MetaFile, Snapshot};
pub use targets::{normalize_path, DelegatedRole, Delegations, TargetFile, Targets};
pub use timestamp::Timestamp;

/// Version of the metadata format carried in every payload.
pub const SPEC_VERSION: &str = "1.0.0";

/// Flag freshly minted metadata whose expiry is already in the past.
///
/// Constructors stay infallible and clock-free in their results;
/// verification is where expiry actually rejects. This catches the
/// maintainer mistake at the source instead of at the first client.
pub(crate) fn warn_if_born_expired(role: RoleType, expires: DateTime<Utc>) {
    if expires <= Utc::now() {
        tracing::warn!(%role, %expires, "metadata created already expired");
    }
}

/// The four top-level role kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    Root,
    Targets,
    Snapshot,
    Timestamp,
}

impl RoleType {
    /// The role's name as it appears in root's role map and in filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::Root => "root",
            RoleType::Targets => "targets",
            RoleType::Snapshot => "snapshot",
            RoleType::Timestamp => "timestamp",
        }
    }

}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keys authorized for a role and how many of them must sign.
///
/// Invariant: `1 <= threshold <= keyids.len()`, checked at construction and
/// on every mutation. `keyids` is an ordered set; duplicates are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Ids of the keys authorized to sign for this role.
    pub keyids: Vec<KeyId>,
    /// Minimum number of distinct authorized-key signatures required.
    pub threshold: u32,
}

impl Role {
    /// Create a role definition, rejecting duplicate key ids and thresholds
    /// outside `1 ..= keyids.len()`.
    pub fn new(name: &str, keyids: Vec<KeyId>, threshold: u32) -> Result<Self> {
        for (i, keyid) in keyids.iter().enumerate() {
            if keyids[..i].contains(keyid) {
                return Err(MetadataError::DuplicateKey {
                    role: name.to_string(),
                    keyid: keyid.clone(),
                });
            }
        }
        let role = Role { keyids, threshold };
        role.check_threshold(name)?;
        Ok(role)
    }

    /// Whether the given key id is authorized for this role.
    pub fn holds(&self, keyid: &KeyId) -> bool {
        self.keyids.contains(keyid)
    }

    /// Add a key id if absent. Returns whether it was newly added.
    pub(crate) fn insert_keyid(&mut self, keyid: KeyId) -> bool {
        if self.holds(&keyid) {
            return false;
        }
        self.keyids.push(keyid);
        true
    }

    /// Remove a key id, failing if the role does not hold it or if removal
    /// would drop the key count below the threshold.
    pub(crate) fn remove_keyid(&mut self, name: &str, keyid: &KeyId) -> Result<()> {
        let pos = self
            .keyids
            .iter()
            .position(|k| k == keyid)
            .ok_or_else(|| MetadataError::UnknownKey {
                role: name.to_string(),
                keyid: keyid.clone(),
            })?;
        if self.keyids.len() as u32 - 1 < self.threshold {
            return Err(MetadataError::InvalidThreshold {
                role: name.to_string(),
                threshold: self.threshold,
                keyids: self.keyids.len() - 1,
            });
        }
        self.keyids.remove(pos);
        Ok(())
    }

    pub(crate) fn set_threshold(&mut self, name: &str, threshold: u32) -> Result<()> {
        let updated = Role {
            keyids: self.keyids.clone(),
            threshold,
        };
        updated.check_threshold(name)?;
        self.threshold = threshold;
        Ok(())
    }

    fn check_threshold(&self, name: &str) -> Result<()> {
        if self.threshold < 1 || self.threshold as usize > self.keyids.len() {
            return Err(MetadataError::InvalidThreshold {
                role: name.to_string(),
                threshold: self.threshold,
                keyids: self.keyids.len(),
            });
        }
        Ok(())
    }
}

/// The signed payload of a metadata envelope, one variant per role kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_type", rename_all = "lowercase")]
pub enum RoleSigned {
    Root(Root),
    Targets(Targets),
    Snapshot(Snapshot),
    Timestamp(Timestamp),
}

impl RoleSigned {
    pub fn role_type(&self) -> RoleType {
        match self {
            RoleSigned::Root(_) => RoleType::Root,
            RoleSigned::Targets(_) => RoleType::Targets,
            RoleSigned::Snapshot(_) => RoleType::Snapshot,
            RoleSigned::Timestamp(_) => RoleType::Timestamp,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            RoleSigned::Root(r) => r.version,
            RoleSigned::Targets(t) => t.version,
            RoleSigned::Snapshot(s) => s.version,
            RoleSigned::Timestamp(t) => t.version,
        }
    }

    pub fn expires(&self) -> DateTime<Utc> {
        match self {
            RoleSigned::Root(r) => r.expires,
            RoleSigned::Targets(t) => t.expires,
            RoleSigned::Snapshot(s) => s.expires,
            RoleSigned::Timestamp(t) => t.expires,
        }
    }

    /// Increment the payload version, as done once per publish cycle.
    pub fn bump_version(&mut self) {
        match self {
            RoleSigned::Root(r) => r.version += 1,
            RoleSigned::Targets(t) => t.version += 1,
            RoleSigned::Snapshot(s) => s.version += 1,
            RoleSigned::Timestamp(t) => t.version += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Key, SecretKey};

    fn keyid() -> KeyId {
        Key::from_public(&SecretKey::generate().public()).key_id()
    }

    #[test]
    fn test_role_threshold_bounds() {
        let ids = vec![keyid(), keyid()];
        assert!(Role::new("targets", ids.clone(), 0).is_err());
        assert!(Role::new("targets", ids.clone(), 3).is_err());
        assert!(Role::new("targets", ids.clone(), 1).is_ok());
        assert!(Role::new("targets", ids, 2).is_ok());
    }

    #[test]
    fn test_role_rejects_duplicate_keyids() {
        let id = keyid();
        let err = Role::new("snapshot", vec![id.clone(), id], 1).unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateKey { .. }));
    }

    #[test]
    fn test_remove_keyid_respects_threshold() {
        let ids = vec![keyid(), keyid()];
        let mut role = Role::new("root", ids.clone(), 2).unwrap();
        // removal would leave 1 key under a threshold of 2
        assert!(role.remove_keyid("root", &ids[0]).is_err());
        role.set_threshold("root", 1).unwrap();
        assert!(role.remove_keyid("root", &ids[0]).is_ok());
        assert!(!role.holds(&ids[0]));
    }

    #[test]
    fn test_remove_unknown_keyid() {
        let mut role = Role::new("root", vec![keyid()], 1).unwrap();
        let err = role.remove_keyid("root", &keyid()).unwrap_err();
        assert!(matches!(err, MetadataError::UnknownKey { .. }));
    }
}

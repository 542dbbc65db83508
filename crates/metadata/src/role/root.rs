//! The root role: trust anchor for every other role.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{Key, KeyId};
use crate::error::{MetadataError, Result};

use super::{Role, RoleType, SPEC_VERSION};

/// Root metadata payload.
///
/// Maps keys to roles (who may sign what, and how many of them must) and
/// distributes the public key material those signatures resolve against.
/// Root authorizes its own re-signing through its `"root"` role entry; key
/// revocation and replacement, including for root itself, happen by
/// publishing a new root version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    /// Metadata format version.
    pub spec_version: String,
    /// Monotonically increasing metadata version.
    pub version: u64,
    /// Instant after which this root is no longer trusted.
    pub expires: DateTime<Utc>,
    /// Whether the repository publishes immutable versioned filenames.
    pub consistent_snapshot: bool,
    /// All public keys referenced by the role map, by key id.
    pub keys: BTreeMap<KeyId, Key>,
    /// Role definitions by role name. Must contain a `"root"` entry.
    pub roles: BTreeMap<String, Role>,
}

impl Root {
    /// Create an empty version-1 root.
    ///
    /// The result is not yet valid metadata: at least one key must be added
    /// for each top-level role (in particular `"root"`) before signing.
    pub fn new(expires: DateTime<Utc>, consistent_snapshot: bool) -> Self {
        super::warn_if_born_expired(RoleType::Root, expires);
        Root {
            spec_version: SPEC_VERSION.to_string(),
            version: 1,
            expires,
            consistent_snapshot,
            keys: BTreeMap::new(),
            roles: BTreeMap::new(),
        }
    }

    /// Register a key as authorized for the named role.
    ///
    /// Idempotent by key id: re-adding the same key to the same role is a
    /// no-op. The first key added to an unknown role creates that role's
    /// entry with a threshold of 1; raise it with [`Root::set_threshold`].
    ///
    /// Returns the derived key id.
    pub fn add_key(&mut self, role_name: &str, key: Key) -> Result<KeyId> {
        let keyid = key.key_id();
        self.keys.entry(keyid.clone()).or_insert(key);
        match self.roles.get_mut(role_name) {
            Some(role) => {
                role.insert_keyid(keyid.clone());
            }
            None => {
                let role = Role::new(role_name, vec![keyid.clone()], 1)?;
                self.roles.insert(role_name.to_string(), role);
            }
        }
        Ok(keyid)
    }

    /// Withdraw a key's authorization for the named role.
    ///
    /// The key record itself is dropped from `keys` once no role references
    /// it. Fails with `UnknownKey` if the role does not hold the key, and
    /// with `InvalidThreshold` if removal would leave fewer keys than the
    /// role's threshold requires.
    pub fn remove_key(&mut self, role_name: &str, keyid: &KeyId) -> Result<()> {
        let role = self
            .roles
            .get_mut(role_name)
            .ok_or_else(|| MetadataError::UnknownRole(role_name.to_string()))?;
        role.remove_keyid(role_name, keyid)?;
        let still_referenced = self.roles.values().any(|r| r.holds(keyid));
        if !still_referenced {
            self.keys.remove(keyid);
        }
        Ok(())
    }

    /// Set the named role's signature threshold.
    ///
    /// Fails with `InvalidThreshold` unless `1 <= n <= |keyids|`.
    pub fn set_threshold(&mut self, role_name: &str, threshold: u32) -> Result<()> {
        let role = self
            .roles
            .get_mut(role_name)
            .ok_or_else(|| MetadataError::UnknownRole(role_name.to_string()))?;
        role.set_threshold(role_name, threshold)
    }

    /// Look up a role definition by name.
    pub fn role(&self, role_name: &str) -> Result<&Role> {
        self.roles
            .get(role_name)
            .ok_or_else(|| MetadataError::UnknownRole(role_name.to_string()))
    }

    /// Look up a distributed key by id.
    pub fn key(&self, keyid: &KeyId) -> Option<&Key> {
        self.keys.get(keyid)
    }

    /// Structural validity check, run before signing or trusting a root.
    ///
    /// Requires a self-referential `"root"` role entry, thresholds within
    /// bounds for every role, and every referenced key id present in the
    /// key map.
    pub fn validate(&self) -> Result<()> {
        if !self.roles.contains_key(RoleType::Root.as_str()) {
            return Err(MetadataError::UnknownRole(RoleType::Root.as_str().into()));
        }
        for (name, role) in &self.roles {
            if role.threshold < 1 || role.threshold as usize > role.keyids.len() {
                return Err(MetadataError::InvalidThreshold {
                    role: name.clone(),
                    threshold: role.threshold,
                    keyids: role.keyids.len(),
                });
            }
            for keyid in &role.keyids {
                if !self.keys.contains_key(keyid) {
                    return Err(MetadataError::UnknownKey {
                        role: name.clone(),
                        keyid: keyid.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretKey;
    use chrono::Duration;

    fn new_key() -> Key {
        Key::from_public(&SecretKey::generate().public())
    }

    fn root() -> Root {
        Root::new(Utc::now() + Duration::days(365), true)
    }

    #[test]
    fn test_add_key_is_idempotent() {
        let mut root = root();
        let key = new_key();
        let id1 = root.add_key("root", key.clone()).unwrap();
        let id2 = root.add_key("root", key).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(root.role("root").unwrap().keyids.len(), 1);
        assert_eq!(root.keys.len(), 1);
    }

    #[test]
    fn test_key_shared_across_roles_survives_single_removal() {
        let mut root = root();
        let key = new_key();
        let id = root.add_key("root", key.clone()).unwrap();
        root.add_key("targets", key).unwrap();
        // drop a second root key in so removal doesn't violate the threshold
        root.add_key("root", new_key()).unwrap();
        root.remove_key("root", &id).unwrap();
        // still referenced by targets, so the record stays distributed
        assert!(root.key(&id).is_some());
        root.remove_key("targets", &new_key().key_id()).unwrap_err();
    }

    #[test]
    fn test_set_threshold_bounds() {
        let mut root = root();
        root.add_key("root", new_key()).unwrap();
        root.add_key("root", new_key()).unwrap();
        assert!(root.set_threshold("root", 2).is_ok());
        assert!(root.set_threshold("root", 3).is_err());
        assert!(root.set_threshold("root", 0).is_err());
        assert!(root.set_threshold("nonexistent", 1).is_err());
    }

    #[test]
    fn test_validate_requires_root_entry() {
        let mut root = root();
        assert!(root.validate().is_err());
        root.add_key("root", new_key()).unwrap();
        assert!(root.validate().is_ok());
    }
}

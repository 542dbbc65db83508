//! The targets role: integrity for the protected files, plus delegation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::{Key, KeyId};
use crate::error::{MetadataError, Result};

use super::{Role, RoleType, SPEC_VERSION};

/// Integrity record for one protected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFile {
    /// File length in bytes.
    pub length: u64,
    /// Digests by hash algorithm name, hex encoded.
    pub hashes: BTreeMap<String, String>,
}

impl TargetFile {
    /// Build an integrity record from file contents, digesting with SHA-256.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        TargetFile {
            length: bytes.len() as u64,
            hashes: BTreeMap::from([("sha256".to_string(), hex::encode(digest))]),
        }
    }

    /// Check candidate bytes against this record.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        if bytes.len() as u64 != self.length {
            return false;
        }
        match self.hashes.get("sha256") {
            Some(expected) => hex::encode(Sha256::digest(bytes)) == *expected,
            None => false,
        }
    }
}

/// One delegation edge: a delegate role, its keys, and the paths it may claim.
///
/// Declaration order within [`Delegations::roles`] is significant; resolution
/// follows the first edge whose pattern matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedRole {
    /// Name of the delegate targets role.
    pub name: String,
    /// Ids of the keys authorized to sign the delegate's metadata.
    pub keyids: Vec<KeyId>,
    /// Minimum number of distinct authorized-key signatures required.
    pub threshold: u32,
    /// Shell-style path patterns the delegate is trusted for,
    /// e.g. `"x/*"` or `"releases/*.tar.gz"`.
    pub paths: Vec<String>,
}

impl DelegatedRole {
    /// Whether any of this edge's patterns matches the target path.
    pub fn matches_path(&self, path: &str) -> Result<bool> {
        for pattern in &self.paths {
            let glob = globset::Glob::new(pattern)
                .map_err(|_| MetadataError::InvalidPattern(pattern.clone()))?;
            if glob.compile_matcher().is_match(path) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// View the edge as a role definition for threshold verification.
    pub fn as_role(&self) -> Role {
        Role {
            keyids: self.keyids.clone(),
            threshold: self.threshold,
        }
    }
}

/// Delegation graph fragment carried by one targets payload.
///
/// Holds the public keys the edges reference and the ordered list of edges.
/// The graph is adversarial input: it may declare cycles, so resolution
/// enforces acyclicity procedurally rather than trusting the shape here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegations {
    /// Public keys for the delegate roles, by key id.
    pub keys: BTreeMap<KeyId, Key>,
    /// Delegation edges in declaration order.
    pub roles: Vec<DelegatedRole>,
}

impl Delegations {
    pub fn new() -> Self {
        Delegations {
            keys: BTreeMap::new(),
            roles: Vec::new(),
        }
    }

    /// Look up a delegation edge by delegate name.
    pub fn role(&self, name: &str) -> Option<&DelegatedRole> {
        self.roles.iter().find(|r| r.name == name)
    }
}

impl Default for Delegations {
    fn default() -> Self {
        Self::new()
    }
}

/// Targets metadata payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    /// Metadata format version.
    pub spec_version: String,
    /// Monotonically increasing metadata version.
    pub version: u64,
    /// Instant after which this payload is no longer trusted.
    pub expires: DateTime<Utc>,
    /// Protected files by normalized target path.
    pub targets: BTreeMap<String, TargetFile>,
    /// Optional delegation of path authority to further targets roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,
}

impl Targets {
    /// Create an empty version-1 targets payload.
    pub fn new(expires: DateTime<Utc>) -> Self {
        super::warn_if_born_expired(RoleType::Targets, expires);
        Targets {
            spec_version: SPEC_VERSION.to_string(),
            version: 1,
            expires,
            targets: BTreeMap::new(),
            delegations: None,
        }
    }

    /// Register a target file under a normalized path.
    ///
    /// Last write wins: re-adding a path replaces the prior record, and the
    /// mutated payload must be re-signed before it is trusted again.
    pub fn add_target(&mut self, path: &str, info: TargetFile) -> Result<()> {
        let path = normalize_path(path)?;
        self.targets.insert(path, info);
        Ok(())
    }

    /// Look up a target by already-normalized path.
    pub fn target(&self, path: &str) -> Option<&TargetFile> {
        self.targets.get(path)
    }

    /// Add a delegation edge for the named delegate role.
    ///
    /// Appends at the end of the declaration order; the edge's keys are
    /// recorded alongside so verifiers can resolve its key ids.
    pub fn delegate(
        &mut self,
        name: &str,
        keys: Vec<Key>,
        threshold: u32,
        paths: Vec<String>,
    ) -> Result<()> {
        let keyids: Vec<KeyId> = keys.iter().map(Key::key_id).collect();
        // reuse the role constructor for the duplicate/threshold checks
        Role::new(name, keyids.clone(), threshold)?;
        for pattern in &paths {
            globset::Glob::new(pattern)
                .map_err(|_| MetadataError::InvalidPattern(pattern.clone()))?;
        }
        let delegations = self.delegations.get_or_insert_with(Delegations::new);
        for key in keys {
            delegations.keys.insert(key.key_id(), key);
        }
        delegations.roles.retain(|r| r.name != name);
        delegations.roles.push(DelegatedRole {
            name: name.to_string(),
            keyids,
            threshold,
            paths,
        });
        Ok(())
    }
}

/// Validate and normalize a target path.
///
/// Paths are relative, `/`-separated, and free of empty, `.`, and `..`
/// segments; a single leading `./` is accepted and stripped.
pub fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.strip_prefix("./").unwrap_or(path);
    if trimmed.is_empty() || trimmed.starts_with('/') {
        return Err(MetadataError::InvalidPath(path.to_string()));
    }
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(MetadataError::InvalidPath(path.to_string()));
        }
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn targets() -> Targets {
        Targets::new(Utc::now() + Duration::days(7))
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/b.txt").unwrap(), "a/b.txt");
        assert_eq!(normalize_path("./a/b.txt").unwrap(), "a/b.txt");
        assert!(normalize_path("").is_err());
        assert!(normalize_path("/abs/path").is_err());
        assert!(normalize_path("a//b").is_err());
        assert!(normalize_path("a/../b").is_err());
        assert!(normalize_path("a/./b").is_err());
    }

    #[test]
    fn test_add_target_last_write_wins() {
        let mut t = targets();
        t.add_target("a.txt", TargetFile::from_bytes(b"one")).unwrap();
        t.add_target("a.txt", TargetFile::from_bytes(b"two")).unwrap();
        assert_eq!(t.targets.len(), 1);
        assert!(t.target("a.txt").unwrap().matches(b"two"));
        assert!(!t.target("a.txt").unwrap().matches(b"one"));
    }

    #[test]
    fn test_target_file_digest() {
        let info = TargetFile::from_bytes(b"payload");
        assert_eq!(info.length, 7);
        assert!(info.matches(b"payload"));
        assert!(!info.matches(b"payloat"));
        assert!(!info.matches(b"payload "));
    }

    #[test]
    fn test_delegation_pattern_matching() {
        let edge = DelegatedRole {
            name: "team-x".to_string(),
            keyids: vec![],
            threshold: 1,
            paths: vec!["x/*".to_string()],
        };
        assert!(edge.matches_path("x/y.txt").unwrap());
        assert!(!edge.matches_path("y/x.txt").unwrap());
    }
}

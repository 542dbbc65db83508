//! # Consistent-snapshot publishing
//!
//! Applies the versioned-filename convention and the publish ordering
//! discipline:
//!
//! - with consistent snapshots, root/targets/snapshot files are named
//!   `"<version>.<role>.json"` and are immutable once written; timestamp is
//!   always the unversioned, replaced-in-place `"timestamp.json"` so a
//!   client can locate it with no prior knowledge
//! - snapshot must pin every persisted targets role, each at its latest
//!   persisted version; timestamp may pin only a snapshot version already
//!   persisted; violations fail before anything is written
//! - per role name, persisted versions strictly increase; a replay of the
//!   same `(role, version)` is a conflict the losing writer must resolve by
//!   retrying with the next version

use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::Mutex;

use metadata::envelope::Envelope;
use metadata::role::{RoleSigned, RoleType};

use crate::error::{Result, StoreError};
use crate::storage::MetadataStore;

/// The always-unversioned timestamp filename.
pub const TIMESTAMP_FILENAME: &str = "timestamp.json";

/// Persists signed envelopes under the consistent-snapshot discipline.
///
/// Tracks the latest persisted version per role name so ordering
/// violations are rejected before any write reaches the store. The store's
/// first-writer-wins `put` backs the same guarantee across concurrent
/// publishers sharing a store.
pub struct Publisher<S> {
    store: S,
    consistent_snapshot: bool,
    latest: Mutex<BTreeMap<String, u64>>,
}

impl<S: MetadataStore> Publisher<S> {
    /// Create a publisher over a store.
    ///
    /// `consistent_snapshot` should mirror the active root's flag.
    pub fn new(store: S, consistent_snapshot: bool) -> Self {
        Publisher {
            store,
            consistent_snapshot,
            latest: Mutex::new(BTreeMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a signed envelope under its role-type name.
    ///
    /// Returns the filename written.
    pub async fn publish(&self, envelope: &Envelope) -> Result<String> {
        self.publish_named(envelope.signed.role_type().as_str(), envelope)
            .await
    }

    /// Persist a signed envelope under an explicit role name.
    ///
    /// Delegated targets roles publish through this entry point, since
    /// their payload kind alone does not carry the role name.
    pub async fn publish_named(&self, role_name: &str, envelope: &Envelope) -> Result<String> {
        let version = envelope.signed.version();
        self.check_monotonic(role_name, version)?;
        self.check_ordering(envelope)?;

        let bytes = Bytes::from(envelope.to_bytes()?);
        let filename = self.filename(role_name, version);
        match envelope.signed.role_type() {
            RoleType::Timestamp => {
                self.store.replace(&filename, bytes).await?;
            }
            _ if self.consistent_snapshot => {
                // immutable versioned filename; a concurrent writer of the
                // same version loses here rather than corrupting
                self.store.put(&filename, bytes).await.map_err(|e| match e {
                    StoreError::FilenameExists(_) => StoreError::VersionConflict {
                        role: role_name.to_string(),
                        version,
                    },
                    other => other,
                })?;
            }
            _ => {
                self.store.replace(&filename, bytes).await?;
            }
        }

        self.latest.lock().insert(role_name.to_string(), version);
        tracing::debug!(role = role_name, version, filename = %filename, "published metadata");
        Ok(filename)
    }

    /// Load and decode a previously published envelope by filename.
    pub async fn load(&self, filename: &str) -> Result<Envelope> {
        let bytes = self.store.get(filename).await?;
        Ok(Envelope::from_bytes(&bytes)?)
    }

    /// The latest persisted version for a role name, if any.
    pub fn latest_version(&self, role_name: &str) -> Option<u64> {
        self.latest.lock().get(role_name).copied()
    }

    /// Record a version as already persisted for a role name.
    ///
    /// For publishers reopened over an existing store, whose files were
    /// written by an earlier process. The caller is asserting what it
    /// recovered from the store; subsequent publishes are checked against
    /// it.
    pub fn assume_version(&self, role_name: &str, version: u64) {
        self.latest.lock().insert(role_name.to_string(), version);
    }

    /// Filename for a role at a version under the active naming convention.
    pub fn filename(&self, role_name: &str, version: u64) -> String {
        if role_name == RoleType::Timestamp.as_str() {
            TIMESTAMP_FILENAME.to_string()
        } else if self.consistent_snapshot {
            format!("{version}.{role_name}.json")
        } else {
            format!("{role_name}.json")
        }
    }

    fn check_monotonic(&self, role_name: &str, version: u64) -> Result<()> {
        if let Some(prev) = self.latest.lock().get(role_name) {
            if version <= *prev {
                return Err(StoreError::VersionConflict {
                    role: role_name.to_string(),
                    version,
                });
            }
        }
        Ok(())
    }

    /// Reject envelopes that reference metadata not yet persisted.
    fn check_ordering(&self, envelope: &Envelope) -> Result<()> {
        let latest = self.latest.lock();
        match &envelope.signed {
            RoleSigned::Snapshot(snapshot) => {
                for (role, meta) in &snapshot.meta {
                    match latest.get(role) {
                        Some(persisted) if *persisted == meta.version => {}
                        Some(persisted) => {
                            return Err(StoreError::Consistency(format!(
                                "snapshot pins '{role}' at version {}, latest persisted is {persisted}",
                                meta.version
                            )));
                        }
                        None => {
                            return Err(StoreError::Consistency(format!(
                                "snapshot pins '{role}' at version {}, nothing persisted",
                                meta.version
                            )));
                        }
                    }
                }
                // a snapshot that drops a persisted targets role would let
                // a client mix that role's stale metadata with fresh files
                for role in latest.keys() {
                    let pinnable = role != RoleType::Root.as_str()
                        && role != RoleType::Snapshot.as_str()
                        && role != RoleType::Timestamp.as_str();
                    if pinnable && !snapshot.meta.contains_key(role) {
                        return Err(StoreError::Consistency(format!(
                            "snapshot omits persisted role '{role}'"
                        )));
                    }
                }
            }
            RoleSigned::Timestamp(timestamp) => {
                let pinned = timestamp.snapshot_meta.version;
                match latest.get(RoleType::Snapshot.as_str()) {
                    Some(persisted) if *persisted == pinned => {}
                    Some(persisted) => {
                        return Err(StoreError::Consistency(format!(
                            "timestamp pins snapshot version {pinned}, latest persisted is {persisted}"
                        )));
                    }
                    None => {
                        return Err(StoreError::Consistency(format!(
                            "timestamp pins snapshot version {pinned}, nothing persisted"
                        )));
                    }
                }
            }
            RoleSigned::Root(_) | RoleSigned::Targets(_) => {}
        }
        Ok(())
    }
}

//! The snapshot role: pins every targets metadata file to one version.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};

use super::{RoleType, SPEC_VERSION};

/// Version pin for one metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    /// Pinned metadata version.
    pub version: u64,
}

/// Snapshot metadata payload.
///
/// Lists the latest version of the top-level targets role and of every
/// delegated targets role, so a client cannot be served a mix of metadata
/// from different points in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Metadata format version.
    pub spec_version: String,
    /// Monotonically increasing metadata version.
    pub version: u64,
    /// Instant after which this payload is no longer trusted.
    pub expires: DateTime<Utc>,
    /// Pinned version per targets role name.
    pub meta: BTreeMap<String, MetaFile>,
}

impl Snapshot {
    /// Create an empty version-1 snapshot.
    pub fn new(expires: DateTime<Utc>) -> Self {
        super::warn_if_born_expired(RoleType::Snapshot, expires);
        Snapshot {
            spec_version: SPEC_VERSION.to_string(),
            version: 1,
            expires,
            meta: BTreeMap::new(),
        }
    }

    /// Pin the named targets role to a version.
    ///
    /// Pins may only move forward; recording a version lower than the one
    /// currently held fails with a rollback error.
    pub fn set_meta(&mut self, role_name: &str, version: u64) -> Result<()> {
        if let Some(current) = self.meta.get(role_name) {
            if version < current.version {
                return Err(MetadataError::Rollback {
                    current: current.version,
                    new: version,
                });
            }
        }
        self.meta.insert(role_name.to_string(), MetaFile { version });
        Ok(())
    }

    /// The pinned version for a targets role, if listed.
    pub fn meta_version(&self, role_name: &str) -> Option<u64> {
        self.meta.get(role_name).map(|m| m.version)
    }
}

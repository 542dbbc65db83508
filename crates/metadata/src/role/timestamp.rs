//! The timestamp role: freshness via a short-lived pointer to snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};

use super::{MetaFile, RoleType, SPEC_VERSION};

/// Timestamp metadata payload.
///
/// Carries only the latest snapshot version under a short expiry. Clients
/// fetch it first, from a fixed unversioned filename, and follow it to the
/// snapshot it pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Metadata format version.
    pub spec_version: String,
    /// Monotonically increasing metadata version.
    pub version: u64,
    /// Instant after which this payload is no longer trusted.
    pub expires: DateTime<Utc>,
    /// Pin of the latest snapshot version.
    pub snapshot_meta: MetaFile,
}

impl Timestamp {
    /// Create a version-1 timestamp pointing at snapshot version 1.
    pub fn new(expires: DateTime<Utc>) -> Self {
        super::warn_if_born_expired(RoleType::Timestamp, expires);
        Timestamp {
            spec_version: SPEC_VERSION.to_string(),
            version: 1,
            expires,
            snapshot_meta: MetaFile { version: 1 },
        }
    }

    /// Point at a new snapshot version.
    ///
    /// The pin may only move forward; a lower version fails with a rollback
    /// error.
    pub fn set_snapshot_meta(&mut self, version: u64) -> Result<()> {
        if version < self.snapshot_meta.version {
            return Err(MetadataError::Rollback {
                current: self.snapshot_meta.version,
                new: version,
            });
        }
        self.snapshot_meta = MetaFile { version };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_snapshot_pin_monotonic() {
        let mut timestamp = Timestamp::new(Utc::now() + Duration::days(1));
        timestamp.set_snapshot_meta(5).unwrap();
        let err = timestamp.set_snapshot_meta(4).unwrap_err();
        assert!(matches!(err, MetadataError::Rollback { current: 5, new: 4 }));
        timestamp.set_snapshot_meta(5).unwrap();
        assert_eq!(timestamp.snapshot_meta.version, 5);
    }
}

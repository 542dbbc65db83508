//! Shared test utilities for trust verification tests
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use metadata::prelude::*;

/// A timestamp `days` days from now.
pub fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

/// A repository with keys generated for every top-level role.
pub struct TestRepo {
    pub root: Root,
    /// Root role signing keys.
    pub root_keys: Vec<SecretKey>,
    /// One signing key per non-root top-level role, by role name.
    pub role_keys: BTreeMap<String, SecretKey>,
}

/// Build a root with `root_keys` keys on the root role at `root_threshold`,
/// and a single key (threshold 1) for targets, snapshot, and timestamp.
pub fn setup_repo(root_keys: usize, root_threshold: u32) -> TestRepo {
    let mut root = Root::new(in_days(365), true);

    let mut role_keys = BTreeMap::new();
    for name in ["targets", "snapshot", "timestamp"] {
        let secret = SecretKey::generate();
        root.add_key(name, Key::from_public(&secret.public())).unwrap();
        role_keys.insert(name.to_string(), secret);
    }

    let mut secrets = Vec::new();
    for _ in 0..root_keys {
        let secret = SecretKey::generate();
        root.add_key("root", Key::from_public(&secret.public())).unwrap();
        secrets.push(secret);
    }
    root.set_threshold("root", root_threshold).unwrap();

    TestRepo {
        root,
        root_keys: secrets,
        role_keys,
    }
}

/// Wrap a payload and sign it with each of the given keys.
pub fn signed_envelope(signed: RoleSigned, keys: &[&SecretKey]) -> Envelope {
    let mut envelope = Envelope::new(signed);
    for key in keys {
        envelope.sign(key).unwrap();
    }
    envelope
}

//! Publish ordering, version conflicts, and naming conventions.

use chrono::{DateTime, Duration, Utc};
use metadata::prelude::*;
use store::{FsStore, MemoryStore, MetadataStore, Publisher, StoreError, TIMESTAMP_FILENAME};

fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

fn signed(signed: RoleSigned, key: &SecretKey) -> Envelope {
    let mut envelope = Envelope::new(signed);
    envelope.sign(key).unwrap();
    envelope
}

fn targets_at(version: u64) -> RoleSigned {
    let mut targets = Targets::new(in_days(7));
    targets.version = version;
    RoleSigned::Targets(targets)
}

fn snapshot_at(version: u64, targets_version: u64) -> RoleSigned {
    let mut snapshot = Snapshot::new(in_days(7));
    snapshot.version = version;
    snapshot.set_meta("targets", targets_version).unwrap();
    RoleSigned::Snapshot(snapshot)
}

fn timestamp_at(version: u64, snapshot_version: u64) -> RoleSigned {
    let mut timestamp = Timestamp::new(in_days(1));
    timestamp.version = version;
    timestamp.set_snapshot_meta(snapshot_version).unwrap();
    RoleSigned::Timestamp(timestamp)
}

#[tokio::test]
async fn full_publish_cycle_uses_versioned_names() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    let mut root = Root::new(in_days(365), true);
    root.add_key("root", Key::from_public(&key.public())).unwrap();

    let name = publisher
        .publish(&signed(RoleSigned::Root(root), &key))
        .await
        .unwrap();
    assert_eq!(name, "1.root.json");

    let name = publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    assert_eq!(name, "1.targets.json");

    let name = publisher
        .publish(&signed(snapshot_at(1, 1), &key))
        .await
        .unwrap();
    assert_eq!(name, "1.snapshot.json");

    let name = publisher
        .publish(&signed(timestamp_at(1, 1), &key))
        .await
        .unwrap();
    assert_eq!(name, TIMESTAMP_FILENAME);

    // the published envelope round-trips through the store
    let loaded = publisher.load("1.targets.json").await.unwrap();
    assert_eq!(loaded.signed.version(), 1);
}

#[tokio::test]
async fn republishing_same_version_conflicts() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    publisher.publish(&signed(snapshot_at(1, 1), &key)).await.unwrap();

    let err = publisher
        .publish(&signed(snapshot_at(1, 1), &key))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict { version: 1, ref role } if role == "snapshot"
    ));

    // the next version goes through
    publisher.publish(&signed(targets_at(2), &key)).await.unwrap();
    publisher.publish(&signed(snapshot_at(2, 2), &key)).await.unwrap();
}

#[tokio::test]
async fn concurrent_publisher_loses_on_shared_store() {
    let key = SecretKey::generate();
    let store = MemoryStore::new();
    let first = Publisher::new(store.clone(), true);
    let second = Publisher::new(store, true);

    first.publish(&signed(targets_at(1), &key)).await.unwrap();
    // the second publisher has no local version state; the store's
    // first-writer-wins put is what detects the race
    let err = second.publish(&signed(targets_at(1), &key)).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

#[tokio::test]
async fn snapshot_may_only_pin_persisted_targets() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    let err = publisher
        .publish(&signed(snapshot_at(1, 1), &key))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Consistency(_)));
    // nothing was written
    assert!(!publisher.store().exists("1.snapshot.json").await.unwrap());

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    // pinning a version other than the persisted latest is also rejected
    let err = publisher
        .publish(&signed(snapshot_at(1, 2), &key))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Consistency(_)));

    publisher.publish(&signed(snapshot_at(1, 1), &key)).await.unwrap();
}

#[tokio::test]
async fn timestamp_may_only_pin_persisted_snapshot() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    let err = publisher
        .publish(&signed(timestamp_at(1, 1), &key))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Consistency(_)));
    assert!(!publisher.store().exists(TIMESTAMP_FILENAME).await.unwrap());
}

#[tokio::test]
async fn timestamp_is_replaced_in_place() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    publisher.publish(&signed(snapshot_at(1, 1), &key)).await.unwrap();
    publisher.publish(&signed(timestamp_at(1, 1), &key)).await.unwrap();

    publisher.publish(&signed(targets_at(2), &key)).await.unwrap();
    publisher.publish(&signed(snapshot_at(2, 2), &key)).await.unwrap();
    publisher.publish(&signed(timestamp_at(2, 2), &key)).await.unwrap();

    // same filename, newest content
    let loaded = publisher.load(TIMESTAMP_FILENAME).await.unwrap();
    assert_eq!(loaded.signed.version(), 2);
}

#[tokio::test]
async fn plain_names_without_consistent_snapshot() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), false);

    let name = publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    assert_eq!(name, "targets.json");
    // without versioned names the file is replaced, but versions still
    // may not go backwards
    let name = publisher.publish(&signed(targets_at(2), &key)).await.unwrap();
    assert_eq!(name, "targets.json");
    let err = publisher.publish(&signed(targets_at(2), &key)).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

#[tokio::test]
async fn delegated_role_publishes_under_its_own_name() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    let name = publisher
        .publish_named("team-x", &signed(targets_at(1), &key))
        .await
        .unwrap();
    assert_eq!(name, "1.team-x.json");

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    let mut snapshot = Snapshot::new(in_days(7));
    snapshot.set_meta("targets", 1).unwrap();
    snapshot.set_meta("team-x", 1).unwrap();
    publisher
        .publish(&signed(RoleSigned::Snapshot(snapshot), &key))
        .await
        .unwrap();
}

#[tokio::test]
async fn snapshot_must_pin_every_persisted_targets_role() {
    let key = SecretKey::generate();
    let publisher = Publisher::new(MemoryStore::new(), true);

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    publisher
        .publish_named("team-x", &signed(targets_at(1), &key))
        .await
        .unwrap();

    // dropping a persisted delegate from the pin set is as unsafe as
    // pinning a version that was never written
    let err = publisher
        .publish(&signed(snapshot_at(1, 1), &key))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Consistency(_)));
    assert!(!publisher.store().exists("1.snapshot.json").await.unwrap());

    let mut snapshot = Snapshot::new(in_days(7));
    snapshot.set_meta("targets", 1).unwrap();
    snapshot.set_meta("team-x", 1).unwrap();
    publisher
        .publish(&signed(RoleSigned::Snapshot(snapshot), &key))
        .await
        .unwrap();
}

#[tokio::test]
async fn filesystem_store_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let key = SecretKey::generate();
    let store = FsStore::new(dir.path()).await.unwrap();
    let publisher = Publisher::new(store, true);

    publisher.publish(&signed(targets_at(1), &key)).await.unwrap();
    assert!(dir.path().join("1.targets.json").exists());

    let loaded = publisher.load("1.targets.json").await.unwrap();
    assert_eq!(loaded.signed.role_type(), RoleType::Targets);

    // the versioned file is immutable even across publisher instances
    let second = Publisher::new(FsStore::new(dir.path()).await.unwrap(), true);
    let err = second.publish(&signed(targets_at(1), &key)).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));
}

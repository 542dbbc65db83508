//! Maintainer operations over an on-disk metadata repository.
//!
//! Each operation loads the current metadata, applies one mutation, bumps
//! and re-signs the affected chain (targets, then snapshot, then
//! timestamp), and publishes in that order. Signing keys live as PEM files
//! in a separate keys directory, one per role; root may hold several.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};

use metadata::prelude::*;
use store::{FsStore, Publisher};

/// Expiry intervals per role, mirroring role volatility: root uses offline
/// keys and changes rarely; timestamp is re-issued constantly.
const ROOT_EXPIRY_DAYS: i64 = 365;
const TARGETS_EXPIRY_DAYS: i64 = 7;
const SNAPSHOT_EXPIRY_DAYS: i64 = 7;
const TIMESTAMP_EXPIRY_DAYS: i64 = 1;

fn in_days(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

/// A maintainer session over one repository and its keys directory.
pub struct Maintainer {
    keys_dir: PathBuf,
    publisher: Publisher<FsStore>,
    /// Active trust anchor.
    root: Root,
    /// Loaded envelopes by role name, as recovered from the store.
    envelopes: BTreeMap<String, Envelope>,
}

impl Maintainer {
    /// Create a new repository: fresh keys for every top-level role, the
    /// four signed metadata files, and a first consistent snapshot.
    pub async fn init(
        repo_dir: &Path,
        keys_dir: &Path,
        root_keys: u32,
        root_threshold: u32,
        consistent_snapshot: bool,
    ) -> Result<Self> {
        std::fs::create_dir_all(keys_dir)?;

        let mut root = Root::new(in_days(ROOT_EXPIRY_DAYS), consistent_snapshot);
        for name in ["targets", "snapshot", "timestamp"] {
            let secret = SecretKey::generate();
            root.add_key(name, Key::from_public(&secret.public()))?;
            write_key(keys_dir, name, &secret)?;
        }
        // root runs a multi-key threshold; keep the private halves apart
        for i in 1..=root_keys {
            let secret = SecretKey::generate();
            root.add_key("root", Key::from_public(&secret.public()))?;
            write_key(keys_dir, &format!("root-{i}"), &secret)?;
        }
        root.set_threshold("root", root_threshold)?;
        root.validate()?;

        let mut targets = Targets::new(in_days(TARGETS_EXPIRY_DAYS));
        let mut snapshot = Snapshot::new(in_days(SNAPSHOT_EXPIRY_DAYS));
        snapshot.set_meta("targets", targets.version)?;
        let mut timestamp = Timestamp::new(in_days(TIMESTAMP_EXPIRY_DAYS));
        timestamp.set_snapshot_meta(snapshot.version)?;

        let mut session = Maintainer {
            keys_dir: keys_dir.to_path_buf(),
            publisher: Publisher::new(FsStore::new(repo_dir).await?, consistent_snapshot),
            root: root.clone(),
            envelopes: BTreeMap::new(),
        };

        let mut root_env = Envelope::new(RoleSigned::Root(root));
        for key in session.root_secrets()? {
            root_env.sign(&key)?;
        }
        session.publish("root", root_env).await?;

        for (name, signed) in [
            ("targets", RoleSigned::Targets(targets)),
            ("snapshot", RoleSigned::Snapshot(snapshot)),
            ("timestamp", RoleSigned::Timestamp(timestamp)),
        ] {
            let mut envelope = Envelope::new(signed);
            envelope.sign(&session.role_secret(name)?)?;
            session.publish(name, envelope).await?;
        }

        tracing::info!(repo = %repo_dir.display(), "repository initialized");
        Ok(session)
    }

    /// Reopen an existing repository, recovering the latest version of
    /// every role from the store's filenames.
    pub async fn open(repo_dir: &Path, keys_dir: &Path) -> Result<Self> {
        let latest = scan_latest(repo_dir)?;
        let root_version = *latest
            .get("root")
            .ok_or_else(|| anyhow!("no root metadata in {}", repo_dir.display()))?;

        // peek at root to learn the naming convention in force
        let root_env = read_envelope(repo_dir, &filename_for(repo_dir, "root", root_version))?;
        let RoleSigned::Root(ref root) = root_env.signed else {
            return Err(anyhow!("root metadata file does not contain a root payload"));
        };
        let root = root.clone();

        let publisher = Publisher::new(
            FsStore::new(repo_dir).await?,
            root.consistent_snapshot,
        );
        let mut envelopes = BTreeMap::new();
        for (name, version) in &latest {
            publisher.assume_version(name, *version);
            let envelope = read_envelope(repo_dir, &filename_for(repo_dir, name, *version))?;
            envelopes.insert(name.clone(), envelope);
        }

        Ok(Maintainer {
            keys_dir: keys_dir.to_path_buf(),
            publisher,
            root,
            envelopes,
        })
    }

    /// Register a file in targets and republish the chain.
    pub async fn add_target(&mut self, file: &Path, target_path: &str) -> Result<()> {
        let bytes = std::fs::read(file)
            .with_context(|| format!("reading target file {}", file.display()))?;
        let mut targets = self.targets()?;
        targets.add_target(target_path, TargetFile::from_bytes(&bytes))?;
        targets.version += 1;
        tracing::info!(path = target_path, length = bytes.len(), "target added");
        self.republish_chain(targets).await
    }

    /// Delegate a path pattern to a new role with a freshly generated key.
    pub async fn delegate(&mut self, name: &str, pattern: &str) -> Result<()> {
        let secret = SecretKey::generate();
        write_key(&self.keys_dir, name, &secret)?;

        let mut targets = self.targets()?;
        targets.delegate(
            name,
            vec![Key::from_public(&secret.public())],
            1,
            vec![pattern.to_string()],
        )?;
        targets.version += 1;

        // the delegate publishes its own (empty) targets metadata
        let mut delegate_env = Envelope::new(RoleSigned::Targets(Targets::new(in_days(
            TARGETS_EXPIRY_DAYS,
        ))));
        delegate_env.sign(&secret)?;
        self.publish(name, delegate_env).await?;

        tracing::info!(delegate = name, pattern, "delegation added");
        self.republish_chain(targets).await
    }

    /// Add a new root key, bump the root version, and publish a rotation
    /// signed by every root key on disk (old and new).
    pub async fn rotate_root(&mut self) -> Result<()> {
        let old_root = self.root.clone();

        let index = self.root_secrets()?.len() as u32 + 1;
        let secret = SecretKey::generate();
        write_key(&self.keys_dir, &format!("root-{index}"), &secret)?;

        let mut new_root = old_root.clone();
        new_root.add_key("root", Key::from_public(&secret.public()))?;
        new_root.version += 1;
        new_root.expires = in_days(ROOT_EXPIRY_DAYS);

        let mut envelope = Envelope::new(RoleSigned::Root(new_root));
        for key in self.root_secrets()? {
            envelope.sign(&key)?;
        }

        // the rotation must satisfy both the outgoing and incoming quorum
        // before anything is published
        let accepted = verify_root_rotation(&old_root, &envelope, Utc::now())?;
        self.publish("root", envelope).await?;
        self.root = accepted;

        tracing::info!(version = self.root.version, "root rotated");
        Ok(())
    }

    /// Raise or lower a role's signature threshold and republish root.
    pub async fn set_threshold(&mut self, role_name: &str, threshold: u32) -> Result<()> {
        let old_root = self.root.clone();
        let mut new_root = old_root.clone();
        new_root.set_threshold(role_name, threshold)?;
        new_root.version += 1;

        let mut envelope = Envelope::new(RoleSigned::Root(new_root));
        for key in self.root_secrets()? {
            envelope.sign(&key)?;
        }
        let accepted = verify_root_rotation(&old_root, &envelope, Utc::now())?;
        self.publish("root", envelope).await?;
        self.root = accepted;

        tracing::info!(role = role_name, threshold, "threshold updated");
        Ok(())
    }

    /// Resolve a target path through the delegation graph and print its
    /// integrity record.
    pub fn resolve(&self, path: &str) -> Result<TargetFile> {
        let resolver = DelegationResolver::new(&self.root, &self.envelopes, Utc::now());
        Ok(resolver.resolve(path)?.clone())
    }

    /// Sign the new targets payload and republish targets, snapshot, and
    /// timestamp in publish order.
    async fn republish_chain(&mut self, targets: Targets) -> Result<()> {
        let targets_version = targets.version;
        let mut targets_env = Envelope::new(RoleSigned::Targets(targets));
        targets_env.sign(&self.role_secret("targets")?)?;
        self.publish("targets", targets_env).await?;

        let mut snapshot = self.snapshot()?;
        snapshot.set_meta("targets", targets_version)?;
        // keep every delegated role pinned at its persisted version
        for (name, envelope) in &self.envelopes {
            if name != "targets" && matches!(envelope.signed, RoleSigned::Targets(_)) {
                snapshot.set_meta(name, envelope.signed.version())?;
            }
        }
        snapshot.version += 1;
        let snapshot_version = snapshot.version;
        let mut snapshot_env = Envelope::new(RoleSigned::Snapshot(snapshot));
        snapshot_env.sign(&self.role_secret("snapshot")?)?;
        self.publish("snapshot", snapshot_env).await?;

        let mut timestamp = self.timestamp()?;
        timestamp.set_snapshot_meta(snapshot_version)?;
        timestamp.version += 1;
        let mut timestamp_env = Envelope::new(RoleSigned::Timestamp(timestamp));
        timestamp_env.sign(&self.role_secret("timestamp")?)?;
        self.publish("timestamp", timestamp_env).await?;

        Ok(())
    }

    async fn publish(&mut self, name: &str, envelope: Envelope) -> Result<()> {
        let filename = self.publisher.publish_named(name, &envelope).await?;
        tracing::debug!(filename = %filename, "wrote metadata file");
        self.envelopes.insert(name.to_string(), envelope);
        Ok(())
    }

    fn targets(&self) -> Result<Targets> {
        match self.envelopes.get("targets").map(|e| &e.signed) {
            Some(RoleSigned::Targets(t)) => Ok(t.clone()),
            _ => Err(anyhow!("no targets metadata loaded")),
        }
    }

    fn snapshot(&self) -> Result<Snapshot> {
        match self.envelopes.get("snapshot").map(|e| &e.signed) {
            Some(RoleSigned::Snapshot(s)) => Ok(s.clone()),
            _ => Err(anyhow!("no snapshot metadata loaded")),
        }
    }

    fn timestamp(&self) -> Result<Timestamp> {
        match self.envelopes.get("timestamp").map(|e| &e.signed) {
            Some(RoleSigned::Timestamp(t)) => Ok(t.clone()),
            _ => Err(anyhow!("no timestamp metadata loaded")),
        }
    }

    fn role_secret(&self, name: &str) -> Result<SecretKey> {
        read_key(&self.keys_dir, name)
    }

    /// All root signing keys on disk, in index order.
    fn root_secrets(&self) -> Result<Vec<SecretKey>> {
        let mut keys = Vec::new();
        for i in 1.. {
            let path = self.keys_dir.join(format!("root-{i}.pem"));
            if !path.exists() {
                break;
            }
            keys.push(read_key(&self.keys_dir, &format!("root-{i}"))?);
        }
        if keys.is_empty() {
            return Err(anyhow!("no root keys in {}", self.keys_dir.display()));
        }
        Ok(keys)
    }
}

fn write_key(keys_dir: &Path, name: &str, secret: &SecretKey) -> Result<()> {
    let path = keys_dir.join(format!("{name}.pem"));
    std::fs::write(&path, secret.to_pem())
        .with_context(|| format!("writing key {}", path.display()))?;
    Ok(())
}

fn read_key(keys_dir: &Path, name: &str) -> Result<SecretKey> {
    let path = keys_dir.join(format!("{name}.pem"));
    let pem = std::fs::read_to_string(&path)
        .with_context(|| format!("reading key {}", path.display()))?;
    Ok(SecretKey::from_pem(&pem)?)
}

fn read_envelope(repo_dir: &Path, filename: &str) -> Result<Envelope> {
    let bytes = std::fs::read(repo_dir.join(filename))?;
    Ok(Envelope::from_bytes(&bytes)?)
}

/// Latest persisted version per role name, recovered from filenames.
///
/// Versioned files parse as `<version>.<role>.json`; the unversioned
/// `timestamp.json` and plain `<role>.json` files read their version from
/// the payload.
fn scan_latest(repo_dir: &Path) -> Result<BTreeMap<String, u64>> {
    let mut latest: BTreeMap<String, u64> = BTreeMap::new();
    for entry in std::fs::read_dir(repo_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".json") else {
            continue;
        };
        let (role, version) = match stem.split_once('.') {
            Some((version, role)) => match version.parse::<u64>() {
                Ok(version) => (role.to_string(), version),
                Err(_) => continue,
            },
            None => {
                let envelope = read_envelope(repo_dir, name)?;
                (stem.to_string(), envelope.signed.version())
            }
        };
        let slot = latest.entry(role).or_insert(version);
        *slot = (*slot).max(version);
    }
    Ok(latest)
}

fn filename_for(repo_dir: &Path, role: &str, version: u64) -> String {
    let versioned = format!("{version}.{role}.json");
    if repo_dir.join(&versioned).exists() {
        versioned
    } else {
        format!("{role}.json")
    }
}

//! # Delegation resolution
//!
//! Resolves a target path through a chain of targets roles. The delegation
//! graph is adversarial input that may declare cycles, so acyclicity is
//! enforced procedurally with a visited set carried through the walk, plus
//! a fixed depth cap as a backstop.
//!
//! No role's claims are trusted until its own envelope independently meets
//! its threshold: the top-level targets role verifies against root, and
//! each delegate verifies against the keys and threshold declared on the
//! edge that delegated to it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::crypto::{Key, KeyId};
use crate::envelope::Envelope;
use crate::error::{MetadataError, Result};
use crate::role::{normalize_path, Role, RoleSigned, RoleType, Root, TargetFile};
use crate::verify;

/// Cap on delegation recursion depth.
pub const MAX_DELEGATION_DEPTH: usize = 32;

/// Resolves target paths against a set of loaded targets envelopes.
///
/// The caller owns the request-scoped state: the trusted root and the map
/// of targets envelopes by role name. Resolution is pure and reads only
/// that state, so concurrent resolutions never contend.
pub struct DelegationResolver<'a> {
    root: &'a Root,
    /// Targets envelopes by role name, including the top-level `"targets"`.
    metadata: &'a BTreeMap<String, Envelope>,
    now: DateTime<Utc>,
}

impl<'a> DelegationResolver<'a> {
    pub fn new(
        root: &'a Root,
        metadata: &'a BTreeMap<String, Envelope>,
        now: DateTime<Utc>,
    ) -> Self {
        DelegationResolver {
            root,
            metadata,
            now,
        }
    }

    /// Resolve a target path starting from the top-level targets role.
    pub fn resolve(&self, path: &str) -> Result<&'a TargetFile> {
        let top = RoleType::Targets.as_str();
        self.resolve_from(path, top)
    }

    /// Resolve a target path starting from an arbitrary targets role.
    ///
    /// The start role's authority comes from root's role map; it must be a
    /// role root defines (for delegates reached mid-graph, use
    /// [`DelegationResolver::resolve`] from the top).
    pub fn resolve_from(&self, path: &str, start_role: &str) -> Result<&'a TargetFile> {
        let path = normalize_path(path)?;
        let role = self.root.role(start_role)?.clone();
        let mut visited = BTreeSet::new();
        self.walk(&path, start_role, &role, &self.root.keys, &mut visited, 0)
    }

    fn walk(
        &self,
        path: &str,
        role_name: &str,
        role: &Role,
        keys: &BTreeMap<KeyId, Key>,
        visited: &mut BTreeSet<String>,
        depth: usize,
    ) -> Result<&'a TargetFile> {
        if depth > MAX_DELEGATION_DEPTH {
            return Err(MetadataError::DelegationDepthExceeded(MAX_DELEGATION_DEPTH));
        }
        if !visited.insert(role_name.to_string()) {
            return Err(MetadataError::DelegationCycle(role_name.to_string()));
        }

        let envelope = self
            .metadata
            .get(role_name)
            .ok_or_else(|| MetadataError::UnknownRole(role_name.to_string()))?;
        let RoleSigned::Targets(ref targets) = envelope.signed else {
            return Err(MetadataError::UnknownRole(role_name.to_string()));
        };

        // an unverified role's claims are not trusted
        verify::verify_delegate(envelope, role_name, role, keys, self.now)?;

        if let Some(info) = targets.target(path) {
            return Ok(info);
        }

        if let Some(delegations) = &targets.delegations {
            // declaration order; the first matching edge decides the path's
            // fate, later edges are not consulted
            for edge in &delegations.roles {
                if edge.matches_path(path)? {
                    tracing::debug!(
                        from = role_name,
                        to = %edge.name,
                        path,
                        "following delegation edge"
                    );
                    return self.walk(
                        path,
                        &edge.name,
                        &edge.as_role(),
                        &delegations.keys,
                        visited,
                        depth + 1,
                    );
                }
            }
        }

        Err(MetadataError::TargetNotFound(path.to_string()))
    }
}

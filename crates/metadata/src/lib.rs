/**
 * Cryptographic types and operations.
 *  - Public and private Ed25519 key implementations
 *  - Distributed key records with derived key ids
 *  - Detached signatures carried by envelopes
 */
pub mod crypto;
/**
 * Signed payload plus collected signatures.
 * Owns the signing entry point and the wire
 *  encoding for metadata files.
 */
pub mod envelope;
/**
 * Typed failures for every rejected mutation
 *  and every verification outcome.
 */
pub mod error;
/**
 * Delegation-graph resolution of target paths
 *  under cycle and depth limits.
 */
pub mod resolve;
/**
 * The four role payloads (root, targets,
 *  snapshot, timestamp) and their mutation
 *  operations. Root doubles as the key
 *  registry for every role.
 */
pub mod role;
/**
 * Threshold signature verification, root
 *  bootstrap, and the dual-threshold root
 *  rotation rule.
 */
pub mod verify;

pub mod prelude {
    pub use crate::crypto::{Key, KeyId, PublicKey, SecretKey, Signature};
    pub use crate::envelope::Envelope;
    pub use crate::error::MetadataError;
    pub use crate::resolve::DelegationResolver;
    pub use crate::role::{
        MetaFile, Role, RoleSigned, RoleType, Root, Snapshot, TargetFile, Targets, Timestamp,
    };
    pub use crate::verify::{verify_envelope, verify_root_bootstrap, verify_root_rotation};
}

//! Metadata storage and publishing
//!
//! This crate provides the persistence half of the trust engine:
//!
//! - [`MetadataStore`] — flat keyed storage whose `put` fails rather than
//!   overwrites, with in-memory and local-filesystem backends
//! - [`Publisher`] — the consistent-snapshot persister: immutable
//!   versioned filenames, the always-unversioned `timestamp.json`, and the
//!   targets-before-snapshot-before-timestamp publish ordering
//!
//! A failure mid-publish leaves the repository valid but stale; re-running
//! the publish step recovers, and no half-written versioned file is ever
//! observable because each write is all-or-nothing at the store boundary.

mod error;
mod publisher;
mod storage;

pub use error::{Result, StoreError};
pub use publisher::{Publisher, TIMESTAMP_FILENAME};
pub use storage::{FsStore, MemoryStore, MetadataStore};

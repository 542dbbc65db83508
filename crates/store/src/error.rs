//! Error types for metadata storage and publishing.

/// Errors that can occur when persisting or loading metadata files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write to a filename that already holds content
    #[error("filename '{0}' already exists")]
    FilenameExists(String),

    /// A read of a filename with no content
    #[error("metadata file '{0}' not found")]
    NotFound(String),

    /// A publish of a `(role, version)` pair that is already persisted,
    /// or of a version not above the latest persisted one
    #[error("version conflict for role '{role}' at version {version}")]
    VersionConflict { role: String, version: u64 },

    /// A publish that references metadata not yet persisted
    #[error("consistency violation: {0}")]
    Consistency(String),

    /// Underlying filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope encode/decode failure
    #[error(transparent)]
    Metadata(#[from] metadata::error::MetadataError),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

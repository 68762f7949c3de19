//! Error types for the model registry

use thiserror::Error;

use crate::validator::ValidationResult;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Broad failure classes a caller can branch on without matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A name failed format, type or length checks
    Validation,
    /// An entity was missing or already present
    Existence,
    /// A relationship endpoint rule was violated
    Referential,
    /// Snapshot files or the index could not be read or written
    Persistence,
    /// The confirmation hook declined the operation
    Cancelled,
}

/// Model registry errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: ValidationResult },

    #[error("Name '{name}' is reserved")]
    ReservedName { name: String },

    #[error("Class '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("Class '{name}' does not exist")]
    NotFound { name: String },

    #[error("Class '{name}' does not exist")]
    ClassNotFound { name: String },

    #[error("Attribute '{attribute}' already exists in class '{class}'")]
    AttributeAlreadyExists { class: String, attribute: String },

    #[error("Attribute '{attribute}' does not exist in class '{class}'")]
    AttributeNotFound { class: String, attribute: String },

    #[error("Class '{name}' cannot have a relationship to itself")]
    SameEndpoint { name: String },

    #[error("Source class '{name}' does not exist")]
    SourceNotFound { name: String },

    #[error("Destination class '{name}' does not exist")]
    DestinationNotFound { name: String },

    #[error("Relationship from '{from}' to '{to}' already exists")]
    RelationshipAlreadyExists { from: String, to: String },

    #[error("Relationship from '{from}' to '{to}' does not exist")]
    RelationshipNotFound { from: String, to: String },

    #[error("Relationship from '{from}' to '{to}' is already of kind '{kind}'")]
    KindUnchanged {
        from: String,
        to: String,
        kind: String,
    },

    #[error("Snapshot '{name}' does not exist")]
    SnapshotNotFound { name: String },

    #[error("Snapshot '{name}' already exists")]
    SnapshotAlreadyExists { name: String },

    #[error("Snapshot '{name}' is corrupt: {reason}")]
    CorruptSnapshot { name: String, reason: String },

    #[error("Snapshot index is corrupt: {reason}")]
    CorruptIndex { reason: String },

    #[error("No active snapshot")]
    NoActiveSnapshot,

    #[error("Snapshot '{name}' is not the active snapshot")]
    SnapshotNotActive { name: String },

    #[error("Cancelled: {action}")]
    Cancelled { action: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Which failure class this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            ModelError::InvalidName { .. } | ModelError::ReservedName { .. } => {
                ErrorCategory::Validation
            }
            ModelError::AlreadyExists { .. }
            | ModelError::NotFound { .. }
            | ModelError::ClassNotFound { .. }
            | ModelError::AttributeAlreadyExists { .. }
            | ModelError::AttributeNotFound { .. }
            | ModelError::RelationshipAlreadyExists { .. }
            | ModelError::RelationshipNotFound { .. }
            | ModelError::KindUnchanged { .. }
            | ModelError::SnapshotAlreadyExists { .. } => ErrorCategory::Existence,
            ModelError::SameEndpoint { .. }
            | ModelError::SourceNotFound { .. }
            | ModelError::DestinationNotFound { .. } => ErrorCategory::Referential,
            ModelError::SnapshotNotFound { .. }
            | ModelError::CorruptSnapshot { .. }
            | ModelError::CorruptIndex { .. }
            | ModelError::NoActiveSnapshot
            | ModelError::SnapshotNotActive { .. }
            | ModelError::Io(_)
            | ModelError::Json(_) => ErrorCategory::Persistence,
            ModelError::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }

    pub(crate) fn invalid_name(name: &str, reason: ValidationResult) -> Self {
        ModelError::InvalidName {
            name: name.to_string(),
            reason,
        }
    }
}

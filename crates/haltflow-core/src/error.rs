use thiserror::Error;

/// Core error type for the Haltflow runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The persisted document is malformed or internally inconsistent
    #[error("Document integrity error in '{field}': {reason}")]
    DocumentIntegrity {
        /// Document field (or path) that failed to resolve
        field: String,
        /// What was wrong with it
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An activity with the same ID is already part of the workflow
    #[error("Duplicate activity ID: {0}")]
    DuplicateActivity(String),

    /// Activity not found in the workflow
    #[error("Activity not found: {0}")]
    ActivityNotFound(String),

    /// Connection references an activity outside the workflow
    #[error("Dangling connection {source_id}.{endpoint} -> {target_id}")]
    DanglingConnection {
        /// Source activity ID
        source_id: String,
        /// Source endpoint name
        endpoint: String,
        /// Target activity ID
        target_id: String,
    },

    /// Status transition not allowed from the current state
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Scope stack misuse
    #[error("Scope error: {0}")]
    ScopeError(String),

    /// Error raised by an activity while executing or resuming
    #[error("Activity execution error: {0}")]
    ActivityExecutionError(String),

    /// A resolved activity type rejected the persisted properties
    #[error("Activity type error: {0}")]
    ActivityTypeError(String),

    /// The operation observed a cancellation request
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Document store error
    #[error("Store error: {0}")]
    StoreError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Shorthand for a [`CoreError::DocumentIntegrity`] error
    pub fn integrity(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::DocumentIntegrity {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error describes a corrupted or version-mismatched document
    pub fn is_document_integrity(&self) -> bool {
        matches!(self, CoreError::DocumentIntegrity { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

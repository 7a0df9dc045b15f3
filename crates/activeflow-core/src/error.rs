use thiserror::Error;

/// Core error type for the activeflow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Activeflow not found
    #[error("Activeflow not found: {0}")]
    ActiveflowNotFound(String),

    /// Action not found in any reachable stack
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// Stack not found in the stack map
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// Flow definition not found
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// Variable bag not found
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The activeflow has already ended
    #[error("Activeflow already ended: {0}")]
    ActiveflowEnded(String),

    /// The execution ceiling was hit
    #[error("Execution limit exceeded: {0}")]
    ExecutionLimitExceeded(String),

    /// Pushing another stack would exceed the nesting limit
    #[error("Stack depth exceeded: {0}")]
    StackDepthExceeded(String),

    /// Malformed action option payload
    #[error("Option decode error: {0}")]
    OptionDecodeError(String),

    /// Permission mismatch between the caller and a resource
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Downstream service call failed
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// The per-activeflow lock is held by someone else
    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether the caller may retry the trigger that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::LockUnavailable(_))
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

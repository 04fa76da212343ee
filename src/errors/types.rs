//! # Error Types
//!
//! Error taxonomy for session transactions and the ambient stack, using `thiserror`.

/// Custom result type for sessiond operations
pub type Result<T> = std::result::Result<T, SessiondError>;

/// Main error type for sessiond
#[derive(thiserror::Error, Debug)]
pub enum SessiondError {
    /// A transaction phase was invoked out of order, or its target does not exist
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The caller is not allowed to act on the target (decided upstream)
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// Nothing to act on
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// The session store could not be reached or a write failed
    #[error("Store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rollback was requested after effects became durable
    #[error("Partial rollback: {revoked} session(s) stay revoked")]
    PartialRollback { revoked: usize },

    /// The surrounding request was cancelled
    #[error("Cancelled during {phase}")]
    Cancelled { phase: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database errors that were not classified by a store
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SessiondError {
    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState { message: message.into() }
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create an unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable { message: message.into(), source: None }
    }

    /// Create an unavailable error with source
    pub fn unavailable_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Unavailable { message: message.into(), source: Some(source) }
    }

    /// Create a partial rollback error
    pub fn partial_rollback(revoked: usize) -> Self {
        Self::PartialRollback { revoked }
    }

    /// Create a cancellation error for the given phase
    pub fn cancelled<S: Into<String>>(phase: S) -> Self {
        Self::Cancelled { phase: phase.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Short machine-readable code, used as a metrics label and log field
    pub fn code(&self) -> &'static str {
        match self {
            SessiondError::InvalidState { .. } => "invalid_state",
            SessiondError::PermissionDenied { .. } => "permission_denied",
            SessiondError::NotFound { .. } => "not_found",
            SessiondError::Unavailable { .. } => "unavailable",
            SessiondError::PartialRollback { .. } => "partial_rollback",
            SessiondError::Cancelled { .. } => "cancelled",
            SessiondError::Config { .. } => "config",
            SessiondError::Database { .. } => "database",
            SessiondError::Validation { .. } => "validation",
            SessiondError::Internal { .. } => "internal",
        }
    }

    /// Get the HTTP status code the upstream protocol layer should return
    pub fn status_code(&self) -> u16 {
        match self {
            SessiondError::InvalidState { .. } => 409,
            SessiondError::PermissionDenied { .. } => 403,
            SessiondError::NotFound { .. } => 404,
            SessiondError::Unavailable { .. } => 503,
            SessiondError::PartialRollback { .. } => 500,
            SessiondError::Cancelled { .. } => 499,
            SessiondError::Config { .. } => 500,
            SessiondError::Database { .. } => 503,
            SessiondError::Validation { .. } => 400,
            SessiondError::Internal { .. } => 500,
        }
    }

    /// Check if this error should be retried.
    ///
    /// Only store failures qualify, and only by re-invoking `commit` on the
    /// same transaction instance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessiondError::Unavailable { .. } | SessiondError::Database { .. })
    }
}

impl From<sqlx::Error> for SessiondError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<config::ConfigError> for SessiondError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for SessiondError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}

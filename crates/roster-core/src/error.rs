use thiserror::Error;

/// Application-wide error types for Roster.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (inference endpoint).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Remote inference call failed.
    #[error("Inference error (HTTP {status_code}): {message}")]
    InferenceError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// The inference endpoint refused the credentials or model access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The skill catalog could not be loaded from its backing store.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    /// Input rejected before extraction (empty or oversized text, bad counters).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Every extraction method failed for the same text.
    #[error("All extraction methods failed: {}", .errors.join("; "))]
    ExtractionFailed { errors: Vec<String> },

    /// A job state change that the lifecycle does not allow.
    #[error("Invalid transition for {request_id}: {from} -> {to}")]
    InvalidTransition {
        request_id: String,
        from: String,
        to: String,
    },

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out, with the limit in milliseconds.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::InferenceError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

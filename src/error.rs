//! Error types for Stockroom

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for Stockroom
#[derive(Error, Debug)]
pub enum StockroomError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Health check {0:?} registered twice")]
    DuplicateCheck(String),
}

/// Cache layer errors
///
/// These never reach an HTTP client: the cache client turns them into
/// "unavailable" outcomes, and the health check keeps only their message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache not configured")]
    NotConfigured,

    #[error("invalid cache url: {0}")]
    InvalidUrl(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u64 },

    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl CacheError {
    pub(crate) fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

/// One rejected field of an item payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field error found in a payload, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns `Ok(value)` when no error was recorded
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for err in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
            first = false;
        }
        Ok(())
    }
}

/// Items layer outcomes other than success
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Item {0} not found")]
    NotFound(Uuid),
}

impl From<ValidationErrors> for ItemError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, StockroomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "must not be empty");
        errors.add("price", "must be greater than 0");

        assert_eq!(
            errors.to_string(),
            "name: must not be empty; price: must be greater than 0"
        );
        assert!(errors.contains_field("price"));
        assert!(!errors.contains_field("tags"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::new().into_result(7), Ok(7));

        let mut errors = ValidationErrors::new();
        errors.add("quantity", "must be >= 0");
        assert!(errors.into_result(7).is_err());
    }

    #[test]
    fn test_cache_error_messages() {
        let err = CacheError::Timeout {
            operation: "PING",
            millis: 250,
        };
        assert_eq!(err.to_string(), "PING timed out after 250ms");
        assert_eq!(
            CacheError::backend("GET", "connection refused").to_string(),
            "GET failed: connection refused"
        );
    }
}

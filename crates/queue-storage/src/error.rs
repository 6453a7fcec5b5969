//! Error types for queue storage operations.

use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for all queue storage operations
#[derive(Debug, Error)]
pub enum QueueStorageError {
    #[error("Invalid storage connection string: {message}")]
    InvalidConnectionString { message: String },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Queue already exists: {queue_name}")]
    QueueAlreadyExists { queue_name: String },

    #[error("Message not found or pop receipt mismatch: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Service error ({status}): {code} - {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Malformed XML payload: {message}")]
    Xml { message: String },

    #[error("Message content could not be decoded: {message}")]
    InvalidMessageContent { message: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl QueueStorageError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidConnectionString { .. } => false,
            Self::QueueNotFound { .. } => false,
            Self::QueueAlreadyExists { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::AuthenticationFailed { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::Service { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Xml { .. } => false,
            Self::InvalidMessageContent { .. } => false,
            Self::Validation(_) => false,
            Self::Configuration(_) => false,
        }
    }

    /// Service error code, when the error originated from a service response
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::QueueNotFound { .. } => Some("QueueNotFound"),
            Self::QueueAlreadyExists { .. } => Some("QueueAlreadyExists"),
            Self::MessageNotFound { .. } => Some("MessageNotFound"),
            Self::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Short label of the error's origin, printed alongside the message by the samples
    pub fn source_label(&self) -> &'static str {
        match self {
            Self::InvalidConnectionString { .. } | Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => "transport",
            Self::Xml { .. } | Self::InvalidMessageContent { .. } => "protocol",
            _ => "service",
        }
    }

    pub(crate) fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

/// Validation errors for arguments checked before a request is sent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

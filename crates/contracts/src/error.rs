//! Layered error definitions
//!
//! Categorized by source: config / payload / writer

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Payload Errors =====
    /// Payload does not match what the writer expects
    #[error("unexpected payload for writer '{writer}': expected {expected}, got {actual}")]
    UnexpectedPayload {
        writer: String,
        expected: &'static str,
        actual: &'static str,
    },

    // ===== Writer Errors =====
    /// Writer error
    #[error("writer '{writer}' error: {message}")]
    WriterFailed { writer: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create writer error
    pub fn writer(writer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriterFailed {
            writer: writer.into(),
            message: message.into(),
        }
    }
}

//! Error types for ChatRelay
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation failure on an inbound chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Path of the offending field (e.g. `messages[0].role`)
    pub field: String,
    /// Human readable description of the violation
    pub message: String,
}

impl FieldViolation {
    /// Creates a new field violation
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::error::FieldViolation;
    ///
    /// let v = FieldViolation::new("messages", "must not be empty");
    /// assert_eq!(v.field, "messages");
    /// ```
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Main error type for ChatRelay operations
///
/// Covers configuration problems, malformed client input, upstream
/// provider failures, and the transport/serialization errors that
/// bubble up from the libraries underneath.
#[derive(Error, Debug)]
pub enum ChatRelayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed client input, one entry per offending field
    #[error("Validation failed: {}", format_violations(.0))]
    Validation(Vec<FieldViolation>),

    /// Upstream provider returned non-success or the transport failed
    #[error("Upstream provider error{}: {message}", format_status(.status))]
    Upstream {
        /// HTTP status returned by the provider, if a response was received
        status: Option<u16>,
        /// Provider response body or transport error text
        message: String,
    },

    /// A single streamed chunk could not be decoded
    #[error("Chunk decode error: {0}")]
    ChunkDecode(String),

    /// Chat API client errors (non-success status, unreadable body)
    #[error("Client error: {0}")]
    Client(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ChatRelayError {
    /// Builds an upstream error from a provider response status and body
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {})", code),
        None => String::new(),
    }
}

/// Result type alias for ChatRelay operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

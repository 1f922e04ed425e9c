// src/error.rs

//! Unified error handling for the reconciliation engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ShipmentStatus;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWB does not start with an accepted carrier prefix
    #[error("Invalid AWB format: '{awb}'")]
    InvalidFormat { awb: String },

    /// Shipment is delivered and the update would change its status
    #[error("{awb} is already delivered; cannot set status to {attempted}")]
    AlreadyDelivered {
        awb: String,
        attempted: ShipmentStatus,
    },

    /// Handoff write went through but the re-read still shows the old courier
    #[error("Transfer of {awb} to courier {expected} was not applied (courier is {actual:?})")]
    TransferVerificationFailed {
        awb: String,
        expected: String,
        actual: Option<String>,
    },

    /// A manifest lookup exceeded its time budget
    #[error("Manifest lookup for {awb} timed out at {source_name}")]
    NetworkTimeout { source_name: String, awb: String },

    /// Generic store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an invalid format error.
    pub fn invalid_format(awb: impl Into<String>) -> Self {
        Self::InvalidFormat { awb: awb.into() }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classification reported back to operators.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::AlreadyDelivered { .. } => ErrorKind::AlreadyDelivered,
            Self::TransferVerificationFailed { .. } => ErrorKind::TransferVerificationFailed,
            Self::NetworkTimeout { .. } => ErrorKind::NetworkTimeout,
            Self::Http(e) if e.is_timeout() => ErrorKind::NetworkTimeout,
            _ => ErrorKind::PersistenceError,
        }
    }
}

/// Serializable error classification carried in per-item results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    AlreadyDelivered,
    TransferVerificationFailed,
    NetworkTimeout,
    PersistenceError,
}

impl ErrorKind {
    /// Whether the operator should escalate instead of retrying.
    pub fn needs_escalation(self) -> bool {
        matches!(
            self,
            Self::AlreadyDelivered | Self::TransferVerificationFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidFormat => "invalid format",
            Self::AlreadyDelivered => "already delivered",
            Self::TransferVerificationFailed => "transfer not applied",
            Self::NetworkTimeout => "network timeout",
            Self::PersistenceError => "persistence error",
        };
        f.write_str(label)
    }
}

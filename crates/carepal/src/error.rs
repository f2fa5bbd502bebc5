//! Error types for carepal.
//!
//! This module defines all error types used throughout the carepal crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for carepal operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored payload does not match its checksum.
    #[error("snapshot '{namespace}' is corrupt: checksum mismatch")]
    CorruptSnapshot {
        /// Namespace of the damaged snapshot.
        namespace: String,
    },

    /// A stored payload was written with a format this build cannot read.
    #[error("snapshot '{namespace}' has format version {found}, expected {expected}")]
    IncompatibleSnapshot {
        /// Namespace of the snapshot.
        namespace: String,
        /// Version found in storage.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Lifecycle Errors ===
    /// A status change is not in the entity's transition table.
    #[error("illegal {entity} transition for '{id}': {from} -> {to}")]
    IllegalTransition {
        /// Kind of entity (order, booking, errand, call).
        entity: &'static str,
        /// Entity identifier.
        id: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// A status string did not name a known status.
    #[error("unknown {entity} status: '{value}'")]
    UnknownStatus {
        /// Kind of entity the status was parsed for.
        entity: &'static str,
        /// The unparseable input.
        value: String,
    },

    /// No entity with the given id exists.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of entity.
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    // === Checkout Errors ===
    /// A payment for this order is already being processed.
    #[error("payment already in flight for order '{order_id}'")]
    PaymentInFlight {
        /// The order with a pending payment.
        order_id: String,
    },

    /// The payment request itself is invalid.
    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for carepal operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an unknown status error.
    #[must_use]
    pub fn unknown_status(entity: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownStatus {
            entity,
            value: value.into(),
        }
    }

    /// Create an illegal transition error.
    #[must_use]
    pub fn illegal_transition(
        entity: &'static str,
        id: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::IllegalTransition {
            entity,
            id: id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a config validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error is a rejected status transition.
    #[must_use]
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }

    /// Check if this error reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

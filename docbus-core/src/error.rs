//! Error types and result types for store service operations.
//!
//! [`StoreError`] is the single failure channel of every endpoint. Failures raised by a
//! database driver are carried unchanged inside [`StoreError::Driver`].

use bson::error::Error as BsonError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A request field that is missing or has the wrong shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("\"{field}\" {reason}")]
pub struct ValidationError {
    /// Name of the offending request field.
    pub field: String,
    /// Human readable description of the violated rule.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }
}

/// Failures reported by a database driver.
///
/// The router never inspects or rewrites these; they reach the caller as raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The collection does not exist in the target database.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The target database does not exist.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),
    /// A database or collection with this name already exists.
    #[error("Duplicate name: {0}")]
    DuplicateName(String),
    /// The operation is not permitted against this database.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The query could not be parsed or executed.
    #[error("Query error: {0}")]
    Query(String),
    /// The transaction was rejected or its action failed.
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// The database server answered with an error body.
    #[error("Server error {status} ({error_num}): {message}")]
    Server {
        status: u16,
        error_num: i64,
        message: String,
    },
    /// The database could not be reached.
    #[error("Network error: {0}")]
    Network(String),
}

/// Represents all possible errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request failed validation and never reached a driver.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// The requested database cannot be served by the single pre-built connection.
    #[error("Default database is '{configured}' but trying to connect to '{requested}'")]
    ConfigurationMismatch { configured: String, requested: String },
    /// A failure raised by the database driver.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// No handler is registered for the request's pattern.
    #[error("No handler registered for pattern {0}")]
    PatternNotFound(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The service configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// A specialized `Result` type for store service operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl StoreError {
    /// Stable error name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "ValidationError",
            StoreError::ConfigurationMismatch { .. } => "ConfigurationMismatch",
            StoreError::Driver(_) => "DriverError",
            StoreError::PatternNotFound(_) => "PatternNotFound",
            StoreError::Serialization(_) => "SerializationError",
            StoreError::Configuration(_) => "ConfigurationError",
        }
    }
}

/// Transport representation of a [`StoreError`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorReply {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl From<&StoreError> for ErrorReply {
    fn from(err: &StoreError) -> Self {
        let field = match err {
            StoreError::Validation(validation) => Some(validation.field.clone()),
            _ => None,
        };
        let code = match err {
            StoreError::Driver(DriverError::Server { error_num, .. }) => Some(*error_num),
            _ => None,
        };

        ErrorReply {
            name: err.name().to_string(),
            message: err.to_string(),
            field,
            code,
        }
    }
}

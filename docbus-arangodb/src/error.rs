//! Mapping of ArangoDB HTTP failures into driver errors.
//!
//! ArangoDB answers failed calls with a JSON envelope:
//!
//! ```json
//! { "error": true, "code": 404, "errorNum": 1203, "errorMessage": "collection or view not found" }
//! ```
//!
//! The well-known error numbers map onto dedicated [`DriverError`] variants; everything else is
//! reported as [`DriverError::Server`] with the original number and message.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use docbus_core::error::{DriverError, StoreError};

/// Error numbers of the ArangoDB server this driver distinguishes.
pub mod error_num {
    pub const FORBIDDEN: i64 = 11;
    pub const COLLECTION_NOT_FOUND: i64 = 1203;
    pub const DUPLICATE_NAME: i64 = 1207;
    pub const UNIQUE_CONSTRAINT_VIOLATED: i64 = 1210;
    pub const DATABASE_NOT_FOUND: i64 = 1228;
    pub const USE_SYSTEM_DATABASE: i64 = 1230;
    pub const QUERY_PARSE: i64 = 1501;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_num: i64,
    #[serde(default)]
    error_message: String,
}

/// Failures of a single HTTP exchange with the server.
#[derive(Error, Debug)]
pub enum ArangoError {
    /// The request could not be sent or its body not read.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The server answered with an error envelope.
    #[error("server responded with status {status}")]
    Status { status: u16, body: Value },
    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Body(String),
    /// The configured server url cannot address an API path.
    #[error("invalid server url {0}")]
    Url(String),
}

impl From<ArangoError> for StoreError {
    fn from(err: ArangoError) -> Self {
        match err {
            ArangoError::Http(err) => DriverError::Network(err.to_string()).into(),
            ArangoError::Status { status, body } => driver_error(status, &body).into(),
            ArangoError::Body(message) => DriverError::Server {
                status: 0,
                error_num: 0,
                message,
            }
            .into(),
            ArangoError::Url(message) => StoreError::Configuration(message),
        }
    }
}

/// Maps an error envelope onto a [`DriverError`].
pub fn driver_error(status: u16, body: &Value) -> DriverError {
    let ErrorBody {
        error_num,
        error_message,
    } = ErrorBody::deserialize(body).unwrap_or(ErrorBody {
        error_num: 0,
        error_message: body.to_string(),
    });

    match error_num {
        error_num::COLLECTION_NOT_FOUND => DriverError::CollectionNotFound(error_message),
        error_num::DATABASE_NOT_FOUND => DriverError::DatabaseNotFound(error_message),
        error_num::DUPLICATE_NAME | error_num::UNIQUE_CONSTRAINT_VIOLATED => {
            DriverError::DuplicateName(error_message)
        }
        error_num::FORBIDDEN | error_num::USE_SYSTEM_DATABASE => {
            DriverError::Forbidden(error_message)
        }
        error_num::QUERY_PARSE => DriverError::Query(error_message),
        _ => DriverError::Server {
            status,
            error_num,
            message: error_message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(code: u16, num: i64, message: &str) -> Value {
        json!({ "error": true, "code": code, "errorNum": num, "errorMessage": message })
    }

    #[test]
    fn well_known_numbers_get_dedicated_variants() {
        assert_eq!(
            driver_error(404, &envelope(404, 1203, "collection or view not found")),
            DriverError::CollectionNotFound("collection or view not found".into())
        );
        assert_eq!(
            driver_error(404, &envelope(404, 1228, "database not found")),
            DriverError::DatabaseNotFound("database not found".into())
        );
        assert_eq!(
            driver_error(409, &envelope(409, 1207, "duplicate name")),
            DriverError::DuplicateName("duplicate name".into())
        );
        assert_eq!(
            driver_error(403, &envelope(403, 1230, "operation only allowed in system database")),
            DriverError::Forbidden("operation only allowed in system database".into())
        );
        assert_eq!(
            driver_error(400, &envelope(400, 1501, "syntax error")),
            DriverError::Query("syntax error".into())
        );
    }

    #[test]
    fn other_numbers_are_kept_verbatim() {
        assert_eq!(
            driver_error(404, &envelope(404, 1202, "document not found")),
            DriverError::Server {
                status: 404,
                error_num: 1202,
                message: "document not found".into(),
            }
        );
    }

    #[test]
    fn non_envelope_bodies_are_reported_whole() {
        let err = driver_error(502, &json!("bad gateway"));

        assert_eq!(
            err,
            DriverError::Server {
                status: 502,
                error_num: 0,
                message: "\"bad gateway\"".into(),
            }
        );
    }

    #[test]
    fn status_errors_become_store_errors() {
        let err: StoreError = ArangoError::Status {
            status: 404,
            body: envelope(404, 1203, "collection or view not found"),
        }
        .into();

        assert_eq!(err.name(), "DriverError");
        assert_eq!(err.to_string(), "Collection not found: collection or view not found");
    }
}

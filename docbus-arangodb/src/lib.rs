//! ArangoDB driver for docbus.
//!
//! This crate implements the `Database` and `Connector` traits over the ArangoDB HTTP API.
//!
//! To use this driver, include the `arangodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbus = { version = "x.y.z", features = ["arangodb"] }
//! ```
//!
//! # Features
//!
//! - **Example verbs as AQL** - Filters, updates and removals run as parameterised AQL
//! - **Batched cursors** - Query results are fetched from the server one batch at a time
//! - **Error mapping** - ArangoDB error numbers become typed driver errors
//!
//! # Example
//!
//! ```ignore
//! use docbus_arangodb::ArangoConnector;
//! use docbus_core::driver::{ConnectionOptions, Connector};
//!
//! let connector = ArangoConnector::new()?;
//! let db = connector.connect(
//!     &ConnectionOptions::new("http://127.0.0.1:8529", "test").with_credentials("root", ""),
//! )?;
//! ```

pub mod aql;
pub mod connector;
pub mod database;
pub mod error;

pub use aql::AqlQuery;
pub use connector::ArangoConnector;
pub use database::{ArangoCursor, ArangoDatabase};
pub use error::ArangoError;

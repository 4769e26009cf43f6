//! Main docbus crate: document database endpoints served over a request/response message bus.
//!
//! This crate is the primary entry point for users of docbus. It re-exports the core types from
//! the sub-crates and provides access to the database drivers.
//!
//! # Features
//!
//! - **One service, many databases** - Requests pick their logical database with `databaseName`;
//!   connections are created once per name and reused
//! - **CRUD by example** - `create`, `find`, `update`, `replace`, `remove`, `count`, `exists` and
//!   their by-identifier variants
//! - **Administration** - Database and collection creation, raw queries and transactions
//! - **Validated requests** - Every endpoint checks its fields before touching a database
//!
//! # Quick Start
//!
//! ```ignore
//! use docbus::{prelude::*, memory::MemoryServer};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = MemoryServer::builder().database("test").build();
//!     let service = StoreService::builder(ConnectionSource::options(
//!         ConnectionOptions::new("memory://", "test"),
//!         server,
//!     ))
//!     .build();
//!
//!     service
//!         .act(json!({
//!             "topic": "arango-store",
//!             "cmd": "createCollection",
//!             "name": "users"
//!         }))
//!         .await
//!         .unwrap();
//!
//!     let created = service
//!         .act(json!({
//!             "topic": "arango-store",
//!             "cmd": "create",
//!             "collection": "users",
//!             "data": { "name": "peter" }
//!         }))
//!         .await
//!         .unwrap();
//!
//!     println!("Created user: {}", created["_id"]);
//! }
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-process databases for development and testing
//! - [`arangodb`] - ArangoDB over HTTP (requires `arangodb` feature)

pub mod prelude;
pub mod stdio;

pub use docbus_core::{
    config, cursor, driver, error, example, handlers, request, resolver, router, service, store,
    validate,
};

/// In-memory database driver.
pub mod memory {
    pub use docbus_memory::{
        ActionFn, MemoryDatabase, MemoryServer, MemoryServerBuilder, QueryFn, Scope,
    };
}

/// ArangoDB database driver.
///
/// This module is only available when the `arangodb` feature is enabled.
#[cfg(feature = "arangodb")]
pub mod arangodb {
    pub use docbus_arangodb::{
        AqlQuery, ArangoConnector, ArangoCursor, ArangoDatabase, ArangoError,
    };
}

//! Document database CRUD and query endpoints served over a request/response message bus.
//!
//! This crate is the core of the docbus project and provides:
//!
//! - **Database drivers** ([`driver`]) - The [`driver::Database`] trait every backend implements
//! - **Connection resolution** ([`resolver`]) - Per-database connections, created once and cached
//! - **Example queries** ([`example`]) - Field-equality filters and their visitor
//! - **Cursors** ([`cursor`]) - Streaming query results
//! - **Store adapter** ([`store`]) - CRUD verbs over a resolved database
//! - **Requests and routing** ([`request`], [`router`], [`validate`]) - Pattern dispatch with
//!   per-endpoint validation
//! - **Endpoints** ([`handlers`]) - The store service command set
//! - **Service** ([`service`]) - A ready-to-serve router with every endpoint registered
//! - **Configuration** ([`config`]) - TOML service configuration
//! - **Error handling** ([`error`]) - Error types and their transport representation
//!
//! # Example
//!
//! ```ignore
//! use docbus_core::{config::ServiceConfig, service::StoreService};
//! use serde_json::json;
//!
//! let config = ServiceConfig::load("docbus.toml")?;
//! let service = StoreService::from_config(&config, connector);
//!
//! let count = service
//!     .act(json!({
//!         "topic": "arango-store",
//!         "cmd": "count",
//!         "collection": "users",
//!         "query": { "name": "peter" }
//!     }))
//!     .await?;
//! ```

pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod example;
pub mod handlers;
pub mod request;
pub mod resolver;
pub mod router;
pub mod service;
pub mod store;
pub mod validate;

//! In-memory document database driver for docbus.
//!
//! This crate provides a thread-safe, in-process implementation of the `Database` and
//! `Connector` traits. It uses async-aware read-write locks for concurrent access and is meant
//! for development and testing.
//!
//! # Features
//!
//! - **Many databases per server** - `_system` exists from the start and creates the others
//! - **Document and edge collections** - Edge documents must carry `_from` and `_to`
//! - **Example matching** - Equality filters with dotted paths and numeric normalization
//! - **Registered queries and actions** - Raw queries and transaction bodies are Rust closures
//!   registered under their text
//!
//! # Quick Start
//!
//! ```ignore
//! use docbus_core::{resolver::ConnectionSource, service::StoreService, driver::ConnectionOptions};
//! use docbus_memory::MemoryServer;
//!
//! let server = MemoryServer::builder().database("test").build();
//! let service = StoreService::builder(ConnectionSource::options(
//!     ConnectionOptions::new("memory://", "test"),
//!     server.clone(),
//! ))
//! .build();
//! ```

pub mod database;
mod evaluator;
pub mod server;

pub use database::MemoryDatabase;
pub use server::{ActionFn, MemoryServer, MemoryServerBuilder, QueryFn, Scope};

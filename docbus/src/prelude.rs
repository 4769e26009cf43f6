//! Convenient re-exports of commonly used types from docbus.
//!
//! ```ignore
//! use docbus::prelude::*;
//! ```

pub use docbus_core::{
    config::ServiceConfig,
    cursor::{BoxCursor, Cursor, VecCursor},
    driver::{
        CollectionKind, Connection, ConnectionOptions, Connector, Database, RemoveSummary,
        ReplaceSummary, Transaction, TransactionCollections, UpdateSummary,
    },
    error::{DriverError, ErrorReply, StoreError, StoreResult, ValidationError},
    example::{Example, ExampleVisitor, QueryOptions},
    request::{Pattern, Request},
    resolver::{ConnectionCache, ConnectionResolver, ConnectionSource},
    router::{Context, Handler, Router},
    service::{Reply, StoreService, StoreServiceBuilder},
    store::{ExampleStore, Store},
    validate::{Schema, Shape, SchemaValidator, Validator},
};

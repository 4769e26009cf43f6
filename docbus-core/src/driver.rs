//! Database driver abstraction.
//!
//! This module defines the capability the service needs from a document database, so the
//! router and store work the same over any driver (in-memory, HTTP, ...).
//!
//! # Traits
//!
//! - [`Database`]: A handle to one logical database on a server
//! - [`Connector`]: Factory creating [`Database`] handles from [`ConnectionOptions`]
//!
//! # Examples
//!
//! ```ignore
//! use docbus_core::driver::{Database, CollectionKind};
//! use serde_json::json;
//!
//! let db: Connection = connector.connect(&options)?;
//! db.create_collection("users", CollectionKind::Document).await?;
//! let created = db.save("users", json!({ "name": "Alice" })).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{fmt::Debug, sync::Arc};

use crate::{
    cursor::BoxCursor,
    error::StoreResult,
    example::{Example, QueryOptions},
};

/// Name of the system database, the only database allowed to create other databases.
pub const SYSTEM_DATABASE: &str = "_system";

/// Shared handle to one logical database.
pub type Connection = Arc<dyn Database>;

/// Kind of collection to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    /// Plain document collection.
    #[default]
    Document,
    /// Edge collection, whose documents carry `_from` and `_to`.
    Edge,
}

impl CollectionKind {
    /// Interprets the `type` flag of a create-collection request.
    ///
    /// Only `"edge"` selects an edge collection; any other value, including none, selects a
    /// document collection.
    pub fn from_flag(flag: Option<&Value>) -> Self {
        match flag {
            Some(Value::String(kind)) if kind == "edge" => CollectionKind::Edge,
            _ => CollectionKind::Document,
        }
    }
}

/// Result of an update verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub updated: u64,
}

/// Result of a replace verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSummary {
    pub replaced: u64,
}

/// Result of a remove verb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveSummary {
    pub deleted: u64,
}

/// Collections a transaction declares up front.
///
/// Each entry accepts either a single collection name or a list of names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCollections {
    #[serde(default, deserialize_with = "one_or_many")]
    pub read: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub write: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub exclusive: Vec<String>,
}

impl TransactionCollections {
    /// Returns true when the collection may be written inside the transaction.
    pub fn allows_write(&self, collection: &str) -> bool {
        self.write
            .iter()
            .chain(self.exclusive.iter())
            .any(|name| name == collection)
    }

    /// Returns true when the collection is declared at all.
    pub fn allows_read(&self, collection: &str) -> bool {
        self.read.iter().any(|name| name == collection) || self.allows_write(collection)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

/// A server-side transaction: an action body executed by the database engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub collections: TransactionCollections,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Lock timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<u64>,
}

/// Abstract interface to one logical database.
///
/// Every method is a single driver call. Implementations report failures as
/// [`StoreError::Driver`](crate::error::StoreError::Driver) and must be safe to share
/// between concurrent requests.
#[async_trait]
pub trait Database: Send + Sync + Debug {
    /// Name of the logical database this handle is bound to.
    fn name(&self) -> &str;

    /// Creates a new database. Only permitted on the system database.
    async fn create_database(&self, name: &str, users: Vec<Value>) -> StoreResult<Value>;

    /// Creates a collection in this database.
    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<Value>;

    /// Runs a raw query with bind variables and returns a cursor over its results.
    async fn query(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<BoxCursor>;

    /// Executes a transaction and returns the value produced by its action.
    async fn transaction(&self, transaction: Transaction) -> StoreResult<Value>;

    /// Inserts a document and returns it with its generated identifier.
    async fn save(&self, collection: &str, document: Value) -> StoreResult<Value>;

    /// Selects every document matching the example.
    async fn by_example(
        &self,
        collection: &str,
        example: &Example,
        options: &QueryOptions,
    ) -> StoreResult<BoxCursor>;

    /// Merges `patch` into every document matching the example.
    async fn update_by_example(
        &self,
        collection: &str,
        example: &Example,
        patch: Value,
    ) -> StoreResult<UpdateSummary>;

    /// Replaces the body of every document matching the example.
    async fn replace_by_example(
        &self,
        collection: &str,
        example: &Example,
        document: Value,
    ) -> StoreResult<ReplaceSummary>;

    /// Removes every document matching the example.
    async fn remove_by_example(
        &self,
        collection: &str,
        example: &Example,
    ) -> StoreResult<RemoveSummary>;

    /// Counts the documents matching the example.
    async fn count_by_example(&self, collection: &str, example: &Example) -> StoreResult<u64>;
}

/// Raw connection parameters for a [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Server endpoint, e.g. `http://127.0.0.1:8529`.
    #[serde(default = "ConnectionOptions::default_url")]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Default logical database.
    #[serde(default = "ConnectionOptions::default_database")]
    pub database_name: String,
    /// Per-request client timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConnectionOptions {
    pub fn new(url: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database_name: database_name.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Clones these options with a different database name.
    pub fn for_database(&self, database_name: &str) -> Self {
        Self {
            database_name: database_name.to_string(),
            ..self.clone()
        }
    }

    fn default_url() -> String {
        "http://127.0.0.1:8529".to_string()
    }

    fn default_database() -> String {
        SYSTEM_DATABASE.to_string()
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            username: None,
            password: None,
            database_name: Self::default_database(),
            timeout_secs: None,
        }
    }
}

/// Factory trait for creating database handles from raw options.
///
/// Connecting must not perform I/O: handles connect lazily on first use, so the resolver can
/// build them while holding its cache lock.
pub trait Connector: Send + Sync + Debug {
    fn connect(&self, options: &ConnectionOptions) -> StoreResult<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_edge_flag_selects_edge_collections() {
        assert_eq!(CollectionKind::from_flag(Some(&json!("edge"))), CollectionKind::Edge);
        assert_eq!(CollectionKind::from_flag(Some(&json!(""))), CollectionKind::Document);
        assert_eq!(CollectionKind::from_flag(Some(&json!("graph"))), CollectionKind::Document);
        assert_eq!(CollectionKind::from_flag(Some(&json!(true))), CollectionKind::Document);
        assert_eq!(CollectionKind::from_flag(None), CollectionKind::Document);
    }

    #[test]
    fn transaction_collections_accept_single_names() {
        let collections: TransactionCollections =
            serde_json::from_value(json!({ "read": "users", "write": ["orders", "payments"] }))
                .unwrap();

        assert_eq!(collections.read, vec!["users"]);
        assert!(collections.allows_write("payments"));
        assert!(!collections.allows_write("users"));
        assert!(collections.allows_read("users"));
        assert!(!collections.allows_read("audit"));
    }

    #[test]
    fn options_for_database_keep_credentials() {
        let options = ConnectionOptions::new("http://db:8529", "test").with_credentials("root", "");
        let other = options.for_database("tenant");

        assert_eq!(other.database_name, "tenant");
        assert_eq!(other.url, "http://db:8529");
        assert_eq!(other.username.as_deref(), Some("root"));
        assert_eq!(options.database_name, "test");
    }
}

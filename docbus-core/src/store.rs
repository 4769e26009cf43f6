//! Generic CRUD verbs over a document database.
//!
//! - [`Store`] - The verb contract the router calls
//! - [`ExampleStore`] - Implementation over any [`Database`] driver using example filters
//!
//! Every by-identifier verb is the matching example verb with the filter `{ "_id": id }`, so
//! both variants share one code path and the same "zero or more affected" semantics.
//!
//! # Example
//!
//! ```ignore
//! use docbus_core::{store::{ExampleStore, Store}, example::Example};
//! use serde_json::json;
//!
//! let store = ExampleStore::new(connection.as_ref());
//! let created = store.create("users", json!({ "name": "peter" })).await?;
//! let id = created["_id"].as_str().unwrap();
//!
//! store.update_by_id("users", id, json!({ "name": "klaus" })).await?;
//! assert!(store.exists("users", &Example::by_id(id), &Default::default()).await?);
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    driver::{Database, RemoveSummary, ReplaceSummary, UpdateSummary},
    error::StoreResult,
    example::{Example, QueryOptions},
};

/// The CRUD verb interface exposed through the router.
///
/// Results are whatever the underlying driver produced; implementations must not catch,
/// retry or reinterpret driver failures.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a document and returns it with its generated identifier.
    async fn create(&self, collection: &str, data: Value) -> StoreResult<Value>;

    /// Returns every document matching the example, in driver order.
    async fn find(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Value>>;

    /// Merges `data` into every document matching the example.
    async fn update(
        &self,
        collection: &str,
        query: &Example,
        data: Value,
    ) -> StoreResult<UpdateSummary>;

    /// Replaces every document matching the example with `data`.
    async fn replace(
        &self,
        collection: &str,
        query: &Example,
        data: Value,
    ) -> StoreResult<ReplaceSummary>;

    /// Removes every document matching the example.
    async fn remove(&self, collection: &str, query: &Example) -> StoreResult<RemoveSummary>;

    /// Counts the documents matching the example.
    async fn count(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<u64>;

    /// Returns true when at least one document matches the example.
    async fn exists(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<bool>;

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .find(collection, &Example::by_id(id), &QueryOptions::default())
            .await?
            .into_iter()
            .next())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> StoreResult<UpdateSummary> {
        self.update(collection, &Example::by_id(id), data).await
    }

    async fn replace_by_id(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> StoreResult<ReplaceSummary> {
        self.replace(collection, &Example::by_id(id), data).await
    }

    async fn remove_by_id(&self, collection: &str, id: &str) -> StoreResult<RemoveSummary> {
        self.remove(collection, &Example::by_id(id)).await
    }
}

/// A [`Store`] bound to one database handle.
///
/// This is a borrowed view: building one per request costs nothing and it is dropped
/// with the request.
#[derive(Debug, Clone, Copy)]
pub struct ExampleStore<'a> {
    db: &'a dyn Database,
}

impl<'a> ExampleStore<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Returns the database this store is bound to.
    pub fn database(&self) -> &'a dyn Database {
        self.db
    }
}

#[async_trait]
impl Store for ExampleStore<'_> {
    async fn create(&self, collection: &str, data: Value) -> StoreResult<Value> {
        self.db.save(collection, data).await
    }

    async fn find(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<Vec<Value>> {
        self.db
            .by_example(collection, query, options)
            .await?
            .all()
            .await
    }

    async fn update(
        &self,
        collection: &str,
        query: &Example,
        data: Value,
    ) -> StoreResult<UpdateSummary> {
        self.db.update_by_example(collection, query, data).await
    }

    async fn replace(
        &self,
        collection: &str,
        query: &Example,
        data: Value,
    ) -> StoreResult<ReplaceSummary> {
        self.db.replace_by_example(collection, query, data).await
    }

    async fn remove(&self, collection: &str, query: &Example) -> StoreResult<RemoveSummary> {
        self.db.remove_by_example(collection, query).await
    }

    async fn count(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<u64> {
        let total = self.db.count_by_example(collection, query).await?;
        let remaining = total.saturating_sub(options.offset.unwrap_or(0) as u64);

        Ok(match options.limit {
            Some(limit) => remaining.min(limit as u64),
            None => remaining,
        })
    }

    async fn exists(
        &self,
        collection: &str,
        query: &Example,
        options: &QueryOptions,
    ) -> StoreResult<bool> {
        let options = options.clone().limit(1);

        Ok(self
            .db
            .by_example(collection, query, &options)
            .await?
            .next()
            .await?
            .is_some())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.db
            .by_example(collection, &Example::by_id(id), &QueryOptions::default())
            .await?
            .next()
            .await
    }
}

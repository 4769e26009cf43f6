//! [`Database`] implementation over a [`MemoryServer`].

use async_trait::async_trait;
use bson::{Bson, Document};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use docbus_core::{
    cursor::{BoxCursor, VecCursor},
    driver::{
        CollectionKind, Database, ReplaceSummary, RemoveSummary, SYSTEM_DATABASE, Transaction,
        UpdateSummary,
    },
    error::{DriverError, StoreResult},
    example::{Example, ID_FIELD, QueryOptions},
};

use crate::{
    evaluator::ExampleFilter,
    server::{
        Collection, DatabaseState, KEY_FIELD, MemoryServer, REV_FIELD, Scope, new_revision,
        to_document, to_value,
    },
};

/// Handle to one logical database of a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    server: MemoryServer,
    name: String,
}

const SYSTEM_FIELDS: [&str; 3] = [ID_FIELD, KEY_FIELD, REV_FIELD];

/// Merges `patch` into `target`, recursing into nested documents.
fn merge(target: &mut Document, patch: Document) {
    for (field, value) in patch {
        if SYSTEM_FIELDS.contains(&field.as_str()) {
            continue;
        }

        match value {
            Bson::Document(nested) => match target.get_mut(&field) {
                Some(Bson::Document(existing)) => merge(existing, nested),
                _ => {
                    target.insert(field, nested);
                }
            },
            value => {
                target.insert(field, value);
            }
        }
    }
}

/// Replaces the body of `target` with `body`, keeping its identity.
fn replace(target: &mut Document, body: Document) {
    let mut replaced = Document::new();
    for field in [ID_FIELD, KEY_FIELD] {
        if let Some(value) = target.get(field) {
            replaced.insert(field, value.clone());
        }
    }

    for (field, value) in body {
        if !SYSTEM_FIELDS.contains(&field.as_str()) {
            replaced.insert(field, value);
        }
    }

    *target = replaced;
}

impl MemoryDatabase {
    pub fn new(server: MemoryServer, name: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
        }
    }

    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    /// Applies `apply` to every matching document and returns how many were touched.
    async fn modify<F>(&self, collection: &str, example: &Example, mut apply: F) -> StoreResult<u64>
    where
        F: FnMut(&mut Document) -> StoreResult<()> + Send,
    {
        let filter = ExampleFilter::compile(example)?;
        let mut state = self.server.state.write().await;
        let coll = state.database_mut(&self.name)?.collection_mut(collection)?;

        let mut touched = 0;
        for document in coll.documents.iter_mut().filter(|doc| filter.matches(doc)) {
            apply(document)?;
            document.insert(REV_FIELD, new_revision());
            touched += 1;
        }

        Ok(touched)
    }

    /// Runs `run` against a copy of this database, committing the copy only when it succeeds.
    async fn atomically<T, F>(&self, run: F) -> StoreResult<T>
    where
        F: FnOnce(&mut DatabaseState) -> StoreResult<T> + Send,
    {
        let mut state = self.server.state.write().await;
        let current = state.database_mut(&self.name)?;

        let mut staged = current.clone();
        let output = run(&mut staged)?;
        *current = staged;

        Ok(output)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip(self, users), fields(database = %self.name))]
    async fn create_database(&self, name: &str, users: Vec<Value>) -> StoreResult<Value> {
        if self.name != SYSTEM_DATABASE {
            return Err(DriverError::Forbidden(format!(
                "databases can only be created from {SYSTEM_DATABASE}"
            ))
            .into());
        }

        let mut state = self.server.state.write().await;
        if state.databases.contains_key(name) {
            return Err(DriverError::DuplicateName(name.to_string()).into());
        }

        debug!(users = users.len(), "database created");
        state.databases.insert(
            name.to_string(),
            DatabaseState {
                users,
                ..Default::default()
            },
        );

        Ok(json!({ "result": true }))
    }

    #[instrument(level = "debug", skip(self), fields(database = %self.name))]
    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<Value> {
        let mut state = self.server.state.write().await;
        let db = state.database_mut(&self.name)?;

        if db.collections.contains_key(name) {
            return Err(DriverError::DuplicateName(name.to_string()).into());
        }
        db.collections
            .insert(name.to_string(), Collection::new(kind));

        let type_code = match kind {
            CollectionKind::Document => 2,
            CollectionKind::Edge => 3,
        };
        Ok(json!({ "name": name, "type": type_code }))
    }

    async fn query(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<BoxCursor> {
        let run = self
            .server
            .queries
            .get(query)
            .cloned()
            .ok_or_else(|| DriverError::Query(format!("unregistered query: {query}")))?;

        let records = self
            .atomically(|state| run(&mut Scope::new(state, None), &bind_vars))
            .await?;

        Ok(VecCursor::new(records).boxed())
    }

    #[instrument(level = "debug", skip_all, fields(database = %self.name))]
    async fn transaction(&self, transaction: Transaction) -> StoreResult<Value> {
        let run = self
            .server
            .actions
            .get(&transaction.action)
            .cloned()
            .ok_or_else(|| DriverError::Transaction("unregistered action".to_string()))?;

        if let Some(lock_timeout) = transaction.lock_timeout {
            debug!(lock_timeout, "lock timeout has no effect in memory");
        }

        let declared = &transaction.collections;
        self.atomically(|state| {
            for name in declared
                .read
                .iter()
                .chain(&declared.write)
                .chain(&declared.exclusive)
            {
                state.collection(name)?;
            }

            run(
                &mut Scope::new(state, Some(declared)),
                transaction.params.as_ref(),
            )
        })
        .await
    }

    async fn save(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let mut state = self.server.state.write().await;
        let saved = state
            .database_mut(&self.name)?
            .insert(collection, document)?;

        to_value(&saved)
    }

    async fn by_example(
        &self,
        collection: &str,
        example: &Example,
        options: &QueryOptions,
    ) -> StoreResult<BoxCursor> {
        let state = self.server.state.read().await;

        let records = state
            .database(&self.name)?
            .select(collection, example)?
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(to_value)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(VecCursor::new(records).boxed())
    }

    async fn update_by_example(
        &self,
        collection: &str,
        example: &Example,
        patch: Value,
    ) -> StoreResult<UpdateSummary> {
        let patch = to_document(patch)?;
        let updated = self
            .modify(collection, example, |document| {
                merge(document, patch.clone());
                Ok(())
            })
            .await?;

        Ok(UpdateSummary { updated })
    }

    async fn replace_by_example(
        &self,
        collection: &str,
        example: &Example,
        document: Value,
    ) -> StoreResult<ReplaceSummary> {
        let body = to_document(document)?;
        let replaced = self
            .modify(collection, example, |document| {
                replace(document, body.clone());
                Ok(())
            })
            .await?;

        Ok(ReplaceSummary { replaced })
    }

    async fn remove_by_example(
        &self,
        collection: &str,
        example: &Example,
    ) -> StoreResult<RemoveSummary> {
        let filter = ExampleFilter::compile(example)?;
        let mut state = self.server.state.write().await;
        let coll = state
            .database_mut(&self.name)?
            .collection_mut(collection)?;

        let before = coll.documents.len();
        coll.documents.retain(|doc| !filter.matches(doc));

        Ok(RemoveSummary {
            deleted: (before - coll.documents.len()) as u64,
        })
    }

    async fn count_by_example(&self, collection: &str, example: &Example) -> StoreResult<u64> {
        let state = self.server.state.read().await;

        Ok(state
            .database(&self.name)?
            .select(collection, example)?
            .count() as u64)
    }
}

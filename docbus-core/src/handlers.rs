//! Endpoint handlers of the store service.
//!
//! [`register`] installs every endpoint under one topic:
//!
//! | cmd | type | required | optional |
//! |---|---|---|---|
//! | `createDatabase` | | `name` | `users` |
//! | `executeTransaction` | | `collections`, `action` | `params`, `lockTimeout`, `databaseName` |
//! | `createCollection` | | `name` | `type`, `databaseName` |
//! | `executeAqlQuery` | `one` / `all` | `query` | `variables`, `databaseName` |
//! | `create` | | `collection`, `data` | `databaseName` |
//! | `update` / `replace` | | `collection`, `query`, `data` | `databaseName` |
//! | `updateById` / `replaceById` | | `collection`, `id`, `data` | `databaseName` |
//! | `remove` | | `collection`, `query` | `databaseName` |
//! | `removeById` / `findById` | | `collection`, `id` | `databaseName` |
//! | `find` / `count` / `exists` | | `collection`, `query` | `databaseName`, `options` |

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    driver::{CollectionKind, SYSTEM_DATABASE},
    error::StoreResult,
    request::{Pattern, Request},
    router::{Context, Router},
    store::{ExampleStore, Store},
    validate::{Schema, Shape},
};

/// Command names.
pub mod cmd {
    pub const CREATE_DATABASE: &str = "createDatabase";
    pub const EXECUTE_TRANSACTION: &str = "executeTransaction";
    pub const CREATE_COLLECTION: &str = "createCollection";
    pub const EXECUTE_AQL_QUERY: &str = "executeAqlQuery";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const UPDATE_BY_ID: &str = "updateById";
    pub const REMOVE: &str = "remove";
    pub const REMOVE_BY_ID: &str = "removeById";
    pub const REPLACE: &str = "replace";
    pub const REPLACE_BY_ID: &str = "replaceById";
    pub const FIND_BY_ID: &str = "findById";
    pub const FIND: &str = "find";
    pub const COUNT: &str = "count";
    pub const EXISTS: &str = "exists";
}

/// Raw query result modes.
pub mod query_type {
    /// Return only the first record.
    pub const ONE: &str = "one";
    /// Return every record.
    pub const ALL: &str = "all";
}

/// Registers every endpoint of the service under `topic`.
pub fn register(router: &mut Router, topic: &str) {
    let pattern = |cmd: &str| Pattern::new(topic, cmd);
    let crud = || {
        Schema::new()
            .required("collection", Shape::NonEmptyString)
            .optional("databaseName", Shape::NonEmptyString)
    };

    router
        .add(
            pattern(cmd::CREATE_DATABASE),
            Schema::new()
                .required("name", Shape::NonEmptyString)
                .optional("users", Shape::Array),
            create_database,
        )
        .add(
            pattern(cmd::EXECUTE_TRANSACTION),
            Schema::new()
                .required("collections", Shape::Collections)
                .required("action", Shape::NonEmptyString)
                .optional("params", Shape::Object)
                .optional("lockTimeout", Shape::Integer)
                .optional("databaseName", Shape::NonEmptyString),
            execute_transaction,
        )
        .add(
            pattern(cmd::CREATE_COLLECTION),
            Schema::new()
                .required("name", Shape::NonEmptyString)
                .optional("type", Shape::Any)
                .optional("databaseName", Shape::NonEmptyString),
            create_collection,
        )
        .add(
            pattern(cmd::EXECUTE_AQL_QUERY).with_type(query_type::ONE),
            raw_query_schema(),
            execute_query_one,
        )
        .add(
            pattern(cmd::EXECUTE_AQL_QUERY).with_type(query_type::ALL),
            raw_query_schema(),
            execute_query_all,
        )
        .add(
            pattern(cmd::CREATE),
            crud().required("data", Shape::Object),
            create,
        )
        .add(
            pattern(cmd::UPDATE),
            crud()
                .required("query", Shape::Object)
                .required("data", Shape::Object),
            update,
        )
        .add(
            pattern(cmd::UPDATE_BY_ID),
            crud()
                .required("id", Shape::NonEmptyString)
                .required("data", Shape::Object),
            update_by_id,
        )
        .add(
            pattern(cmd::REMOVE),
            crud().required("query", Shape::Object),
            remove,
        )
        .add(
            pattern(cmd::REMOVE_BY_ID),
            crud().required("id", Shape::NonEmptyString),
            remove_by_id,
        )
        .add(
            pattern(cmd::REPLACE),
            crud()
                .required("query", Shape::Object)
                .required("data", Shape::Object),
            replace,
        )
        .add(
            pattern(cmd::REPLACE_BY_ID),
            crud()
                .required("id", Shape::NonEmptyString)
                .required("data", Shape::Object),
            replace_by_id,
        )
        .add(
            pattern(cmd::FIND_BY_ID),
            crud().required("id", Shape::NonEmptyString),
            find_by_id,
        )
        .add(
            pattern(cmd::FIND),
            crud()
                .required("query", Shape::Object)
                .optional("options", Shape::Object),
            find,
        )
        .add(
            pattern(cmd::COUNT),
            crud()
                .required("query", Shape::Object)
                .optional("options", Shape::Object),
            count,
        )
        .add(
            pattern(cmd::EXISTS),
            crud()
                .required("query", Shape::Object)
                .optional("options", Shape::Object),
            exists,
        );
}

fn raw_query_schema() -> Schema {
    Schema::new()
        .required("query", Shape::StringOrObject)
        .optional("variables", Shape::Object)
        .optional("databaseName", Shape::NonEmptyString)
}

fn reply(value: impl Serialize) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Database creation always runs against the system database.
async fn create_database(context: Context, mut request: Request) -> StoreResult<Value> {
    let users = request.users.take().unwrap_or_default();
    let db = context.connection_to(SYSTEM_DATABASE).await?;

    db.create_database(request.name()?, users).await
}

async fn execute_transaction(context: Context, mut request: Request) -> StoreResult<Value> {
    let transaction = request.take_transaction()?;
    let db = context.connection(&request).await?;

    db.transaction(transaction).await
}

async fn create_collection(context: Context, request: Request) -> StoreResult<Value> {
    let kind = CollectionKind::from_flag(request.kind.as_ref());
    let db = context.connection(&request).await?;

    db.create_collection(request.name()?, kind).await
}

async fn execute_query_one(context: Context, mut request: Request) -> StoreResult<Value> {
    let raw = request.take_raw_query()?;
    let db = context.connection(&request).await?;

    let mut cursor = db.query(&raw.query, raw.bind_vars).await?;
    let first = cursor.next().await?;

    if let Err(err) = cursor.close().await {
        warn!(error = %err, "cursor not closed");
    }

    Ok(first.unwrap_or(Value::Null))
}

async fn execute_query_all(context: Context, mut request: Request) -> StoreResult<Value> {
    let raw = request.take_raw_query()?;
    let db = context.connection(&request).await?;

    reply(db.query(&raw.query, raw.bind_vars).await?.all().await?)
}

async fn create(context: Context, mut request: Request) -> StoreResult<Value> {
    let data = request.take_data()?;
    let db = context.connection(&request).await?;

    ExampleStore::new(db.as_ref())
        .create(request.collection()?, data)
        .await
}

async fn update(context: Context, mut request: Request) -> StoreResult<Value> {
    let (query, data) = (request.example()?, request.take_data()?);
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .update(request.collection()?, &query, data)
            .await?,
    )
}

async fn update_by_id(context: Context, mut request: Request) -> StoreResult<Value> {
    let data = request.take_data()?;
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .update_by_id(request.collection()?, request.id()?, data)
            .await?,
    )
}

async fn remove(context: Context, request: Request) -> StoreResult<Value> {
    let query = request.example()?;
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .remove(request.collection()?, &query)
            .await?,
    )
}

async fn remove_by_id(context: Context, request: Request) -> StoreResult<Value> {
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .remove_by_id(request.collection()?, request.id()?)
            .await?,
    )
}

async fn replace(context: Context, mut request: Request) -> StoreResult<Value> {
    let (query, data) = (request.example()?, request.take_data()?);
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .replace(request.collection()?, &query, data)
            .await?,
    )
}

async fn replace_by_id(context: Context, mut request: Request) -> StoreResult<Value> {
    let data = request.take_data()?;
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .replace_by_id(request.collection()?, request.id()?, data)
            .await?,
    )
}

async fn find_by_id(context: Context, request: Request) -> StoreResult<Value> {
    let db = context.connection(&request).await?;

    let found = ExampleStore::new(db.as_ref())
        .find_by_id(request.collection()?, request.id()?)
        .await?;
    Ok(found.unwrap_or(Value::Null))
}

async fn find(context: Context, request: Request) -> StoreResult<Value> {
    let (query, options) = (request.example()?, request.query_options()?);
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .find(request.collection()?, &query, &options)
            .await?,
    )
}

async fn count(context: Context, request: Request) -> StoreResult<Value> {
    let (query, options) = (request.example()?, request.query_options()?);
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .count(request.collection()?, &query, &options)
            .await?,
    )
}

async fn exists(context: Context, request: Request) -> StoreResult<Value> {
    let (query, options) = (request.example()?, request.query_options()?);
    let db = context.connection(&request).await?;

    reply(
        ExampleStore::new(db.as_ref())
            .exists(request.collection()?, &query, &options)
            .await?,
    )
}

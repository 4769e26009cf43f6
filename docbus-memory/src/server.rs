//! In-process database server.
//!
//! A [`MemoryServer`] holds any number of logical databases, starting with `_system`. Clones
//! share the same data, so every handle produced for a database name observes the same
//! collections.
//!
//! Raw queries and transaction actions are not parsed: they are looked up by their exact text in
//! registries filled through [`MemoryServerBuilder`], and run as Rust closures over a [`Scope`].

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use mea::rwlock::RwLock;
use serde_json::{Map, Number, Value};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::debug;
use uuid::Uuid;

use docbus_core::{
    driver::{
        CollectionKind, Connection, ConnectionOptions, Connector, SYSTEM_DATABASE,
        TransactionCollections,
    },
    error::{DriverError, StoreError, StoreResult},
    example::{Example, ID_FIELD},
};

use crate::{database::MemoryDatabase, evaluator::ExampleFilter};

pub(crate) const KEY_FIELD: &str = "_key";
pub(crate) const REV_FIELD: &str = "_rev";
const FROM_FIELD: &str = "_from";
const TO_FIELD: &str = "_to";

/// A registered raw query.
pub type QueryFn =
    Arc<dyn Fn(&mut Scope<'_>, &Map<String, Value>) -> StoreResult<Vec<Value>> + Send + Sync>;

/// A registered transaction action. Receives the transaction's `params`.
pub type ActionFn =
    Arc<dyn Fn(&mut Scope<'_>, Option<&Value>) -> StoreResult<Value> + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct Collection {
    pub kind: CollectionKind,
    pub documents: Vec<Document>,
    next_key: u64,
}

impl Collection {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            documents: Vec::new(),
            next_key: 1,
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        self.documents
            .iter()
            .any(|doc| doc.get_str(KEY_FIELD).is_ok_and(|k| k == key))
    }

    /// Returns a key never handed out before in this collection.
    fn generate_key(&mut self) -> String {
        loop {
            let key = self.next_key.to_string();
            self.next_key += 1;

            if !self.contains_key(&key) {
                return key;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub collections: HashMap<String, Collection>,
    pub users: Vec<Value>,
}

impl DatabaseState {
    pub fn collection(&self, name: &str) -> StoreResult<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| DriverError::CollectionNotFound(name.to_string()).into())
    }

    pub fn collection_mut(&mut self, name: &str) -> StoreResult<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| DriverError::CollectionNotFound(name.to_string()).into())
    }

    /// Inserts a document, assigning `_key`, `_id` and `_rev`, and returns the stored form.
    pub fn insert(&mut self, collection: &str, document: Value) -> StoreResult<Document> {
        let mut document = to_document(document)?;
        let coll = self.collection_mut(collection)?;

        if coll.kind == CollectionKind::Edge {
            for field in [FROM_FIELD, TO_FIELD] {
                if document.get_str(field).is_err() {
                    return Err(DriverError::Query(format!(
                        "edge attribute missing or invalid: {field}"
                    ))
                    .into());
                }
            }
        }

        let key = match document.get(KEY_FIELD) {
            Some(Bson::String(key)) if coll.contains_key(key) => {
                return Err(DriverError::DuplicateName(format!("{collection}/{key}")).into());
            }
            Some(Bson::String(key)) => key.clone(),
            _ => coll.generate_key(),
        };

        document.insert(ID_FIELD, format!("{collection}/{key}"));
        document.insert(KEY_FIELD, key);
        document.insert(REV_FIELD, new_revision());
        coll.documents.push(document.clone());

        Ok(document)
    }

    pub fn select(
        &self,
        collection: &str,
        example: &Example,
    ) -> StoreResult<impl Iterator<Item = &Document>> {
        let filter = ExampleFilter::compile(example)?;

        Ok(self
            .collection(collection)?
            .documents
            .iter()
            .filter(move |doc| filter.matches(doc)))
    }
}

#[derive(Debug)]
pub(crate) struct ServerState {
    pub databases: HashMap<String, DatabaseState>,
}

impl Default for ServerState {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert(SYSTEM_DATABASE.to_string(), DatabaseState::default());

        Self { databases }
    }
}

impl ServerState {
    pub fn database(&self, name: &str) -> StoreResult<&DatabaseState> {
        self.databases
            .get(name)
            .ok_or_else(|| DriverError::DatabaseNotFound(name.to_string()).into())
    }

    pub fn database_mut(&mut self, name: &str) -> StoreResult<&mut DatabaseState> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| DriverError::DatabaseNotFound(name.to_string()).into())
    }
}

/// View of one database handed to registered queries and transaction actions.
///
/// Inside a transaction, reads and writes are limited to the declared collections.
pub struct Scope<'a> {
    state: &'a mut DatabaseState,
    declared: Option<&'a TransactionCollections>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        state: &'a mut DatabaseState,
        declared: Option<&'a TransactionCollections>,
    ) -> Self {
        Self { state, declared }
    }

    fn check(&self, collection: &str, write: bool) -> StoreResult<()> {
        let allowed = match self.declared {
            None => true,
            Some(declared) if write => declared.allows_write(collection),
            Some(declared) => declared.allows_read(collection),
        };

        if allowed {
            return Ok(());
        }

        Err(DriverError::Transaction(format!(
            "collection '{collection}' not declared for {}",
            if write { "write" } else { "read" }
        ))
        .into())
    }

    /// Every document of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.check(collection, false)?;

        self.state
            .collection(collection)?
            .documents
            .iter()
            .map(to_value)
            .collect()
    }

    /// Documents of a collection matching an example.
    pub fn find(&self, collection: &str, example: &Example) -> StoreResult<Vec<Value>> {
        self.check(collection, false)?;

        self.state.select(collection, example)?.map(to_value).collect()
    }

    /// Inserts a document and returns it with its generated identifier.
    pub fn save(&mut self, collection: &str, document: Value) -> StoreResult<Value> {
        self.check(collection, true)?;

        to_value(&self.state.insert(collection, document)?)
    }
}

/// In-process, thread-safe document database server.
#[derive(Clone)]
pub struct MemoryServer {
    pub(crate) state: Arc<RwLock<ServerState>>,
    pub(crate) queries: Arc<HashMap<String, QueryFn>>,
    pub(crate) actions: Arc<HashMap<String, ActionFn>>,
}

impl MemoryServer {
    /// Creates a server holding only an empty `_system` database and no registered queries.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryServerBuilder {
        MemoryServerBuilder::default()
    }

    /// Returns a handle to a logical database. The database need not exist yet.
    pub fn database(&self, name: &str) -> MemoryDatabase {
        MemoryDatabase::new(self.clone(), name)
    }

    /// User records a database was created with.
    pub async fn users(&self, database: &str) -> StoreResult<Vec<Value>> {
        Ok(self.state.read().await.database(database)?.users.clone())
    }

    /// Names of all existing databases.
    pub async fn databases(&self) -> Vec<String> {
        self.state.read().await.databases.keys().cloned().collect()
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryServer")
            .field("queries", &self.queries.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Connector for MemoryServer {
    fn connect(&self, options: &ConnectionOptions) -> StoreResult<Connection> {
        debug!(database = %options.database_name, "memory handle created");
        Ok(Arc::new(self.database(&options.database_name)))
    }
}

/// Builder for [`MemoryServer`], registering the raw queries and actions it can execute.
///
/// ```ignore
/// let server = MemoryServer::builder()
///     .database("test")
///     .query("FOR u IN users RETURN u", |scope, _| scope.documents("users"))
///     .action("function () { return true }", |_, _| Ok(json!(true)))
///     .build();
/// ```
#[derive(Default)]
pub struct MemoryServerBuilder {
    databases: Vec<String>,
    queries: HashMap<String, QueryFn>,
    actions: HashMap<String, ActionFn>,
}

impl MemoryServerBuilder {
    /// Creates a database up front, next to `_system`.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.databases.push(name.into());
        self
    }

    /// Registers the behaviour of a raw query, keyed by its exact text.
    pub fn query<F>(mut self, query: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut Scope<'_>, &Map<String, Value>) -> StoreResult<Vec<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.queries.insert(query.into(), Arc::new(run));
        self
    }

    /// Registers the behaviour of a transaction action, keyed by its exact text.
    pub fn action<F>(mut self, action: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut Scope<'_>, Option<&Value>) -> StoreResult<Value> + Send + Sync + 'static,
    {
        self.actions.insert(action.into(), Arc::new(run));
        self
    }

    pub fn build(self) -> MemoryServer {
        let mut state = ServerState::default();
        for name in self.databases {
            state.databases.entry(name).or_default();
        }

        MemoryServer {
            state: Arc::new(RwLock::new(state)),
            queries: Arc::new(self.queries),
            actions: Arc::new(self.actions),
        }
    }
}

pub(crate) fn new_revision() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Converts JSON to BSON. Integers beyond the signed 64-bit range are stored as doubles.
pub(crate) fn to_bson(mut value: Value) -> StoreResult<Bson> {
    widen_integers(&mut value);
    Ok(serialize_to_bson(&value)?)
}

fn widen_integers(value: &mut Value) {
    match value {
        Value::Number(number) if number.is_u64() && !number.is_i64() => {
            if let Some(wide) = number.as_f64().and_then(Number::from_f64) {
                *number = wide;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(widen_integers),
        Value::Object(fields) => fields.values_mut().for_each(widen_integers),
        _ => {}
    }
}

pub(crate) fn to_document(value: Value) -> StoreResult<Document> {
    match to_bson(value)? {
        Bson::Document(document) => Ok(document),
        _ => Err(StoreError::Serialization(
            "document must be an object".to_string(),
        )),
    }
}

pub(crate) fn to_value(document: &Document) -> StoreResult<Value> {
    Ok(deserialize_from_bson(Bson::Document(document.clone()))?)
}

//! Per-request database connection resolution.
//!
//! A [`ConnectionResolver`] maps a logical database name to a [`Connection`], building at most
//! one connection per name and keeping it in an injected [`ConnectionCache`] for the cache's
//! lifetime. How connections are built is fixed at startup by a [`ConnectionSource`]:
//!
//! - [`ConnectionSource::Options`]: raw options cloned per database name and handed to a
//!   [`Connector`]
//! - [`ConnectionSource::Prebuilt`]: a single ready connection that can only serve its own
//!   database

use mea::rwlock::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, instrument, warn};

use crate::{
    driver::{Connection, ConnectionOptions, Connector},
    error::{StoreError, StoreResult},
};

/// Where connections come from.
#[derive(Clone)]
pub enum ConnectionSource {
    /// Build a connection per database from these options.
    Options {
        options: ConnectionOptions,
        connector: Arc<dyn Connector>,
    },
    /// Serve every request from this single connection.
    Prebuilt(Connection),
}

impl ConnectionSource {
    pub fn options(options: ConnectionOptions, connector: impl Connector + 'static) -> Self {
        ConnectionSource::Options {
            options,
            connector: Arc::new(connector),
        }
    }

    pub fn prebuilt(connection: Connection) -> Self {
        ConnectionSource::Prebuilt(connection)
    }

    /// The database this source serves when a request names none.
    pub fn database_name(&self) -> &str {
        match self {
            ConnectionSource::Options { options, .. } => &options.database_name,
            ConnectionSource::Prebuilt(connection) => connection.name(),
        }
    }
}

impl fmt::Debug for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSource::Options { options, connector } => f
                .debug_struct("Options")
                .field("url", &options.url)
                .field("database_name", &options.database_name)
                .field("connector", connector)
                .finish(),
            ConnectionSource::Prebuilt(connection) => {
                f.debug_tuple("Prebuilt").field(&connection.name()).finish()
            }
        }
    }
}

/// Process-wide cache of connections keyed by database name.
///
/// Reads take a shared lock; a miss re-checks under the exclusive lock before inserting, so
/// concurrent first requests for the same name end up sharing one connection.
#[derive(Default)]
pub struct ConnectionCache {
    connections: RwLock<HashMap<String, Connection>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Connection> {
        self.connections.read().await.get(name).cloned()
    }

    /// Returns the cached connection for `name`, building and inserting one if absent.
    pub async fn get_or_try_insert_with<F>(&self, name: &str, build: F) -> StoreResult<Connection>
    where
        F: FnOnce() -> StoreResult<Connection>,
    {
        let mut connections = self.connections.write().await;

        if let Some(connection) = connections.get(name) {
            return Ok(connection.clone());
        }

        let connection = build()?;
        connections.insert(name.to_string(), connection.clone());

        Ok(connection)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCache").finish_non_exhaustive()
    }
}

/// Resolves logical database names to connections.
#[derive(Debug)]
pub struct ConnectionResolver {
    source: ConnectionSource,
    default_database: String,
    cache: Arc<ConnectionCache>,
}

impl ConnectionResolver {
    /// Creates a resolver whose default database is the one named by the source.
    pub fn new(source: ConnectionSource, cache: Arc<ConnectionCache>) -> Self {
        let default_database = source.database_name().to_string();

        Self {
            source,
            default_database,
            cache,
        }
    }

    /// Overrides the database used when a request names none.
    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }

    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    pub fn cache(&self) -> &Arc<ConnectionCache> {
        &self.cache
    }

    /// Returns the connection for `name`, or for the default database when `name` is `None`.
    #[instrument(level = "debug", skip(self), fields(default_database = %self.default_database))]
    pub async fn resolve(&self, name: Option<&str>) -> StoreResult<Connection> {
        let name = name.unwrap_or(self.default_database.as_str());

        if let Some(connection) = self.cache.get(name).await {
            debug!(database = name, "connection cache hit");
            return Ok(connection);
        }

        match &self.source {
            ConnectionSource::Options { options, connector } => {
                self.cache
                    .get_or_try_insert_with(name, || {
                        debug!(database = name, url = %options.url, "creating connection");
                        connector.connect(&options.for_database(name))
                    })
                    .await
            }
            ConnectionSource::Prebuilt(connection) => {
                if connection.name() != name {
                    warn!(
                        configured = connection.name(),
                        requested = name,
                        "prebuilt connection cannot serve requested database"
                    );
                    return Err(StoreError::ConfigurationMismatch {
                        configured: connection.name().to_string(),
                        requested: name.to_string(),
                    });
                }

                self.cache
                    .get_or_try_insert_with(name, || Ok(connection.clone()))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cursor::{BoxCursor, VecCursor},
        driver::{
            CollectionKind, Database, RemoveSummary, ReplaceSummary, Transaction, UpdateSummary,
        },
        example::{Example, QueryOptions},
    };
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct NamedDatabase(String);

    #[async_trait]
    impl Database for NamedDatabase {
        fn name(&self) -> &str {
            &self.0
        }

        async fn create_database(&self, _: &str, _: Vec<Value>) -> StoreResult<Value> {
            Ok(Value::Bool(true))
        }

        async fn create_collection(&self, _: &str, _: CollectionKind) -> StoreResult<Value> {
            Ok(Value::Null)
        }

        async fn query(&self, _: &str, _: Map<String, Value>) -> StoreResult<BoxCursor> {
            Ok(VecCursor::default().boxed())
        }

        async fn transaction(&self, _: Transaction) -> StoreResult<Value> {
            Ok(Value::Null)
        }

        async fn save(&self, _: &str, document: Value) -> StoreResult<Value> {
            Ok(document)
        }

        async fn by_example(&self, _: &str, _: &Example, _: &QueryOptions) -> StoreResult<BoxCursor> {
            Ok(VecCursor::default().boxed())
        }

        async fn update_by_example(&self, _: &str, _: &Example, _: Value) -> StoreResult<UpdateSummary> {
            Ok(UpdateSummary::default())
        }

        async fn replace_by_example(&self, _: &str, _: &Example, _: Value) -> StoreResult<ReplaceSummary> {
            Ok(ReplaceSummary::default())
        }

        async fn remove_by_example(&self, _: &str, _: &Example) -> StoreResult<RemoveSummary> {
            Ok(RemoveSummary::default())
        }

        async fn count_by_example(&self, _: &str, _: &Example) -> StoreResult<u64> {
            Ok(0)
        }
    }

    #[derive(Debug, Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl Connector for Arc<CountingConnector> {
        fn connect(&self, options: &ConnectionOptions) -> StoreResult<Connection> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NamedDatabase(options.database_name.clone())))
        }
    }

    fn options_resolver() -> (ConnectionResolver, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector::default());
        let source = ConnectionSource::options(
            ConnectionOptions::new("http://localhost:8529", "test"),
            connector.clone(),
        );

        (
            ConnectionResolver::new(source, Arc::new(ConnectionCache::new())),
            connector,
        )
    }

    #[tokio::test]
    async fn same_name_resolves_to_identical_connection() {
        let (resolver, connector) = options_resolver();

        let first = resolver.resolve(Some("tenant")).await.unwrap();
        let second = resolver.resolve(Some("tenant")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "tenant");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_name_uses_default_database() {
        let (resolver, _) = options_resolver();

        let default = resolver.resolve(None).await.unwrap();
        let named = resolver.resolve(Some("test")).await.unwrap();

        assert_eq!(default.name(), "test");
        assert!(Arc::ptr_eq(&default, &named));
    }

    #[tokio::test]
    async fn default_database_can_be_overridden() {
        let (resolver, _) = options_resolver();
        let resolver = resolver.with_default_database("other");

        assert_eq!(resolver.resolve(None).await.unwrap().name(), "other");
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_connections() {
        let (resolver, connector) = options_resolver();

        let a = resolver.resolve(Some("a")).await.unwrap();
        let b = resolver.resolve(Some("b")).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(resolver.cache().len().await, 2);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_first_access_builds_one_connection() {
        let (resolver, connector) = options_resolver();
        let resolver = Arc::new(resolver);

        let tasks = (0..16)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(Some("race")).await.unwrap() })
            })
            .collect::<Vec<_>>();

        let mut connections = Vec::new();
        for task in tasks {
            connections.push(task.await.unwrap());
        }

        assert!(connections.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prebuilt_connection_serves_only_its_own_database() {
        let prebuilt: Connection = Arc::new(NamedDatabase("test".into()));
        let resolver = ConnectionResolver::new(
            ConnectionSource::prebuilt(prebuilt.clone()),
            Arc::new(ConnectionCache::new()),
        );

        let resolved = resolver.resolve(None).await.unwrap();
        assert!(Arc::ptr_eq(&resolved, &prebuilt));

        let err = resolver.resolve(Some("other")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConfigurationMismatch { ref configured, ref requested }
                if configured == "test" && requested == "other"
        ));
        assert_eq!(resolver.cache().len().await, 1);
    }
}

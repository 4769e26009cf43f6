//! The store service: a router with every endpoint registered over one connection resolver.
//!
//! # Example
//!
//! ```ignore
//! use docbus_core::{service::StoreService, resolver::ConnectionSource};
//! use serde_json::json;
//!
//! let service = StoreService::builder(ConnectionSource::options(options, connector))
//!     .default_database("test")
//!     .build();
//!
//! let created = service
//!     .act(json!({
//!         "topic": "arango-store",
//!         "cmd": "create",
//!         "collection": "users",
//!         "data": { "name": "peter" }
//!     }))
//!     .await?;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::{DEFAULT_TOPIC, ServiceConfig},
    driver::Connector,
    error::{ErrorReply, StoreResult},
    handlers,
    resolver::{ConnectionCache, ConnectionResolver, ConnectionSource},
    router::Router,
    validate::Validator,
};

/// Transport representation of a served request.
///
/// Serializes as `{ "result": ... }` or `{ "error": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Result(Value),
    Error(ErrorReply),
}

impl From<StoreResult<Value>> for Reply {
    fn from(result: StoreResult<Value>) -> Self {
        match result {
            Ok(value) => Reply::Result(value),
            Err(err) => Reply::Error(ErrorReply::from(&err)),
        }
    }
}

/// Request/response service over a document database.
#[derive(Debug)]
pub struct StoreService {
    topic: String,
    router: Router,
    resolver: Arc<ConnectionResolver>,
}

impl StoreService {
    pub fn builder(source: ConnectionSource) -> StoreServiceBuilder {
        StoreServiceBuilder::new(source)
    }

    /// Builds a service from configuration, connecting through `connector`.
    pub fn from_config(config: &ServiceConfig, connector: impl Connector + 'static) -> Self {
        Self::builder(ConnectionSource::options(config.arango.clone(), connector))
            .topic(config.topic.clone())
            .default_database(config.default_database())
            .build()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// Serves one request.
    pub async fn act(&self, request: Value) -> StoreResult<Value> {
        self.router.dispatch(request).await
    }

    /// Serves one request and renders the outcome for the transport.
    pub async fn reply(&self, request: Value) -> Reply {
        self.act(request).await.into()
    }
}

/// Builder for [`StoreService`].
pub struct StoreServiceBuilder {
    source: ConnectionSource,
    topic: String,
    default_database: Option<String>,
    cache: Option<Arc<ConnectionCache>>,
    validator: Option<Arc<dyn Validator>>,
}

impl StoreServiceBuilder {
    pub fn new(source: ConnectionSource) -> Self {
        Self {
            source,
            topic: DEFAULT_TOPIC.to_string(),
            default_database: None,
            cache: None,
            validator: None,
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = Some(name.into());
        self
    }

    /// Shares an existing connection cache instead of starting with an empty one.
    pub fn cache(mut self, cache: Arc<ConnectionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn build(self) -> StoreService {
        let mut resolver = ConnectionResolver::new(self.source, self.cache.unwrap_or_default());
        if let Some(name) = self.default_database {
            resolver = resolver.with_default_database(name);
        }
        let resolver = Arc::new(resolver);

        let mut router = Router::new(resolver.clone());
        if let Some(validator) = self.validator {
            router = router.with_validator(validator);
        }
        handlers::register(&mut router, &self.topic);

        StoreService {
            topic: self.topic,
            router,
            resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ValidationError};
    use serde_json::json;

    #[test]
    fn reply_serializes_result_and_error() {
        let ok: Reply = Ok::<_, StoreError>(json!([1, 2])).into();
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "result": [1, 2] }));

        let err: Reply = Err::<Value, _>(StoreError::from(ValidationError::required("id"))).into();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({
                "error": {
                    "name": "ValidationError",
                    "message": "Validation error: \"id\" is required",
                    "field": "id"
                }
            })
        );
    }
}

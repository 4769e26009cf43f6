//! Request routing.
//!
//! The [`Router`] keeps one handler per [`Pattern`]. Dispatching a request:
//!
//! 1. reads its pattern; a request carrying a `type` that no endpoint is registered under falls
//!    back to the untyped pattern, so `type` can double as a payload field
//! 2. validates the raw request against the endpoint's [`Schema`]
//! 3. calls the handler with a [`Context`] for database resolution
//!
//! Failures of any step are returned to the caller as-is; nothing is retried.

use futures::future::BoxFuture;
use serde_json::Value;
use std::{collections::HashMap, fmt, future::Future, sync::Arc};
use tracing::{debug, instrument, warn};

use crate::{
    driver::Connection,
    error::{StoreError, StoreResult, ValidationError},
    request::{Pattern, Request},
    resolver::ConnectionResolver,
    validate::{Schema, SchemaValidator, Validator},
};

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, StoreResult<Value>>;

/// An endpoint implementation.
///
/// Implemented for every `Fn(Context, Request) -> impl Future<Output = StoreResult<Value>>`,
/// so plain `async fn`s can be registered directly.
pub trait Handler: Send + Sync {
    fn call(&self, context: Context, request: Request) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = StoreResult<Value>> + Send + 'static,
{
    fn call(&self, context: Context, request: Request) -> HandlerFuture {
        Box::pin((self)(context, request))
    }
}

/// Per-request handler context.
#[derive(Debug, Clone)]
pub struct Context {
    resolver: Arc<ConnectionResolver>,
}

impl Context {
    pub fn new(resolver: Arc<ConnectionResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ConnectionResolver {
        &self.resolver
    }

    /// Resolves the database the request targets: its `databaseName`, else the default.
    pub async fn connection(&self, request: &Request) -> StoreResult<Connection> {
        self.resolver
            .resolve(request.database_name.as_deref())
            .await
    }

    /// Resolves a database by name regardless of the request's target.
    pub async fn connection_to(&self, name: &str) -> StoreResult<Connection> {
        self.resolver.resolve(Some(name)).await
    }
}

struct Route {
    schema: Schema,
    handler: Arc<dyn Handler>,
}

/// Registry of endpoints keyed by pattern.
pub struct Router {
    routes: HashMap<Pattern, Route>,
    validator: Arc<dyn Validator>,
    context: Context,
}

impl Router {
    pub fn new(resolver: Arc<ConnectionResolver>) -> Self {
        Self {
            routes: HashMap::new(),
            validator: Arc::new(SchemaValidator),
            context: Context::new(resolver),
        }
    }

    /// Replaces the validator applied before every handler.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Registers a handler. A later registration for the same pattern replaces the earlier one.
    pub fn add<H>(&mut self, pattern: Pattern, schema: Schema, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        let route = Route {
            schema,
            handler: Arc::new(handler),
        };

        if self.routes.insert(pattern.clone(), route).is_some() {
            warn!(%pattern, "handler replaced");
        }

        self
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.routes.keys()
    }

    pub fn schema(&self, pattern: &Pattern) -> Option<&Schema> {
        self.route(pattern).map(|route| &route.schema)
    }

    fn route(&self, pattern: &Pattern) -> Option<&Route> {
        self.routes.get(pattern).or_else(|| match pattern.kind {
            Some(_) => self.routes.get(&pattern.untyped()),
            None => None,
        })
    }

    /// Validates and serves one request.
    #[instrument(level = "debug", skip_all, fields(pattern = tracing::field::Empty))]
    pub async fn dispatch(&self, request: Value) -> StoreResult<Value> {
        let request = match request {
            Value::Object(request) => request,
            _ => return Err(ValidationError::new("request", "must be an object").into()),
        };

        let pattern = Pattern::of(&request)?;
        tracing::Span::current().record("pattern", tracing::field::display(&pattern));

        let route = self
            .route(&pattern)
            .ok_or_else(|| StoreError::PatternNotFound(pattern.to_string()))?;

        if let Err(err) = self.validator.validate(&route.schema, &request) {
            warn!(%pattern, field = %err.field, reason = %err.reason, "request rejected");
            return Err(err.into());
        }

        let result = route
            .handler
            .call(self.context.clone(), Request::from_map(request, &route.schema)?)
            .await;

        match &result {
            Ok(_) => debug!(%pattern, "request served"),
            Err(err) => debug!(%pattern, error = %err, "request failed"),
        }

        result
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("patterns", &self.routes.keys().collect::<Vec<_>>())
            .field("validator", &self.validator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::ConnectionOptions,
        resolver::{ConnectionCache, ConnectionSource},
        validate::Shape,
    };
    use serde_json::json;

    #[derive(Debug)]
    struct NoConnector;

    impl crate::driver::Connector for NoConnector {
        fn connect(&self, _: &ConnectionOptions) -> StoreResult<Connection> {
            Err(StoreError::Configuration("no databases in router tests".into()))
        }
    }

    fn router() -> Router {
        let resolver = ConnectionResolver::new(
            ConnectionSource::options(ConnectionOptions::default(), NoConnector),
            Arc::new(ConnectionCache::new()),
        );

        let mut router = Router::new(Arc::new(resolver));
        router
            .add(
                Pattern::new("test", "echo"),
                Schema::new().required("name", Shape::NonEmptyString),
                |_: Context, request: Request| async move { Ok::<_, StoreError>(json!(request.name)) },
            )
            .add(
                Pattern::new("test", "pick").with_type("one"),
                Schema::new(),
                |_: Context, _: Request| async move { Ok::<_, StoreError>(json!("one")) },
            )
            .add(
                Pattern::new("test", "pick").with_type("all"),
                Schema::new(),
                |_: Context, _: Request| async move { Ok::<_, StoreError>(json!("all")) },
            );
        router
    }

    #[tokio::test]
    async fn dispatches_to_matching_handler() {
        let result = router()
            .dispatch(json!({ "topic": "test", "cmd": "echo", "name": "peter" }))
            .await
            .unwrap();

        assert_eq!(result, json!("peter"));
    }

    #[tokio::test]
    async fn type_discriminates_between_handlers() {
        let router = router();

        let one = router
            .dispatch(json!({ "topic": "test", "cmd": "pick", "type": "one" }))
            .await
            .unwrap();
        let all = router
            .dispatch(json!({ "topic": "test", "cmd": "pick", "type": "all" }))
            .await
            .unwrap();

        assert_eq!((one, all), (json!("one"), json!("all")));
    }

    #[tokio::test]
    async fn unregistered_type_falls_back_to_untyped_pattern() {
        let result = router()
            .dispatch(json!({ "topic": "test", "cmd": "echo", "type": "edge", "name": "x" }))
            .await
            .unwrap();

        assert_eq!(result, json!("x"));
    }

    #[tokio::test]
    async fn validation_runs_before_handler() {
        let err = router()
            .dispatch(json!({ "topic": "test", "cmd": "echo" }))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Validation(ref e) if e.field == "name"));
    }

    #[tokio::test]
    async fn unknown_pattern_is_reported() {
        let err = router()
            .dispatch(json!({ "topic": "test", "cmd": "pick", "type": "some" }))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::PatternNotFound(ref p) if p == "topic:test,cmd:pick,type:some"));
    }

    #[tokio::test]
    async fn non_object_request_is_rejected() {
        let err = router().dispatch(json!("find")).await.unwrap_err();

        assert!(matches!(err, StoreError::Validation(ref e) if e.field == "request"));
    }
}

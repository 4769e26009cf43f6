//! [`Database`] implementation over the ArangoDB HTTP API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, instrument};

use docbus_core::{
    cursor::{BoxCursor, Cursor},
    driver::{
        CollectionKind, ConnectionOptions, Database, RemoveSummary, ReplaceSummary, Transaction,
        UpdateSummary,
    },
    error::StoreResult,
    example::{Example, QueryOptions},
};

use crate::{
    aql::{Action, AqlQuery},
    error::ArangoError,
};

/// Handle to one logical database on an ArangoDB server.
///
/// Cloning is cheap; clones share the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct ArangoDatabase {
    client: Client,
    options: ConnectionOptions,
}

impl ArangoDatabase {
    pub fn new(client: Client, options: ConnectionOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// URL of an API path scoped to this database, given as unencoded segments such as
    /// `["_api", "cursor"]`.
    pub fn endpoint(&self, path: &[&str]) -> Result<Url, ArangoError> {
        let mut url = Url::parse(&self.options.url)
            .map_err(|e| ArangoError::Url(format!("{}: {e}", self.options.url)))?;

        url.path_segments_mut()
            .map_err(|_| ArangoError::Url(format!("{}: not a base url", self.options.url)))?
            .pop_if_empty()
            .extend(["_db", self.options.database_name.as_str()])
            .extend(path);

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut request = self.client.request(method, url);

        if let Some(username) = &self.options.username {
            request = request.basic_auth(username, self.options.password.as_ref());
        }
        if let Some(secs) = self.options.timeout_secs {
            request = request.timeout(Duration::from_secs(secs));
        }

        request
    }

    async fn call(&self, method: Method, path: &[&str], body: &Value) -> StoreResult<Value> {
        let url = self.endpoint(path)?;

        Ok(send(self.request(method, url).json(body)).await?)
    }

    async fn cursor(&self, aql: &AqlQuery) -> StoreResult<ArangoCursor> {
        let body = self
            .call(
                Method::POST,
                &["_api", "cursor"],
                &json!({ "query": aql.query, "bindVars": aql.bind_vars, "count": true }),
            )
            .await?;

        ArangoCursor::from_batch(self.clone(), body)
    }

    /// Runs a query expected to return exactly one number.
    async fn scalar(&self, aql: AqlQuery) -> StoreResult<u64> {
        let value = self.cursor(&aql).await?.next().await?;

        Ok(value
            .and_then(|value| value.as_u64())
            .ok_or_else(|| ArangoError::Body("expected a numeric result".to_string()))?)
    }
}

/// Sends a request and returns the JSON body of a successful response.
async fn send(request: RequestBuilder) -> Result<Value, ArangoError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

    if !status.is_success() {
        return Err(ArangoError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

/// Removes the `error` and `code` envelope fields from a response body.
fn strip_envelope(mut body: Value) -> Value {
    if let Some(fields) = body.as_object_mut() {
        fields.remove("error");
        fields.remove("code");
    }

    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorBatch {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    count: Option<usize>,
}

/// Server-side cursor, fetched one batch at a time.
#[derive(Debug)]
pub struct ArangoCursor {
    db: ArangoDatabase,
    id: Option<String>,
    batch: VecDeque<Value>,
    has_more: bool,
    count: Option<usize>,
}

impl ArangoCursor {
    fn from_batch(db: ArangoDatabase, body: Value) -> StoreResult<Self> {
        let batch = CursorBatch::deserialize(body)?;

        Ok(Self {
            db,
            id: batch.id,
            batch: batch.result.into(),
            has_more: batch.has_more,
            count: batch.count,
        })
    }

    async fn fetch_next_batch(&mut self) -> StoreResult<()> {
        let Some(id) = self.id.clone() else {
            self.has_more = false;
            return Ok(());
        };

        debug!(cursor = %id, "fetching next batch");
        let url = self.db.endpoint(&["_api", "cursor", id.as_str()])?;
        let body = send(self.db.request(Method::PUT, url)).await?;
        let batch = CursorBatch::deserialize(body)?;

        self.batch.extend(batch.result);
        self.has_more = batch.has_more;
        Ok(())
    }
}

#[async_trait]
impl Cursor for ArangoCursor {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        while self.batch.is_empty() && self.has_more {
            self.fetch_next_batch().await?;
        }

        Ok(self.batch.pop_front())
    }

    fn count(&self) -> Option<usize> {
        self.count
    }

    /// Deletes the server-side cursor when batches remain unfetched.
    async fn close(&mut self) -> StoreResult<()> {
        let id = self.id.take();
        let pending = std::mem::take(&mut self.has_more);

        let Some(id) = id.filter(|_| pending) else {
            return Ok(());
        };

        debug!(cursor = %id, "deleting cursor");
        let url = self.db.endpoint(&["_api", "cursor", id.as_str()])?;
        send(self.db.request(Method::DELETE, url)).await?;

        Ok(())
    }
}

#[async_trait]
impl Database for ArangoDatabase {
    fn name(&self) -> &str {
        &self.options.database_name
    }

    #[instrument(level = "debug", skip(self, users), fields(database = %self.options.database_name))]
    async fn create_database(&self, name: &str, users: Vec<Value>) -> StoreResult<Value> {
        let mut body = json!({ "name": name });
        if !users.is_empty() {
            body["users"] = Value::Array(users);
        }

        let response = self
            .call(Method::POST, &["_api", "database"], &body)
            .await?;
        Ok(strip_envelope(response))
    }

    #[instrument(level = "debug", skip(self), fields(database = %self.options.database_name))]
    async fn create_collection(&self, name: &str, kind: CollectionKind) -> StoreResult<Value> {
        let kind = match kind {
            CollectionKind::Document => 2,
            CollectionKind::Edge => 3,
        };

        let response = self
            .call(
                Method::POST,
                &["_api", "collection"],
                &json!({ "name": name, "type": kind }),
            )
            .await?;
        Ok(strip_envelope(response))
    }

    async fn query(&self, query: &str, bind_vars: Map<String, Value>) -> StoreResult<BoxCursor> {
        let aql = AqlQuery {
            query: query.to_string(),
            bind_vars,
        };

        Ok(Box::new(self.cursor(&aql).await?))
    }

    #[instrument(level = "debug", skip_all, fields(database = %self.options.database_name))]
    async fn transaction(&self, transaction: Transaction) -> StoreResult<Value> {
        let body = serde_json::to_value(&transaction)?;
        let mut response = self
            .call(Method::POST, &["_api", "transaction"], &body)
            .await?;

        Ok(response
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn save(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let mut url = self.endpoint(&["_api", "document", collection])?;
        url.query_pairs_mut().append_pair("returnNew", "true");

        let mut response = send(self.request(Method::POST, url).json(&document)).await?;

        response
            .get_mut("new")
            .map(Value::take)
            .ok_or_else(|| ArangoError::Body("missing new document".to_string()).into())
    }

    async fn by_example(
        &self,
        collection: &str,
        example: &Example,
        options: &QueryOptions,
    ) -> StoreResult<BoxCursor> {
        let aql = AqlQuery::for_example(collection, example, options, Action::Return)?;

        Ok(Box::new(self.cursor(&aql).await?))
    }

    async fn update_by_example(
        &self,
        collection: &str,
        example: &Example,
        patch: Value,
    ) -> StoreResult<UpdateSummary> {
        let aql = AqlQuery::for_example(
            collection,
            example,
            &QueryOptions::default(),
            Action::Update(patch),
        )?;

        Ok(UpdateSummary {
            updated: self.scalar(aql).await?,
        })
    }

    async fn replace_by_example(
        &self,
        collection: &str,
        example: &Example,
        document: Value,
    ) -> StoreResult<ReplaceSummary> {
        let aql = AqlQuery::for_example(
            collection,
            example,
            &QueryOptions::default(),
            Action::Replace(document),
        )?;

        Ok(ReplaceSummary {
            replaced: self.scalar(aql).await?,
        })
    }

    async fn remove_by_example(
        &self,
        collection: &str,
        example: &Example,
    ) -> StoreResult<RemoveSummary> {
        let aql =
            AqlQuery::for_example(collection, example, &QueryOptions::default(), Action::Remove)?;

        Ok(RemoveSummary {
            deleted: self.scalar(aql).await?,
        })
    }

    async fn count_by_example(&self, collection: &str, example: &Example) -> StoreResult<u64> {
        let aql =
            AqlQuery::for_example(collection, example, &QueryOptions::default(), Action::Count)?;

        self.scalar(aql).await
    }
}

//! Request model shared by every endpoint.
//!
//! Requests arrive as JSON objects. The router reads their [`Pattern`] (topic, cmd and the
//! optional `type` discriminator) to pick a handler, validates the raw object, and hands the
//! handler a typed [`Request`].

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::fmt;

use crate::{
    driver::{Transaction, TransactionCollections},
    error::ValidationError,
    example::{Example, QueryOptions},
    validate::Schema,
};

/// Identifies an endpoint: `(topic, cmd, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pattern {
    pub topic: String,
    pub cmd: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Pattern {
    pub fn new(topic: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            cmd: cmd.into(),
            kind: None,
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// The same pattern without its `type` discriminator.
    pub fn untyped(&self) -> Self {
        Self {
            topic: self.topic.clone(),
            cmd: self.cmd.clone(),
            kind: None,
        }
    }

    /// Reads the pattern fields of a raw request.
    ///
    /// A non-string `type` is not a discriminator and is left to the handler.
    pub fn of(request: &Map<String, Value>) -> Result<Self, ValidationError> {
        let text = |field: &str| match request.get(field) {
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(ValidationError::new(field, "must be a string")),
            None => Err(ValidationError::required(field)),
        };

        Ok(Self {
            topic: text("topic")?,
            cmd: text("cmd")?,
            kind: request
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "topic:{},cmd:{}", self.topic, self.cmd)?;

        if let Some(kind) = &self.kind {
            write!(f, ",type:{}", kind)?;
        }

        Ok(())
    }
}

/// A raw query and its bind variables.
///
/// The `query` field accepts either plain query text or an object `{ query, bindVars }`, the
/// shape produced by query template helpers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuery {
    pub query: String,
    #[serde(default)]
    pub bind_vars: Map<String, Value>,
}

impl RawQuery {
    /// Builds the query from a request's `query` and `variables` fields.
    ///
    /// Entries of `variables` take precedence over bind variables carried by the query object.
    pub fn from_parts(
        query: Value,
        variables: Option<Map<String, Value>>,
    ) -> Result<Self, ValidationError> {
        let mut raw = match query {
            Value::String(query) => RawQuery {
                query,
                bind_vars: Map::new(),
            },
            Value::Object(_) => serde_json::from_value(query).map_err(|e| {
                ValidationError::new("query", format!("must be query text or {{ query, bindVars }}: {e}"))
            })?,
            _ => return Err(ValidationError::new("query", "must be a string or an object")),
        };

        raw.bind_vars.extend(variables.unwrap_or_default());

        Ok(raw)
    }
}

/// A validated request.
///
/// Fields are optional at the type level; each handler requires the fields its endpoint
/// declares and reports absent ones as validation errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub topic: String,
    pub cmd: String,
    pub kind: Option<Value>,
    pub database_name: Option<String>,
    pub collection: Option<String>,
    pub query: Option<Value>,
    pub data: Option<Value>,
    pub id: Option<String>,
    pub variables: Option<Map<String, Value>>,
    pub options: Option<Value>,
    pub name: Option<String>,
    pub users: Option<Vec<Value>>,
    pub collections: Option<TransactionCollections>,
    pub action: Option<String>,
    pub params: Option<Value>,
    pub lock_timeout: Option<u64>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::required(field))
}

/// Takes one field out of a raw request. `null` counts as absent.
fn field<T: DeserializeOwned>(
    request: &mut Map<String, Value>,
    name: &str,
) -> Result<Option<T>, ValidationError> {
    match request.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ValidationError::new(name, e.to_string())),
    }
}

impl Request {
    /// Reads the fields an endpoint declares out of a raw request object.
    ///
    /// The pattern fields are always read; every other field the schema does not declare is
    /// dropped unread.
    pub fn from_map(
        mut request: Map<String, Value>,
        schema: &Schema,
    ) -> Result<Self, ValidationError> {
        request.retain(|name, _| {
            matches!(name.as_str(), "topic" | "cmd" | "type") || schema.declares(name)
        });

        Ok(Self {
            topic: required(field(&mut request, "topic")?, "topic")?,
            cmd: required(field(&mut request, "cmd")?, "cmd")?,
            kind: field(&mut request, "type")?,
            database_name: field(&mut request, "databaseName")?,
            collection: field(&mut request, "collection")?,
            query: field(&mut request, "query")?,
            data: field(&mut request, "data")?,
            id: field(&mut request, "id")?,
            variables: field(&mut request, "variables")?,
            options: field(&mut request, "options")?,
            name: field(&mut request, "name")?,
            users: field(&mut request, "users")?,
            collections: field(&mut request, "collections")?,
            action: field(&mut request, "action")?,
            params: field(&mut request, "params")?,
            lock_timeout: field(&mut request, "lockTimeout")?,
        })
    }

    pub fn collection(&self) -> Result<&str, ValidationError> {
        required(self.collection.as_deref(), "collection")
    }

    pub fn id(&self) -> Result<&str, ValidationError> {
        required(self.id.as_deref(), "id")
    }

    pub fn name(&self) -> Result<&str, ValidationError> {
        required(self.name.as_deref(), "name")
    }

    pub fn take_data(&mut self) -> Result<Value, ValidationError> {
        required(self.data.take(), "data")
    }

    /// The `query` field as an example filter.
    pub fn example(&self) -> Result<Example, ValidationError> {
        Example::try_from(required(self.query.clone(), "query")?)
    }

    /// The `options` field, defaulting to no options.
    pub fn query_options(&self) -> Result<QueryOptions, ValidationError> {
        match &self.options {
            None | Some(Value::Null) => Ok(QueryOptions::default()),
            Some(options) => serde_json::from_value(options.clone())
                .map_err(|e| ValidationError::new("options", e.to_string())),
        }
    }

    /// The `query` and `variables` fields as a raw query.
    pub fn take_raw_query(&mut self) -> Result<RawQuery, ValidationError> {
        RawQuery::from_parts(required(self.query.take(), "query")?, self.variables.take())
    }

    /// The transaction fields.
    pub fn take_transaction(&mut self) -> Result<Transaction, ValidationError> {
        Ok(Transaction {
            collections: required(self.collections.take(), "collections")?,
            action: required(self.action.take(), "action")?,
            params: self.params.take(),
            lock_timeout: self.lock_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Shape;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn pattern_reads_string_type_only() {
        let typed = Pattern::of(&object(json!({
            "topic": "arango-store", "cmd": "executeAqlQuery", "type": "one"
        })))
        .unwrap();
        assert_eq!(typed, Pattern::new("arango-store", "executeAqlQuery").with_type("one"));
        assert_eq!(typed.to_string(), "topic:arango-store,cmd:executeAqlQuery,type:one");

        let untyped = Pattern::of(&object(json!({
            "topic": "arango-store", "cmd": "createCollection", "type": 3
        })))
        .unwrap();
        assert_eq!(untyped.kind, None);
    }

    #[test]
    fn pattern_requires_cmd() {
        let err = Pattern::of(&object(json!({ "topic": "arango-store" }))).unwrap_err();
        assert_eq!(err, ValidationError::required("cmd"));
    }

    fn update_schema() -> Schema {
        Schema::new()
            .required("collection", Shape::NonEmptyString)
            .required("query", Shape::Object)
            .required("data", Shape::Object)
            .optional("databaseName", Shape::NonEmptyString)
            .optional("lockTimeout", Shape::Integer)
    }

    #[test]
    fn request_reads_camel_case_fields() {
        let mut request = Request::from_map(object(json!({
            "topic": "arango-store",
            "cmd": "update",
            "databaseName": "test",
            "collection": "testColl",
            "query": { "name": "peter" },
            "data": { "name": "klaus" },
            "lockTimeout": 5
        })), &update_schema())
        .unwrap();

        assert_eq!(request.database_name.as_deref(), Some("test"));
        assert_eq!(request.collection().unwrap(), "testColl");
        assert_eq!(request.example().unwrap(), Example::new().with("name", "peter"));
        assert_eq!(request.take_data().unwrap(), json!({ "name": "klaus" }));
        assert_eq!(request.take_data().unwrap_err(), ValidationError::required("data"));
        assert_eq!(request.lock_timeout, Some(5));
    }

    #[test]
    fn raw_query_merges_template_bind_vars_with_variables() {
        let raw = RawQuery::from_parts(
            json!({ "query": "FOR u IN @@coll FILTER u.age > @age RETURN u", "bindVars": { "@coll": "users", "age": 1 } }),
            Some(object(json!({ "age": 30 }))),
        )
        .unwrap();

        assert_eq!(raw.bind_vars.get("@coll"), Some(&json!("users")));
        assert_eq!(raw.bind_vars.get("age"), Some(&json!(30)));
    }

    #[test]
    fn raw_query_rejects_numbers() {
        let err = RawQuery::from_parts(json!(42), None).unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn transaction_requires_action() {
        let mut request = Request::from_map(object(json!({
            "topic": "arango-store",
            "cmd": "executeTransaction",
            "collections": { "read": "users" }
        })), &Schema::new().required("collections", Shape::Collections).required("action", Shape::NonEmptyString))
        .unwrap();

        assert_eq!(request.take_transaction().unwrap_err(), ValidationError::required("action"));
    }

    #[test]
    fn undeclared_fields_are_not_read() {
        let request = Request::from_map(
            object(json!({
                "topic": "arango-store",
                "cmd": "find",
                "collection": "users",
                "query": {},
                "id": 42,
                "users": "root"
            })),
            &Schema::new()
                .required("collection", Shape::NonEmptyString)
                .required("query", Shape::Object),
        )
        .unwrap();

        assert_eq!(request.collection.as_deref(), Some("users"));
        assert_eq!(request.id, None);
        assert_eq!(request.users, None);
    }

    #[test]
    fn ill_typed_field_is_named_in_the_error() {
        let err = Request::from_map(
            object(json!({ "topic": "arango-store", "cmd": "removeById", "id": 42 })),
            &Schema::new().required("id", Shape::Any),
        )
        .unwrap_err();

        assert_eq!(err.field, "id");
    }
}

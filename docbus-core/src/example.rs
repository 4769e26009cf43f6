//! Example-based document filters.
//!
//! An [`Example`] is a partial document: a document matches when every field of the example is
//! present in it with an equal value. Keys are combined with logical AND, and an empty example
//! matches every document. Nested fields may be addressed with dotted keys (`"address.city"`).
//!
//! Drivers translate examples into their native form through the [`ExampleVisitor`] trait,
//! the same way for every verb that takes a filter.
//!
//! ```ignore
//! use docbus_core::example::Example;
//! use serde_json::json;
//!
//! let example = Example::try_from(json!({ "name": "peter", "age": 42 }))?;
//! assert_eq!(example.len(), 2);
//!
//! let by_id = Example::by_id("users/123");
//! assert_eq!(by_id.get("_id"), Some(&json!("users/123")));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Name of the document identifier field.
pub const ID_FIELD: &str = "_id";

/// Equality filter over document fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Example(Map<String, Value>);

impl Example {
    /// Creates an empty example, which matches every document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates the example `{ "_id": id }`.
    ///
    /// Every by-identifier verb is the corresponding example verb with this filter.
    pub fn by_id(id: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Self(fields)
    }

    /// Adds a field to the example, replacing any previous value for the same key.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterates over `(field, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Example {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for Example {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            Value::Null => Ok(Self::new()),
            _ => Err(ValidationError::new("query", "must be an object")),
        }
    }
}

/// Pass-through options for the reading verbs.
///
/// Unknown keys are ignored so callers may send options meant for other stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Maximum number of documents to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    #[serde(default, alias = "skip")]
    pub offset: Option<usize>,
}

impl QueryOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Visitor for translating or evaluating an [`Example`].
///
/// Implementors produce one output per field and then combine them; an empty example is
/// visited through [`ExampleVisitor::visit_empty`].
pub trait ExampleVisitor {
    /// Output type produced by the visitor.
    type Output;
    /// Error type produced by the visitor.
    type Error;

    /// Visits an example without fields.
    fn visit_empty(&mut self) -> Result<Self::Output, Self::Error>;

    /// Visits a single `field == value` constraint.
    fn visit_field(&mut self, field: &str, value: &Value) -> Result<Self::Output, Self::Error>;

    /// Combines the outputs of every field constraint (logical AND).
    fn visit_all(&mut self, outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;

    /// Dispatches to the appropriate visit method.
    fn visit_example(&mut self, example: &Example) -> Result<Self::Output, Self::Error> {
        if example.is_empty() {
            return self.visit_empty();
        }

        let outputs = example
            .iter()
            .map(|(field, value)| self.visit_field(field, value))
            .collect::<Result<Vec<_>, _>>()?;

        self.visit_all(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FieldNames;

    impl ExampleVisitor for FieldNames {
        type Output = String;
        type Error = ();

        fn visit_empty(&mut self) -> Result<String, ()> {
            Ok("*".into())
        }

        fn visit_field(&mut self, field: &str, _value: &Value) -> Result<String, ()> {
            Ok(field.to_string())
        }

        fn visit_all(&mut self, outputs: Vec<String>) -> Result<String, ()> {
            Ok(outputs.join("&"))
        }
    }

    #[test]
    fn by_id_uses_identifier_field() {
        let example = Example::by_id("testColl/1");

        assert_eq!(example.len(), 1);
        assert_eq!(example.get(ID_FIELD), Some(&json!("testColl/1")));
    }

    #[test]
    fn null_query_is_an_empty_example() {
        let example = Example::try_from(Value::Null).unwrap();
        assert!(example.is_empty());
    }

    #[test]
    fn non_object_query_is_rejected() {
        let err = Example::try_from(json!(["name"])).unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn visitor_combines_every_field() {
        let example = Example::new().with("age", 2).with("name", 1);

        assert_eq!(FieldNames.visit_example(&example), Ok("age&name".to_string()));
        assert_eq!(FieldNames.visit_example(&Example::new()), Ok("*".to_string()));
    }

    #[test]
    fn options_accept_skip_alias_and_ignore_unknown_keys() {
        let options: QueryOptions =
            serde_json::from_value(json!({ "skip": 2, "limit": 5, "sort": "name" })).unwrap();

        assert_eq!(options, QueryOptions::default().limit(5).offset(2));
    }
}

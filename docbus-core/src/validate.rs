//! Request shape validation.
//!
//! Every endpoint declares a [`Schema`] of required and optional fields. The router runs the
//! configured [`Validator`] against the raw request before anything else happens, so malformed
//! requests never reach the resolver or a driver.

use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::error::ValidationError;

/// Expected JSON shape of a request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Any string.
    String,
    /// A string with at least one character.
    NonEmptyString,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// A non-negative integer.
    Integer,
    /// Either a string or an object.
    StringOrObject,
    /// Transaction declaration: an object whose `read`, `write` and `exclusive` entries are each
    /// a collection name or a list of names.
    Collections,
    /// Any value.
    Any,
}

impl Shape {
    /// Returns the violated rule, if any.
    fn violation(&self, value: &Value) -> Option<&'static str> {
        let (valid, reason) = match self {
            Shape::String => (value.is_string(), "must be a string"),
            Shape::NonEmptyString => (
                value.as_str().is_some_and(|s| !s.is_empty()),
                "must be a non-empty string",
            ),
            Shape::Object => (value.is_object(), "must be an object"),
            Shape::Array => (value.is_array(), "must be an array"),
            Shape::Integer => (value.is_u64(), "must be a non-negative integer"),
            Shape::StringOrObject => (
                value.is_string() || value.is_object(),
                "must be a string or an object",
            ),
            Shape::Collections => (
                value.as_object().is_some_and(|declared| {
                    ["read", "write", "exclusive"]
                        .iter()
                        .filter_map(|mode| declared.get(*mode))
                        .all(is_collection_names)
                }),
                "must map read, write and exclusive to a collection name or a list of names",
            ),
            Shape::Any => (true, ""),
        };

        (!valid).then_some(reason)
    }
}

fn is_collection_names(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Array(names) => names.iter().all(Value::is_string),
        _ => false,
    }
}

/// Rule for a single request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

/// Declared fields of one endpoint. Undeclared fields are allowed and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, shape: Shape) -> Self {
        self.fields.push(FieldRule {
            name,
            shape,
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, shape: Shape) -> Self {
        self.fields.push(FieldRule {
            name,
            shape,
            required: false,
        });
        self
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Returns true when the endpoint declares the field.
    pub fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|rule| rule.name == name)
    }

    /// Checks the request against every rule, reporting the first offending field.
    ///
    /// A `null` value counts as absent.
    pub fn check(&self, request: &Map<String, Value>) -> Result<(), ValidationError> {
        for rule in &self.fields {
            match request.get(rule.name) {
                None | Some(Value::Null) if rule.required => {
                    return Err(ValidationError::required(rule.name));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if let Some(reason) = rule.shape.violation(value) {
                        return Err(ValidationError::new(rule.name, reason));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pluggable request validator.
pub trait Validator: Send + Sync + Debug {
    fn validate(&self, schema: &Schema, request: &Map<String, Value>)
        -> Result<(), ValidationError>;
}

/// Validator applying the endpoint [`Schema`] as declared.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(
        &self,
        schema: &Schema,
        request: &Map<String, Value>,
    ) -> Result<(), ValidationError> {
        schema.check(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn create_schema() -> Schema {
        Schema::new()
            .required("collection", Shape::NonEmptyString)
            .required("data", Shape::Object)
            .optional("databaseName", Shape::NonEmptyString)
    }

    #[test]
    fn accepts_valid_request() {
        let result = SchemaValidator.validate(
            &create_schema(),
            &request(json!({ "collection": "users", "data": { "name": "peter" }, "extra": 1 })),
        );

        assert!(result.is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = SchemaValidator
            .validate(&create_schema(), &request(json!({ "data": {} })))
            .unwrap_err();

        assert_eq!(err, ValidationError::required("collection"));
    }

    #[test]
    fn null_required_field_counts_as_missing() {
        let err = create_schema()
            .check(&request(json!({ "collection": "users", "data": null })))
            .unwrap_err();

        assert_eq!(err, ValidationError::required("data"));
    }

    #[test]
    fn rejects_empty_collection_name() {
        let err = create_schema()
            .check(&request(json!({ "collection": "", "data": {} })))
            .unwrap_err();

        assert_eq!(err.field, "collection");
        assert_eq!(err.reason, "must be a non-empty string");
    }

    #[test]
    fn rejects_wrong_optional_shape() {
        let schema = Schema::new()
            .required("name", Shape::NonEmptyString)
            .optional("users", Shape::Array);

        let err = schema
            .check(&request(json!({ "name": "testdb", "users": "root" })))
            .unwrap_err();

        assert_eq!(err, ValidationError::new("users", "must be an array"));
    }

    #[test]
    fn integer_shape_rejects_negative_numbers() {
        let schema = Schema::new().optional("lockTimeout", Shape::Integer);

        assert!(schema.check(&request(json!({ "lockTimeout": 10 }))).is_ok());
        assert!(schema.check(&request(json!({ "lockTimeout": -1 }))).is_err());
    }

    #[test]
    fn rejects_empty_database_name() {
        let err = create_schema()
            .check(&request(json!({ "collection": "users", "data": {}, "databaseName": "" })))
            .unwrap_err();

        assert_eq!(err, ValidationError::new("databaseName", "must be a non-empty string"));
    }

    #[test]
    fn collections_shape_checks_each_mode() {
        let schema = Schema::new().required("collections", Shape::Collections);

        assert!(schema
            .check(&request(json!({ "collections": { "read": "users", "write": ["users", "logs"] } })))
            .is_ok());

        let err = schema
            .check(&request(json!({ "collections": { "read": 5 } })))
            .unwrap_err();
        assert_eq!(err.field, "collections");

        let err = schema
            .check(&request(json!({ "collections": { "write": ["users", 1] } })))
            .unwrap_err();
        assert_eq!(err.field, "collections");
    }

    #[test]
    fn declares_lists_only_schema_fields() {
        let schema = create_schema();

        assert!(schema.declares("databaseName"));
        assert!(!schema.declares("id"));
    }
}

//! Example evaluation for in-memory document filtering.
//!
//! An [`Example`] is compiled once into an [`ExampleFilter`] and then tested against every
//! stored BSON document of the collection.

use bson::{Bson, Document, datetime::DateTime};
use serde_json::Value;
use std::collections::HashMap;

use docbus_core::{
    error::{StoreError, StoreResult},
    example::{Example, ExampleVisitor},
};

use crate::server::to_bson;

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64, so `1` (Int64) equals `1.0` (Double).
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Looks up a dotted path (`"address.city"`) in a document.
fn lookup<'a>(document: &'a Document, path: &[String]) -> Option<&'a Bson> {
    let (first, rest) = path.split_first()?;
    let mut current = document.get(first)?;

    for segment in rest {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// A compiled example: every path must be present with an equal value.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ExampleFilter {
    constraints: Vec<(Vec<String>, Bson)>,
}

impl ExampleFilter {
    pub fn compile(example: &Example) -> StoreResult<Self> {
        FilterCompiler.visit_example(example)
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.constraints.iter().all(|(path, expected)| {
            // A missing attribute compares as null.
            match lookup(document, path) {
                Some(actual) => Comparable::from(actual) == Comparable::from(expected),
                None => matches!(expected, Bson::Null),
            }
        })
    }
}

struct FilterCompiler;

impl ExampleVisitor for FilterCompiler {
    type Output = ExampleFilter;
    type Error = StoreError;

    fn visit_empty(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(ExampleFilter::default())
    }

    fn visit_field(&mut self, field: &str, value: &Value) -> Result<Self::Output, Self::Error> {
        let path = field.split('.').map(str::to_string).collect();

        Ok(ExampleFilter {
            constraints: vec![(path, to_bson(value.clone())?)],
        })
    }

    fn visit_all(&mut self, outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(ExampleFilter {
            constraints: outputs
                .into_iter()
                .flat_map(|filter| filter.constraints)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    fn filter(example: Value) -> ExampleFilter {
        ExampleFilter::compile(&Example::try_from(example).unwrap()).unwrap()
    }

    #[test]
    fn empty_example_matches_everything() {
        assert!(filter(json!({})).matches(&doc! { "name": "peter" }));
        assert!(filter(json!({})).matches(&doc! {}));
    }

    #[test]
    fn all_fields_must_match() {
        let document = doc! { "name": "peter", "age": 42_i64 };

        assert!(filter(json!({ "name": "peter", "age": 42 })).matches(&document));
        assert!(!filter(json!({ "name": "peter", "age": 41 })).matches(&document));
        assert!(!filter(json!({ "name": "olaf" })).matches(&document));
    }

    #[test]
    fn numbers_compare_across_representations() {
        let document = doc! { "score": 3_i32, "ratio": 2.0 };

        assert!(filter(json!({ "score": 3.0, "ratio": 2 })).matches(&document));
    }

    #[test]
    fn dotted_keys_address_nested_fields() {
        let document = doc! { "address": { "city": "Berlin", "zip": "10115" } };

        assert!(filter(json!({ "address.city": "Berlin" })).matches(&document));
        assert!(!filter(json!({ "address.city": "Hamburg" })).matches(&document));
        assert!(!filter(json!({ "address.street.name": "x" })).matches(&document));
    }

    #[test]
    fn nested_objects_must_match_exactly() {
        let document = doc! { "address": { "city": "Berlin", "zip": "10115" } };

        assert!(filter(json!({ "address": { "zip": "10115", "city": "Berlin" } })).matches(&document));
        assert!(!filter(json!({ "address": { "city": "Berlin" } })).matches(&document));
    }

    #[test]
    fn null_matches_missing_attribute() {
        let document = doc! { "name": "peter" };

        assert!(filter(json!({ "deletedAt": null })).matches(&document));
        assert!(!filter(json!({ "name": null })).matches(&document));
    }
}

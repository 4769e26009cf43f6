//! Translation of example verbs into parameterised AQL.
//!
//! Collection names, attribute names and values are always passed as bind parameters, never
//! spliced into the query text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use docbus_core::{
    example::{Example, ExampleVisitor, QueryOptions},
    error::StoreError,
};

/// Largest integer AQL represents exactly; used as the count of an offset-only `LIMIT`.
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// An AQL query with its bind parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AqlQuery {
    pub query: String,
    pub bind_vars: Map<String, Value>,
}

/// Translates an [`Example`] into an AQL `FILTER` line, collecting its bind parameters.
#[derive(Debug, Default)]
pub(crate) struct FilterTranslator {
    bind_vars: Map<String, Value>,
    fields: usize,
}

impl FilterTranslator {
    fn bind(&mut self, name: String, value: Value) -> String {
        self.bind_vars.insert(name.clone(), value);
        format!("@{name}")
    }
}

impl ExampleVisitor for FilterTranslator {
    type Output = String;
    type Error = StoreError;

    fn visit_empty(&mut self) -> Result<Self::Output, Self::Error> {
        Ok(String::new())
    }

    fn visit_field(&mut self, field: &str, value: &Value) -> Result<Self::Output, Self::Error> {
        let n = self.fields;
        self.fields += 1;

        let mut attribute = String::from("doc");
        for (i, segment) in field.split('.').enumerate() {
            attribute.push('.');
            attribute.push_str(&self.bind(format!("f{n}_{i}"), Value::from(segment)));
        }

        let value = self.bind(format!("v{n}"), value.clone());
        Ok(format!("{attribute} == {value}"))
    }

    fn visit_all(&mut self, outputs: Vec<Self::Output>) -> Result<Self::Output, Self::Error> {
        Ok(format!("FILTER {}", outputs.join(" && ")))
    }
}

/// What an example query does with each matching document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Return,
    Update(Value),
    Replace(Value),
    Remove,
    Count,
}

impl AqlQuery {
    /// Builds `FOR doc IN @@collection FILTER ...` followed by the given action.
    pub(crate) fn for_example(
        collection: &str,
        example: &Example,
        options: &QueryOptions,
        action: Action,
    ) -> Result<Self, StoreError> {
        let mut translator = FilterTranslator::default();
        let filter = translator.visit_example(example)?;
        let mut bind_vars = translator.bind_vars;
        bind_vars.insert("@collection".into(), Value::from(collection));

        let mut lines = vec!["FOR doc IN @@collection".to_string()];
        if !filter.is_empty() {
            lines.push(filter);
        }

        if options.limit.is_some() || options.offset.is_some() {
            bind_vars.insert("offset".into(), Value::from(options.offset.unwrap_or(0) as u64));
            bind_vars.insert(
                "limit".into(),
                Value::from(options.limit.map_or(MAX_SAFE_INTEGER, |limit| limit as u64)),
            );
            lines.push("LIMIT @offset, @limit".to_string());
        }

        let modification = match action {
            Action::Return => {
                lines.push("RETURN doc".to_string());
                false
            }
            Action::Count => {
                lines.push("COLLECT WITH COUNT INTO length".to_string());
                lines.push("RETURN length".to_string());
                false
            }
            Action::Update(patch) => {
                bind_vars.insert("patch".into(), patch);
                lines.push("UPDATE doc WITH @patch IN @@collection".to_string());
                true
            }
            Action::Replace(document) => {
                bind_vars.insert("document".into(), document);
                lines.push("REPLACE doc WITH @document IN @@collection".to_string());
                true
            }
            Action::Remove => {
                lines.push("REMOVE doc IN @@collection".to_string());
                true
            }
        };

        // Modifications return the number of touched documents.
        let query = if modification {
            format!("RETURN LENGTH(\n{}\nRETURN 1\n)", lines.join("\n"))
        } else {
            lines.join("\n")
        };

        Ok(Self { query, bind_vars })
    }
}

//! Result cursors for queries.
//!
//! Drivers return query results as a [`Cursor`]. Callers either take the first record
//! ([`Cursor::next`]) or drain everything ([`Cursor::all`]); the records arrive in the
//! order the query produced them.

use async_trait::async_trait;
use serde_json::Value;
use std::{collections::VecDeque, fmt::Debug};

use crate::error::StoreResult;

/// An ordered, possibly lazily fetched, sequence of query results.
#[async_trait]
pub trait Cursor: Send + Debug {
    /// Returns the next record, or `None` once the cursor is exhausted.
    async fn next(&mut self) -> StoreResult<Option<Value>>;

    /// Total number of records produced by the query, when the driver knows it.
    fn count(&self) -> Option<usize> {
        None
    }

    /// Drains every remaining record.
    async fn all(&mut self) -> StoreResult<Vec<Value>> {
        let mut records = Vec::new();

        while let Some(record) = self.next().await? {
            records.push(record);
        }

        Ok(records)
    }

    /// Releases server-side resources held for records that will not be read.
    async fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Boxed cursor as returned by drivers.
pub type BoxCursor = Box<dyn Cursor>;

/// Cursor over records that are already fully materialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VecCursor {
    items: VecDeque<Value>,
    count: usize,
}

impl VecCursor {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            count: items.len(),
            items: items.into(),
        }
    }

    /// Number of records not yet consumed.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    pub fn boxed(self) -> BoxCursor {
        Box::new(self)
    }
}

impl From<Vec<Value>> for VecCursor {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}

#[async_trait]
impl Cursor for VecCursor {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        Ok(self.items.pop_front())
    }

    fn count(&self) -> Option<usize> {
        Some(self.count)
    }

    async fn all(&mut self) -> StoreResult<Vec<Value>> {
        Ok(self.items.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn next_then_all_preserves_order() {
        let mut cursor = VecCursor::new(vec![json!(1), json!(2), json!(3)]);

        assert_eq!(cursor.next().await.unwrap(), Some(json!(1)));
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.all().await.unwrap(), vec![json!(2), json!(3)]);
        assert_eq!(cursor.next().await.unwrap(), None);
        assert_eq!(cursor.count(), Some(3));
    }

    #[tokio::test]
    async fn empty_cursor_yields_nothing() {
        let mut cursor = VecCursor::default().boxed();

        assert_eq!(cursor.next().await.unwrap(), None);
        assert!(cursor.all().await.unwrap().is_empty());
    }
}

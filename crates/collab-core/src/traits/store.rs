//! Backing store interface: point reads and writes per entity table.
//!
//! The engine treats records as opaque JSON objects matching the shapes
//! in `collab-entity`; the store decides how they are persisted.

use async_trait::async_trait;
use serde_json::Value;

use crate::result::AppResult;

/// Conjunction of equality conditions on record columns.
///
/// This mirrors the filter grammar of the change-notification stream, so
/// the same filter value can drive both a select and a feed subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Column name → required JSON value, all of which must match.
    conditions: Vec<(String, Value)>,
}

impl RecordFilter {
    /// Create an empty filter matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Returns whether the record satisfies every condition.
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| record.get(column) == Some(expected))
    }

    /// Renders the filter as a stable string, usable in coalescer keys.
    pub fn as_key(&self) -> String {
        self.conditions
            .iter()
            .map(|(c, v)| format!("{c}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Point read/write access to the backing store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Select all records of a table matching the filter.
    async fn select(&self, table: &str, filter: &RecordFilter) -> AppResult<Vec<Value>>;

    /// Fetch a single record by id.
    async fn get(&self, table: &str, id: &str) -> AppResult<Option<Value>>;

    /// Insert a record. Returns the stored record (with server-assigned
    /// fields filled in).
    async fn insert(&self, table: &str, record: Value) -> AppResult<Value>;

    /// Merge a partial patch into the record with the given id. Returns
    /// the updated record.
    async fn update(&self, table: &str, id: &str, patch: Value) -> AppResult<Value>;

    /// Delete a record by id.
    async fn delete(&self, table: &str, id: &str) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_all_conditions() {
        let filter = RecordFilter::new().eq("event_id", "e1").eq("status", "open");
        assert!(filter.matches(&json!({"event_id": "e1", "status": "open", "x": 1})));
        assert!(!filter.matches(&json!({"event_id": "e1", "status": "closed"})));
        assert!(!filter.matches(&json!({"status": "open"})));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(RecordFilter::new().matches(&json!({"anything": true})));
    }

    #[test]
    fn test_key_is_stable() {
        let filter = RecordFilter::new().eq("channel", "general");
        assert_eq!(filter.as_key(), "channel=\"general\"");
    }
}

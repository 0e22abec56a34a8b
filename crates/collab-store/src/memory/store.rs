//! In-memory record store with change propagation into the hub.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use collab_core::error::AppError;
use collab_core::result::AppResult;
use collab_core::traits::store::{RecordFilter, RecordStore};
use collab_core::traits::transport::ChangeOperation;

use super::hub::MemoryHub;

/// In-memory table store.
///
/// Every successful mutation is propagated to the hub as a change
/// notification, the way a hosted backend emits its row-level feed.
pub struct MemoryStore {
    /// Table name → record id → record.
    tables: DashMap<String, HashMap<String, Value>>,
    hub: Arc<MemoryHub>,
    /// Fault injection: reject all writes while set.
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create a store publishing changes into the given hub.
    pub fn new(hub: Arc<MemoryHub>) -> Arc<Self> {
        Arc::new(Self {
            tables: DashMap::new(),
            hub,
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Reject subsequent writes with a store error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::store("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, table: &str, filter: &RecordFilter) -> AppResult<Vec<Value>> {
        Ok(self
            .tables
            .get(table)
            .map(|records| {
                records
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, table: &str, id: &str) -> AppResult<Option<Value>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|records| records.get(id).cloned()))
    }

    async fn insert(&self, table: &str, mut record: Value) -> AppResult<Value> {
        self.check_writable()?;

        let obj = record
            .as_object_mut()
            .ok_or_else(|| AppError::validation("record must be a JSON object"))?;
        let id = match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                obj.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id.clone(), record.clone());

        debug!(table, id = %id, "Record inserted");
        self.hub
            .publish_change(table, ChangeOperation::Insert, record.clone())
            .await;
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> AppResult<Value> {
        self.check_writable()?;

        let patch_obj = patch
            .as_object()
            .ok_or_else(|| AppError::validation("patch must be a JSON object"))?;

        let updated = {
            let mut records = self
                .tables
                .get_mut(table)
                .ok_or_else(|| AppError::not_found(format!("table {table} is empty")))?;
            let record = records
                .get_mut(id)
                .ok_or_else(|| AppError::not_found(format!("{table}/{id}")))?;
            let obj = record
                .as_object_mut()
                .ok_or_else(|| AppError::validation("stored record is not an object"))?;
            for (key, value) in patch_obj {
                obj.insert(key.clone(), value.clone());
            }
            record.clone()
        };

        debug!(table, id, "Record updated");
        self.hub
            .publish_change(table, ChangeOperation::Update, updated.clone())
            .await;
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> AppResult<()> {
        self.check_writable()?;

        let removed = self
            .tables
            .get_mut(table)
            .and_then(|mut records| records.remove(id))
            .ok_or_else(|| AppError::not_found(format!("{table}/{id}")))?;

        debug!(table, id, "Record deleted");
        self.hub
            .publish_change(table, ChangeOperation::Delete, removed)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_store() -> Arc<MemoryStore> {
        MemoryStore::new(MemoryHub::new())
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_select_filters() {
        let store = make_store();
        let stored = store
            .insert("ideas", json!({"title": "solar", "challenge": "c1"}))
            .await
            .unwrap();
        assert!(stored["id"].as_str().is_some());

        store
            .insert("ideas", json!({"title": "wind", "challenge": "c2"}))
            .await
            .unwrap();

        let rows = store
            .select("ideas", &RecordFilter::new().eq("challenge", "c1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "solar");
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let store = make_store();
        let stored = store
            .insert("ideas", json!({"title": "solar", "votes": 0}))
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap();

        let updated = store.update("ideas", id, json!({"votes": 3})).await.unwrap();
        assert_eq!(updated["votes"], 3);
        assert_eq!(updated["title"], "solar");
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = make_store();
        store.set_fail_writes(true);
        let err = store.insert("ideas", json!({})).await.unwrap_err();
        assert_eq!(err.kind, collab_core::error::ErrorKind::Store);

        store.set_fail_writes(false);
        assert!(store.insert("ideas", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = make_store();
        let err = store.delete("ideas", "nope").await.unwrap_err();
        assert_eq!(err.kind, collab_core::error::ErrorKind::NotFound);
    }
}

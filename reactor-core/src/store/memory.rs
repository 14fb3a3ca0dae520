//! In-memory store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Fields, Record, RecordId, Store, StoreError};

#[derive(Debug, Default)]
struct Collection {
    next_id: RecordId,
    rows: BTreeMap<RecordId, Fields>,
}

/// A process-local [`Store`] backed by ordered maps.
///
/// Record ids start at 1 and are never reused within a collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.rows.len())
            .unwrap_or(0)
    }

    /// Snapshot of a collection without going through the async interface.
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .map(|c| {
                c.rows
                    .iter()
                    .map(|(id, fields)| Record::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();
        entry.next_id += 1;
        let id = entry.next_id;
        entry.rows.insert(id, fields.clone());
        Ok(Record::new(id, fields))
    }

    async fn read(&self, collection: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.rows.get(&id))
            .map(|fields| Record::new(id, fields.clone())))
    }

    async fn update(&self, collection: &str, id: RecordId, fields: Fields) -> Result<Record, StoreError> {
        let mut collections = self.collections.write();
        let row = collections
            .get_mut(collection)
            .and_then(|c| c.rows.get_mut(&id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;

        for (name, value) in fields {
            row.insert(name, value);
        }
        Ok(Record::new(id, row.clone()))
    }

    async fn delete(&self, collection: &str, id: RecordId) -> Result<bool, StoreError> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .map(|c| c.rows.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self.records(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let first = store.create("items", fields(json!({"text": "a"}))).await.unwrap();
        let second = store.create("items", fields(json!({"text": "b"}))).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.count("items"), 2);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let first = store.create("items", Fields::new()).await.unwrap();
        assert!(store.delete("items", first.id).await.unwrap());
        assert!(!store.delete("items", first.id).await.unwrap());

        let next = store.create("items", Fields::new()).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new();
        let record = store
            .create("items", fields(json!({"text": "a", "completed": false})))
            .await
            .unwrap();

        let updated = store
            .update("items", record.id, fields(json!({"completed": true})))
            .await
            .unwrap();

        assert_eq!(updated.str_field("text"), "a");
        assert!(updated.bool_field("completed"));
    }

    #[tokio::test]
    async fn update_of_missing_record_fails() {
        let store = MemoryStore::new();
        let err = store.update("items", 9, Fields::new()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                collection: "items".into(),
                id: 9
            }
        );
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = MemoryStore::new();
        for text in ["c", "a", "b"] {
            store.create("items", fields(json!({ "text": text }))).await.unwrap();
        }

        let texts: Vec<_> = store
            .list("items")
            .await
            .unwrap()
            .iter()
            .map(|r| r.str_field("text").to_string())
            .collect();
        assert_eq!(texts, vec!["c", "a", "b"]);
        assert!(store.list("other").await.unwrap().is_empty());
    }
}

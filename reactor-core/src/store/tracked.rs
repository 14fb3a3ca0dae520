//! Write tracking.
//!
//! Wraps a store for the duration of one handler call and records which
//! collections were written, so the dispatcher can re-render every component
//! that reads them.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexSet;
use parking_lot::Mutex;

use super::{Fields, Record, RecordId, Store, StoreError};

/// A [`Store`] that forwards to another and remembers written collections.
pub struct TrackedStore {
    inner: Arc<dyn Store>,
    written: Mutex<IndexSet<String>>,
}

impl TrackedStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            written: Mutex::new(IndexSet::new()),
        }
    }

    /// Collections written so far, in first-write order.
    pub fn written(&self) -> Vec<String> {
        self.written.lock().iter().cloned().collect()
    }

    fn record_write(&self, collection: &str) {
        let mut written = self.written.lock();
        if !written.contains(collection) {
            written.insert(collection.to_string());
        }
    }
}

#[async_trait]
impl Store for TrackedStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        let record = self.inner.create(collection, fields).await?;
        self.record_write(collection);
        Ok(record)
    }

    async fn read(&self, collection: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.read(collection, id).await
    }

    async fn update(&self, collection: &str, id: RecordId, fields: Fields) -> Result<Record, StoreError> {
        let record = self.inner.update(collection, id, fields).await?;
        self.record_write(collection);
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: RecordId) -> Result<bool, StoreError> {
        let existed = self.inner.delete(collection, id).await?;
        if existed {
            self.record_write(collection);
        }
        Ok(existed)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.inner.list(collection).await
    }
}

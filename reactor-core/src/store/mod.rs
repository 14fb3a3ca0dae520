//! Persistence Collaborator
//!
//! The core never interprets stored data. Handlers and mount hooks write
//! through a [`Store`], and components read from it during their render pass
//! via declared reads (see [`crate::component::ReadSpec`]).
//!
//! Cross-component effects flow only through the store: a handler creates or
//! updates a record, and every component that declared a read on that
//! collection re-renders in the same dispatch cycle. The dispatcher detects the
//! writes by wrapping the store in a [`TrackedStore`] while the handler runs.

mod memory;
mod tracked;

pub use memory::MemoryStore;
pub use tracked::TrackedStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Identifier of a stored record, unique within its collection.
pub type RecordId = u64;

/// Named fields of a record.
pub type Fields = Map<String, Value>;

/// Errors raised by a store implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no record {id} in collection {collection}")]
    NotFound { collection: String, id: RecordId },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String field, or `""` when missing or not a string.
    pub fn str_field(&self, field: &str) -> &str {
        self.fields.get(field).and_then(Value::as_str).unwrap_or_default()
    }

    /// Boolean field, or `false` when missing or not a boolean.
    pub fn bool_field(&self, field: &str) -> bool {
        self.fields.get(field).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// External persistence, keyed by an externally defined record id.
///
/// Implementations own their consistency. The core awaits every call before
/// continuing the dispatch cycle, so a slow store only stalls its own session.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a record and return it with its assigned id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Read one record.
    async fn read(&self, collection: &str, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Merge `fields` into an existing record and return the result.
    async fn update(&self, collection: &str, id: RecordId, fields: Fields) -> Result<Record, StoreError>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, collection: &str, id: RecordId) -> Result<bool, StoreError>;

    /// All records of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError>;
}

//! Declared Reads
//!
//! A component type declares, from its current state, which external data its
//! render depends on. The runtime loads those reads once per render pass. The
//! loaded values are handed to the render function, hashed into the render
//! fingerprint, and turned into `source -> component` edges in the dependency
//! graph, so a write to a collection re-renders every component reading it.
//!
//! A derived read still depends on its whole source collection, but only the
//! derived value reaches the render and the fingerprint. Writes that leave the
//! value unchanged therefore end as cache hits.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

use crate::store::{Record, RecordId, Store, StoreError};

/// Computes a derived value from every record of a collection.
pub type DeriveFn = fn(&[Record]) -> Value;

/// One declared external read.
#[derive(Clone)]
pub enum ReadSpec {
    /// Every record of a collection.
    Collection(String),

    /// One record of a collection.
    Record { collection: String, id: RecordId },

    /// A value computed from every record of `source`.
    Derived {
        name: String,
        source: String,
        derive: DeriveFn,
    },
}

impl fmt::Debug for ReadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection(name) => f.debug_tuple("Collection").field(name).finish(),
            Self::Record { collection, id } => f
                .debug_struct("Record")
                .field("collection", collection)
                .field("id", id)
                .finish(),
            Self::Derived { name, source, .. } => f
                .debug_struct("Derived")
                .field("name", name)
                .field("source", source)
                .finish_non_exhaustive(),
        }
    }
}

impl ReadSpec {
    pub fn collection(name: impl Into<String>) -> Self {
        Self::Collection(name.into())
    }

    pub fn record(collection: impl Into<String>, id: RecordId) -> Self {
        Self::Record {
            collection: collection.into(),
            id,
        }
    }

    pub fn derived(name: impl Into<String>, source: impl Into<String>, derive: DeriveFn) -> Self {
        Self::Derived {
            name: name.into(),
            source: source.into(),
            derive,
        }
    }

    /// Name of the source this read depends on.
    pub fn source(&self) -> &str {
        match self {
            Self::Collection(name) => name,
            Self::Record { collection, .. } => collection,
            Self::Derived { source, .. } => source,
        }
    }
}

/// A loaded read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ReadValue {
    Collection {
        name: String,
        records: Vec<Record>,
    },
    Record {
        collection: String,
        id: RecordId,
        record: Option<Record>,
    },
    Derived {
        name: String,
        source: String,
        value: Value,
    },
}

impl ReadValue {
    fn source(&self) -> &str {
        match self {
            Self::Collection { name, .. } => name,
            Self::Record { collection, .. } => collection,
            Self::Derived { source, .. } => source,
        }
    }
}

/// Reads loaded for one render pass, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadSet {
    values: Vec<ReadValue>,
}

impl ReadSet {
    /// Load every declared read from `store`.
    pub async fn load(store: &dyn Store, specs: &[ReadSpec]) -> Result<Self, StoreError> {
        let mut values = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = match spec {
                ReadSpec::Collection(name) => ReadValue::Collection {
                    name: name.clone(),
                    records: store.list(name).await?,
                },
                ReadSpec::Record { collection, id } => ReadValue::Record {
                    collection: collection.clone(),
                    id: *id,
                    record: store.read(collection, *id).await?,
                },
                ReadSpec::Derived { name, source, derive } => ReadValue::Derived {
                    name: name.clone(),
                    source: source.clone(),
                    value: derive(&store.list(source).await?),
                },
            };
            values.push(value);
        }
        Ok(Self { values })
    }

    /// Distinct source names, in first-read order.
    pub fn sources(&self) -> Vec<String> {
        let sources: IndexSet<&str> = self.values.iter().map(ReadValue::source).collect();
        sources.into_iter().map(str::to_string).collect()
    }

    /// Records of a collection read, or an empty slice if it was not declared.
    pub fn collection(&self, name: &str) -> &[Record] {
        self.values
            .iter()
            .find_map(|value| match value {
                ReadValue::Collection { name: n, records } if n == name => Some(records.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// A single record, from either a record read or a collection read.
    pub fn record(&self, collection: &str, id: RecordId) -> Option<&Record> {
        self.values.iter().find_map(|value| match value {
            ReadValue::Record {
                collection: c,
                id: i,
                record,
            } if c == collection && *i == id => record.as_ref(),
            ReadValue::Collection { name, records } if name == collection => {
                records.iter().find(|r| r.id == id)
            }
            _ => None,
        })
    }

    /// A derived value by name.
    pub fn derived(&self, name: &str) -> Option<&Value> {
        self.values.iter().find_map(|value| match value {
            ReadValue::Derived { name: n, value, .. } if n == name => Some(value),
            _ => None,
        })
    }

    pub fn values(&self) -> &[ReadValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore};

    #[tokio::test]
    async fn load_resolves_collections_and_records() {
        let store = MemoryStore::new();
        let record = store.create("items", Fields::new()).await.unwrap();
        store.create("items", Fields::new()).await.unwrap();

        let specs = vec![
            ReadSpec::collection("items"),
            ReadSpec::record("items", record.id),
            ReadSpec::record("tags", 1),
        ];
        let reads = ReadSet::load(&store, &specs).await.unwrap();

        assert_eq!(reads.collection("items").len(), 2);
        assert!(reads.collection("tags").is_empty());
        assert_eq!(reads.record("items", record.id).unwrap().id, record.id);
        assert!(reads.record("tags", 1).is_none());
        assert_eq!(reads.sources(), vec!["items".to_string(), "tags".to_string()]);
    }

    #[tokio::test]
    async fn reads_change_when_the_store_changes() {
        let store = MemoryStore::new();
        let specs = vec![ReadSpec::collection("items")];

        let before = ReadSet::load(&store, &specs).await.unwrap();
        store.create("items", Fields::new()).await.unwrap();
        let after = ReadSet::load(&store, &specs).await.unwrap();

        assert_ne!(before, after);
    }

    fn titles(records: &[Record]) -> Value {
        records.iter().map(|r| r.fields.get("title").cloned().unwrap_or(Value::Null)).collect()
    }

    #[tokio::test]
    async fn derived_reads_keep_only_the_value() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("title".into(), Value::from("Milk"));
        let record = store.create("items", fields).await.unwrap();

        let specs = vec![ReadSpec::derived("titles", "items", titles)];
        let before = ReadSet::load(&store, &specs).await.unwrap();
        assert_eq!(before.derived("titles"), Some(&serde_json::json!(["Milk"])));
        assert!(before.collection("items").is_empty());
        assert_eq!(before.sources(), vec!["items".to_string()]);

        let mut other = Fields::new();
        other.insert("note".into(), Value::from("ignored"));
        store.update("items", record.id, other).await.unwrap();
        let after = ReadSet::load(&store, &specs).await.unwrap();
        assert_eq!(before, after);
    }
}

//! Key-value storage backing the revision log.
//!
//! Records are JSON values. Keys used by the log:
//! - `doc:<id>`: the document record (head, current text, attribute pool)
//! - `doc:<id>:revs:<n>`: revision `n`

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Record {key} has no object at {path}")]
    NotAnObject { key: String, path: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Asynchronous key-value store.
///
/// Only `get`, `set` and `remove` are required; the sub-field accessors
/// default to read-modify-write on the whole record.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Read the field at `path` (a list of object keys) inside a record.
    async fn get_sub(&self, key: &str, path: &[&str]) -> StoreResult<Option<Value>> {
        let Some(mut value) = self.get(key).await? else {
            return Ok(None);
        };
        for segment in path {
            match value {
                Value::Object(mut map) => match map.remove(*segment) {
                    Some(inner) => value = inner,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        Ok(Some(value))
    }

    /// Write the field at `path` inside a record, creating intermediate
    /// objects (and the record itself) as needed.
    async fn set_sub(&self, key: &str, path: &[&str], value: Value) -> StoreResult<()> {
        let Some((last, parents)) = path.split_last() else {
            return self.set(key, value).await;
        };

        let mut record = self
            .get(key)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));

        let mut cursor = &mut record;
        for segment in parents {
            let Value::Object(map) = cursor else {
                return Err(StoreError::NotAnObject {
                    key: key.to_string(),
                    path: path.join("."),
                });
            };
            cursor = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let Value::Object(map) = cursor else {
            return Err(StoreError::NotAnObject {
                key: key.to_string(),
                path: path.join("."),
            });
        };
        map.insert(last.to_string(), value);

        self.set(key, record).await
    }
}

/// In-memory store. Used by tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.records.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.records.write().remove(key);
        Ok(())
    }

    async fn get_sub(&self, key: &str, path: &[&str]) -> StoreResult<Option<Value>> {
        let records = self.records.read();
        let mut value = match records.get(key) {
            Some(value) => value,
            None => return Ok(None),
        };
        for segment in path {
            match value.get(*segment) {
                Some(inner) => value = inner,
                None => return Ok(None),
            }
        }
        Ok(Some(value.clone()))
    }
}

/// Key of the document record.
pub fn doc_key(doc_id: &str) -> String {
    format!("doc:{}", doc_id)
}

/// Key of revision `rev` of a document.
pub fn rev_key(doc_id: &str, rev: i64) -> String {
    format!("doc:{}:revs:{}", doc_id, rev)
}

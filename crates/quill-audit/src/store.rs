//! The host record store.
//!
//! Quill does not persist records itself; it drives a [`RecordStore`] and
//! writes audit entries around each call. [`MemoryRecordStore`] keeps rows in
//! process memory.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Attribute values of one row.
pub type Attributes = BTreeMap<String, Value>;

/// Persistence operations Quill needs from the host.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row and return its identifier.
    async fn insert(&self, type_name: &str, attributes: &Attributes) -> anyhow::Result<String>;

    /// Replace the attributes of an existing row.
    async fn update(&self, type_name: &str, id: &str, attributes: &Attributes)
    -> anyhow::Result<()>;

    /// Delete a row.
    async fn delete(&self, type_name: &str, id: &str) -> anyhow::Result<()>;

    /// Load a row.
    async fn fetch(&self, type_name: &str, id: &str) -> anyhow::Result<Option<Attributes>>;
}

/// In-memory record store with sequential identifiers per type.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: RwLock<HashMap<String, BTreeMap<String, Attributes>>>,
    next_id: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for a type.
    pub fn len(&self, type_name: &str) -> usize {
        self.rows
            .read()
            .map(|rows| rows.get(type_name).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, type_name: &str) -> bool {
        self.len(type_name) == 0
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("record store lock poisoned: {}", e)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, type_name: &str, attributes: &Attributes) -> anyhow::Result<String> {
        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let mut rows = self.rows.write().map_err(lock_error)?;
        rows.entry(type_name.to_string())
            .or_default()
            .insert(id.clone(), attributes.clone());
        Ok(id)
    }

    async fn update(
        &self,
        type_name: &str,
        id: &str,
        attributes: &Attributes,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.write().map_err(lock_error)?;
        let row = rows
            .get_mut(type_name)
            .and_then(|table| table.get_mut(id))
            .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", type_name, id))?;
        *row = attributes.clone();
        Ok(())
    }

    async fn delete(&self, type_name: &str, id: &str) -> anyhow::Result<()> {
        let mut rows = self.rows.write().map_err(lock_error)?;
        rows.get_mut(type_name)
            .and_then(|table| table.remove(id))
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", type_name, id))
    }

    async fn fetch(&self, type_name: &str, id: &str) -> anyhow::Result<Option<Attributes>> {
        let rows = self.rows.read().map_err(lock_error)?;
        Ok(rows.get(type_name).and_then(|table| table.get(id)).cloned())
    }
}

//! In-memory object store

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::{Fields, ObjectStore, Record, RecordId};

/// Table contents shared by every store implementation.
///
/// This is also the serialized body of a [`FileStore`](super::FileStore)
/// image, so it only holds plain data.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    /// Records per table, keyed by identity
    tables: BTreeMap<String, BTreeMap<RecordId, Fields>>,
    /// Last identity handed out per table
    next_ids: BTreeMap<String, u64>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all tables.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub(crate) fn insert(&mut self, table: &str, fields: Fields) -> RecordId {
        let counter = self.next_ids.entry(table.to_string()).or_insert(0);
        *counter += 1;
        let id = RecordId::new(*counter);
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id, fields);
        id
    }

    pub(crate) fn fetch(&self, table: &str, id: RecordId) -> Option<Record> {
        self.tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .map(|fields| Record {
                id,
                fields: fields.clone(),
            })
    }

    pub(crate) fn find_by(&self, table: &str, field: &str, value: &Value) -> Vec<Record> {
        self.rows(table)
            .filter(|(_, fields)| fields.get(field) == Some(value))
            .map(|(id, fields)| Record {
                id: *id,
                fields: fields.clone(),
            })
            .collect()
    }

    pub(crate) fn scan(&self, table: &str) -> Vec<Record> {
        self.rows(table)
            .map(|(id, fields)| Record {
                id: *id,
                fields: fields.clone(),
            })
            .collect()
    }

    pub(crate) fn update(&mut self, table: &str, id: RecordId, fields: Fields) -> StoreResult<()> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| StoreError::UnknownRecord {
                table: table.to_string(),
                id: id.value(),
            })?;
        row.extend(fields);
        Ok(())
    }

    pub(crate) fn delete(&mut self, table: &str, id: RecordId) -> bool {
        self.tables
            .get_mut(table)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub(crate) fn clear(&mut self) {
        self.tables.clear();
        self.next_ids.clear();
    }

    fn rows<'a>(&'a self, table: &str) -> impl Iterator<Item = (&'a RecordId, &'a Fields)> {
        self.tables.get(table).into_iter().flat_map(|rows| rows.iter())
    }
}

/// Process-local object store.
///
/// Writes are applied immediately; `flush` has nothing to persist.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all tables.
    pub fn record_count(&self) -> StoreResult<usize> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.record_count())
    }
}

impl ObjectStore for MemoryStore {
    fn insert(&self, table: &str, fields: Fields) -> StoreResult<RecordId> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        Ok(tables.insert(table, fields))
    }

    fn fetch(&self, table: &str, id: RecordId) -> StoreResult<Option<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.fetch(table, id))
    }

    fn find_by(&self, table: &str, field: &str, value: &Value) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.find_by(table, field, value))
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::poisoned())?;
        Ok(tables.scan(table))
    }

    fn update(&self, table: &str, id: RecordId, fields: Fields) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        tables.update(table, id, fields)
    }

    fn delete(&self, table: &str, id: RecordId) -> StoreResult<bool> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        Ok(tables.delete(table, id))
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(|_| StoreError::poisoned())?;
        tables.clear();
        Ok(())
    }
}

//! Object store contract
//!
//! The versioning core never talks to a storage engine directly. Everything
//! it persists (states, revisions, identities, snapshots) goes through the
//! minimal [`ObjectStore`] contract defined here:
//!
//! - insert a record into a table, receiving its identity
//! - fetch by identity, or by equality on one field
//! - scan a table in identity order
//! - update or delete a record by identity
//! - flush pending writes atomically
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`] - process-local tables, flush is a no-op
//! - [`FileStore`] - the same tables persisted as one checksummed JSON image

mod checksum;
mod errors;
mod file;
mod memory;

pub use checksum::{compute_checksum, verify_checksum};
pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::{MemoryStore, Tables};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field values of a single record, ordered by field name.
pub type Fields = BTreeMap<String, Value>;

/// Store-assigned record identity.
///
/// Identities are allocated per table, start at 1 and are never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Reads an identity stored as a field value.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_u64().map(Self)
    }

    /// Encodes the identity as a field value.
    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single stored record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    /// Returns a field value, `Value::Null` when absent.
    pub fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Null)
    }

    /// Reads a field holding another record's identity.
    pub fn reference(&self, name: &str) -> Option<RecordId> {
        RecordId::from_value(self.field(name))
    }
}

/// The persistent object store the versioning core is built on.
///
/// Implementations must be safe to share between threads. Each call is
/// synchronous and may block on I/O.
pub trait ObjectStore: Send + Sync {
    /// Inserts a record and returns its newly assigned identity.
    fn insert(&self, table: &str, fields: Fields) -> StoreResult<RecordId>;

    /// Fetches a record by identity.
    fn fetch(&self, table: &str, id: RecordId) -> StoreResult<Option<Record>>;

    /// Returns every record whose `field` equals `value`, in identity order.
    fn find_by(&self, table: &str, field: &str, value: &Value) -> StoreResult<Vec<Record>>;

    /// Returns every record of a table, in identity order.
    fn scan(&self, table: &str) -> StoreResult<Vec<Record>>;

    /// Merges `fields` into an existing record.
    fn update(&self, table: &str, id: RecordId, fields: Fields) -> StoreResult<()>;

    /// Removes a record. Returns false if it did not exist.
    fn delete(&self, table: &str, id: RecordId) -> StoreResult<bool>;

    /// Makes all writes so far durable, atomically.
    fn flush(&self) -> StoreResult<()>;

    /// Drops every table and resets identity allocation.
    fn clear(&self) -> StoreResult<()>;
}

/// Builds a [`Fields`] map from `(name, value)` pairs.
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

//! Versioned objects
//!
//! A versioned entity is stored as:
//!
//! - one *identity* record in `E::TABLE`, holding the unversioned identity
//!   fields (natural keys, link endpoints) and never changing after creation
//! - one *snapshot* record per revision that touched it, in
//!   `E::VERSION_TABLE`, holding a full copy of the versioned fields, the
//!   object's state, the owning revision and a back-reference to the identity
//!
//! Reads are answered from the snapshot selected for the bound revision.
//! Writes go to a single working-copy snapshot owned by the bound
//! transaction; the first write clones the current snapshot, later writes
//! in the same transaction update that copy in place.

mod history;
mod object;
mod snapshot;

pub use history::{reconstruct, Owner};
pub use object::VersionedObject;
pub use snapshot::Snapshot;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{VdmError, VdmResult};
use crate::revision::{Revision, RevisionNumber};
use crate::state::StateTable;
use crate::store::{ObjectStore, RecordId};

/// Snapshot field holding the identity back-reference
pub(crate) const BASE_FIELD: &str = "base";
/// Snapshot field holding the owning revision
pub(crate) const REVISION_FIELD: &str = "revision";
/// Snapshot field holding the state record
pub(crate) const STATE_FIELD: &str = "state";

/// Static description of a versioned entity type.
///
/// Entity types are usually zero-sized markers:
///
/// ```ignore
/// struct Package;
///
/// impl Versioned for Package {
///     const TABLE: &'static str = "package";
///     const VERSION_TABLE: &'static str = "package_revision";
///     const FIELDS: &'static [&'static str] = &["name", "title"];
///     const IDENTITY_FIELDS: &'static [&'static str] = &["slug"];
///     const KEY: Option<&'static str> = Some("slug");
/// }
/// ```
pub trait Versioned {
    /// Identity table
    const TABLE: &'static str;
    /// Snapshot table
    const VERSION_TABLE: &'static str;
    /// Versioned fields, copied into every snapshot
    const FIELDS: &'static [&'static str];
    /// Unversioned fields stored on the identity record
    const IDENTITY_FIELDS: &'static [&'static str] = &[];
    /// Identity field used as natural key by registers
    const KEY: Option<&'static str> = None;

    /// Fails with `UnknownField` unless `field` is a versioned field.
    fn check_field(field: &str) -> VdmResult<()> {
        if Self::FIELDS.contains(&field) {
            Ok(())
        } else {
            Err(VdmError::UnknownField {
                table: Self::TABLE,
                field: field.to_string(),
            })
        }
    }
}

/// Store handles shared by everything built on one repository.
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn ObjectStore>,
    states: Arc<StateTable>,
}

impl Context {
    pub fn new(store: Arc<dyn ObjectStore>, states: StateTable) -> Self {
        Self {
            store,
            states: Arc::new(states),
        }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// A new handle on the shared store.
    pub fn shared_store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

/// The `(revision, transaction)` pair a view reads and writes through.
///
/// `revision` must be committed: it bounds which committed snapshots are
/// visible. `transaction`, when present, must be pending: its own snapshots
/// are visible on top and all writes go to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    revision: Revision,
    upper_bound: RevisionNumber,
    transaction: Option<Revision>,
}

impl Binding {
    /// Binds to a committed revision, optionally writing through a
    /// transaction.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `revision` is not active or `transaction` is not
    /// pending.
    pub fn new(revision: Revision, transaction: Option<Revision>) -> VdmResult<Self> {
        let upper_bound = revision.require_active("read at")?;
        if let Some(txn) = &transaction {
            if !txn.is_transaction() {
                return Err(VdmError::invalid_state(format!(
                    "Cannot write through {}: it is already committed",
                    txn
                )));
            }
        }
        Ok(Self {
            revision,
            upper_bound,
            transaction,
        })
    }

    /// Read-only binding at a committed revision.
    pub fn at(revision: Revision) -> VdmResult<Self> {
        Self::new(revision, None)
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn transaction(&self) -> Option<&Revision> {
        self.transaction.as_ref()
    }

    /// Highest committed revision number visible through this binding.
    pub fn upper_bound(&self) -> RevisionNumber {
        self.upper_bound
    }
}

/// How a register looks an object up.
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    /// Store identity
    Id(RecordId),
    /// Value of the entity's natural key field
    Natural(Value),
}

impl From<RecordId> for Key {
    fn from(id: RecordId) -> Self {
        Key::Id(id)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Natural(Value::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Natural(Value::from(value))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "id {}", id),
            Key::Natural(value) => write!(f, "key {}", value),
        }
    }
}

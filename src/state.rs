//! Lifecycle states
//!
//! Revisions and snapshots both carry one of three states. The states are
//! persisted once, as records of the `state` table, when a repository is
//! initialised. [`StateTable`] resolves between the enum and those records;
//! it is built once per store and passed around by reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VdmError, VdmResult};
use crate::store::{fields, ObjectStore, RecordId};

/// Table holding the persisted states
pub const STATE_TABLE: &str = "state";

/// Lifecycle tag shared by revisions and snapshots.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Active,
    Deleted,
    Pending,
}

impl State {
    /// All states, in bootstrap order.
    pub const ALL: [State; 3] = [State::Active, State::Deleted, State::Pending];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Active => "active",
            State::Deleted => "deleted",
            State::Pending => "pending",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = VdmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| VdmError::invalid_state(format!("Unknown state name '{}'", s)))
    }
}

/// Immutable mapping between [`State`] values and their store records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTable {
    /// Record ids indexed in `State::ALL` order
    ids: [RecordId; 3],
}

impl StateTable {
    /// Writes the three state records and returns their table.
    pub fn bootstrap(store: &dyn ObjectStore) -> VdmResult<Self> {
        let mut ids = [RecordId::new(0); 3];
        for (slot, state) in ids.iter_mut().zip(State::ALL) {
            *slot = store.insert(STATE_TABLE, fields([("name", state.as_str())]))?;
        }
        Ok(Self { ids })
    }

    /// Loads the table from previously bootstrapped state records.
    ///
    /// # Errors
    ///
    /// `NoHistory` if any of the three states is missing.
    pub fn load(store: &dyn ObjectStore) -> VdmResult<Self> {
        let records = store.scan(STATE_TABLE)?;
        let mut ids = [RecordId::new(0); 3];
        for (slot, state) in ids.iter_mut().zip(State::ALL) {
            let record = records
                .iter()
                .find(|r| r.field("name").as_str() == Some(state.as_str()))
                .ok_or_else(|| {
                    VdmError::no_history(format!(
                        "State '{}' missing; repository not initialised",
                        state
                    ))
                })?;
            *slot = record.id;
        }
        Ok(Self { ids })
    }

    /// Store identity of a state.
    pub fn id(&self, state: State) -> RecordId {
        match state {
            State::Active => self.ids[0],
            State::Deleted => self.ids[1],
            State::Pending => self.ids[2],
        }
    }

    /// Resolves a store identity back to its state.
    pub fn state(&self, id: RecordId) -> VdmResult<State> {
        State::ALL
            .into_iter()
            .find(|state| self.id(*state) == id)
            .ok_or_else(|| VdmError::invalid_state(format!("Record {} is not a known state", id)))
    }
}

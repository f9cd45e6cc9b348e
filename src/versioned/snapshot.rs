//! Snapshot - one recorded copy of a versioned object

use serde::Serialize;
use serde_json::Value;

use crate::revision::RevisionNumber;
use crate::state::State;
use crate::store::{Fields, RecordId};

static NULL: Value = Value::Null;

/// A full copy of an object's versioned fields, owned by one revision.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// Snapshot record identity
    id: RecordId,
    /// Owning revision
    revision: RecordId,
    /// Owning revision number; `None` for a working copy
    number: Option<RevisionNumber>,
    state: State,
    fields: Fields,
}

impl Snapshot {
    pub(crate) fn new(
        id: RecordId,
        revision: RecordId,
        number: Option<RevisionNumber>,
        state: State,
        fields: Fields,
    ) -> Self {
        Self {
            id,
            revision,
            number,
            state,
            fields,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn revision_id(&self) -> RecordId {
        self.revision
    }

    pub fn number(&self) -> Option<RevisionNumber> {
        self.number
    }

    /// True for the snapshot an open transaction is writing to.
    pub fn is_working_copy(&self) -> bool {
        self.number.is_none()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Versioned field value, `Value::Null` if never set.
    pub fn field(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub(crate) fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }
}

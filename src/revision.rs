//! Revisions and transactions
//!
//! A revision starts life as a transaction (`Pending`) and becomes a point
//! in history (`Active`) exactly once, when it is committed:
//!
//! ```text
//! Pending --commit--> Active
//! ```
//!
//! Committing assigns the revision its number. Numbers are the only
//! ordering key for history and equal the store-assigned revision id, so
//! they are unique and increase with creation order. A pending revision has
//! no number and is never treated as a point in history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{VdmError, VdmResult};
use crate::observability::{Event, Logger};
use crate::state::{State, StateTable};
use crate::store::{fields, Fields, ObjectStore, Record, RecordId};

/// Table holding revisions
pub const REVISION_TABLE: &str = "revision";

/// Ordering key of a committed revision.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct RevisionNumber(u64);

impl RevisionNumber {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A committed revision or an open transaction.
///
/// This is a value loaded from the store. Operations that change a revision
/// write through to the store before updating the value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Revision {
    id: RecordId,
    number: Option<RevisionNumber>,
    author: Option<String>,
    log_message: Option<String>,
    /// Start time for a transaction, commit time for a revision
    timestamp: DateTime<Utc>,
    state: State,
    base_revision: Option<RecordId>,
}

impl Revision {
    /// Creates a new pending revision based on `base`.
    pub fn begin(
        store: &dyn ObjectStore,
        states: &StateTable,
        base: Option<&Revision>,
    ) -> VdmResult<Self> {
        let timestamp = Utc::now();
        let mut record = fields([
            ("state", states.id(State::Pending).to_value()),
            ("timestamp", timestamp_value(&timestamp)?),
        ]);
        if let Some(base) = base {
            record.insert("base_revision".into(), base.id.to_value());
        }
        let id = store.insert(REVISION_TABLE, record)?;

        Ok(Self {
            id,
            number: None,
            author: None,
            log_message: None,
            timestamp,
            state: State::Pending,
            base_revision: base.map(|b| b.id),
        })
    }

    /// Writes an already-active revision directly, bypassing the
    /// transaction protocol. Only used to bootstrap an empty repository,
    /// where no revision exists to base a transaction on.
    pub(crate) fn bootstrap(
        store: &dyn ObjectStore,
        states: &StateTable,
        author: &str,
        log_message: &str,
    ) -> VdmResult<Self> {
        let timestamp = Utc::now();
        let id = store.insert(
            REVISION_TABLE,
            fields([
                ("state", states.id(State::Active).to_value()),
                ("author", Value::from(author)),
                ("log_message", Value::from(log_message)),
                ("timestamp", timestamp_value(&timestamp)?),
            ]),
        )?;
        store.update(REVISION_TABLE, id, fields([("number", id.value())]))?;

        Ok(Self {
            id,
            number: Some(RevisionNumber::new(id.value())),
            author: Some(author.to_string()),
            log_message: Some(log_message.to_string()),
            timestamp,
            state: State::Active,
            base_revision: None,
        })
    }

    /// Loads a revision by store identity.
    pub fn load(store: &dyn ObjectStore, states: &StateTable, id: RecordId) -> VdmResult<Self> {
        let record = store
            .fetch(REVISION_TABLE, id)?
            .ok_or_else(|| VdmError::not_found(format!("revision id {}", id)))?;
        Self::from_record(states, &record)
    }

    pub(crate) fn from_record(states: &StateTable, record: &Record) -> VdmResult<Self> {
        let state_id = record.reference("state").ok_or_else(|| {
            VdmError::invalid_state(format!("Revision {} has no state", record.id))
        })?;
        let state = states.state(state_id)?;

        let timestamp = match record.field("timestamp") {
            Value::Null => DateTime::<Utc>::default(),
            value => serde_json::from_value(value.clone()).map_err(|source| {
                VdmError::Serialization {
                    field: "timestamp".into(),
                    source,
                }
            })?,
        };

        Ok(Self {
            id: record.id,
            number: record.field("number").as_u64().map(RevisionNumber::new),
            author: record.field("author").as_str().map(str::to_string),
            log_message: record.field("log_message").as_str().map(str::to_string),
            timestamp,
            state,
            base_revision: record.reference("base_revision"),
        })
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Ordering key, `None` while pending.
    pub fn number(&self) -> Option<RevisionNumber> {
        match self.state {
            State::Pending => None,
            _ => self.number,
        }
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn log_message(&self) -> Option<&str> {
        self.log_message.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn base_revision(&self) -> Option<RecordId> {
        self.base_revision
    }

    /// True while the revision is an open transaction.
    pub fn is_transaction(&self) -> bool {
        self.state == State::Pending
    }

    /// Sets the author of an open transaction.
    pub fn set_author(&mut self, store: &dyn ObjectStore, author: &str) -> VdmResult<()> {
        self.require_open(store, "set the author of")?;
        store.update(REVISION_TABLE, self.id, fields([("author", author)]))?;
        self.author = Some(author.to_string());
        Ok(())
    }

    /// Sets the log message of an open transaction.
    pub fn set_log_message(&mut self, store: &dyn ObjectStore, message: &str) -> VdmResult<()> {
        self.require_open(store, "set the log message of")?;
        store.update(REVISION_TABLE, self.id, fields([("log_message", message)]))?;
        self.log_message = Some(message.to_string());
        Ok(())
    }

    /// Promotes the transaction to an active revision.
    ///
    /// Assigns `number := id`, stamps the commit time and flushes the store.
    /// The state change is a single record update, so every snapshot owned
    /// by this transaction becomes visible at once.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the revision is not pending, including when
    /// another clone of it has already been committed.
    pub fn commit(&mut self, store: &dyn ObjectStore, states: &StateTable) -> VdmResult<()> {
        if let Err(e) = self.require_open(store, "commit") {
            let id = self.id.to_string();
            Logger::event(Event::CommitRejected, &[("revision_id", id.as_str())]);
            return Err(e);
        }

        let timestamp = Utc::now();
        let number = RevisionNumber::new(self.id.value());
        let mut update = Fields::new();
        update.insert("number".into(), Value::from(number.value()));
        update.insert("state".into(), states.id(State::Active).to_value());
        update.insert("timestamp".into(), timestamp_value(&timestamp)?);
        store.update(REVISION_TABLE, self.id, update)?;
        store.flush()?;

        self.number = Some(number);
        self.state = State::Active;
        self.timestamp = timestamp;

        let number_str = number.to_string();
        Logger::event(
            Event::RevisionCommitted,
            &[
                ("author", self.author().unwrap_or("")),
                ("number", number_str.as_str()),
            ],
        );
        Ok(())
    }

    /// Fails unless the revision is a committed point in history.
    pub(crate) fn require_active(&self, action: &str) -> VdmResult<RevisionNumber> {
        match (self.state, self.number) {
            (State::Active, Some(number)) => Ok(number),
            _ => Err(VdmError::invalid_state(format!(
                "Cannot {} revision {}: it is {}, not active",
                action, self.id, self.state
            ))),
        }
    }

    /// Fails unless the stored revision is still an open transaction.
    ///
    /// Each clone of a transaction carries its own `state`; only the store
    /// knows whether another clone has committed it. A stored number means
    /// the revision is committed.
    pub(crate) fn require_open(&self, store: &dyn ObjectStore, action: &str) -> VdmResult<()> {
        self.require_pending(action)?;
        let record = store
            .fetch(REVISION_TABLE, self.id)?
            .ok_or_else(|| VdmError::not_found(format!("revision id {}", self.id)))?;
        if record.field("number").is_null() {
            Ok(())
        } else {
            Err(VdmError::invalid_state(format!(
                "Cannot {} revision {}: it was committed as r{}",
                action,
                self.id,
                record.field("number")
            )))
        }
    }

    fn require_pending(&self, action: &str) -> VdmResult<()> {
        if self.is_transaction() {
            Ok(())
        } else {
            Err(VdmError::invalid_state(format!(
                "Cannot {} revision {}: it is {}, not a transaction",
                action, self.id, self.state
            )))
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(number) => write!(f, "r{}", number),
            None => write!(f, "transaction {}", self.id),
        }
    }
}

fn timestamp_value(timestamp: &DateTime<Utc>) -> VdmResult<Value> {
    serde_json::to_value(timestamp).map_err(|source| VdmError::Serialization {
        field: "timestamp".into(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> (MemoryStore, StateTable) {
        let store = MemoryStore::new();
        let states = StateTable::bootstrap(&store).unwrap();
        (store, states)
    }

    #[test]
    fn test_bootstrap_revision_is_active_number_one() {
        let (store, states) = setup();
        let rev = Revision::bootstrap(&store, &states, "system", "init").unwrap();

        assert_eq!(rev.state(), State::Active);
        assert_eq!(rev.number(), Some(RevisionNumber::new(1)));
        assert!(!rev.is_transaction());

        let loaded = Revision::load(&store, &states, rev.id()).unwrap();
        assert_eq!(loaded, rev);
    }

    #[test]
    fn test_begin_is_pending_without_number() {
        let (store, states) = setup();
        let base = Revision::bootstrap(&store, &states, "system", "init").unwrap();
        let txn = Revision::begin(&store, &states, Some(&base)).unwrap();

        assert!(txn.is_transaction());
        assert_eq!(txn.number(), None);
        assert_eq!(txn.base_revision(), Some(base.id()));
        assert_eq!(txn.to_string(), format!("transaction {}", txn.id()));
    }

    #[test]
    fn test_commit_assigns_number_from_id() {
        let (store, states) = setup();
        let base = Revision::bootstrap(&store, &states, "system", "init").unwrap();
        let mut txn = Revision::begin(&store, &states, Some(&base)).unwrap();
        txn.set_author(&store, "alice").unwrap();
        txn.set_log_message(&store, "add foo").unwrap();
        txn.commit(&store, &states).unwrap();

        assert_eq!(txn.state(), State::Active);
        assert_eq!(txn.number(), Some(RevisionNumber::new(txn.id().value())));

        let loaded = Revision::load(&store, &states, txn.id()).unwrap();
        assert_eq!(loaded.number(), txn.number());
        assert_eq!(loaded.author(), Some("alice"));
        assert_eq!(loaded.log_message(), Some("add foo"));
        assert_eq!(loaded.timestamp(), txn.timestamp());
    }

    #[test]
    fn test_commit_twice_fails() {
        let (store, states) = setup();
        let mut txn = Revision::begin(&store, &states, None).unwrap();
        txn.commit(&store, &states).unwrap();

        let err = txn.commit(&store, &states).unwrap_err();
        assert!(matches!(err, VdmError::InvalidState(_)));
    }

    #[test]
    fn test_commit_through_clone_fails() {
        let (store, states) = setup();
        let mut txn = Revision::begin(&store, &states, None).unwrap();
        let mut copy = txn.clone();
        txn.commit(&store, &states).unwrap();

        let err = copy.commit(&store, &states).unwrap_err();
        assert!(matches!(err, VdmError::InvalidState(_)));
        assert!(copy.is_transaction());

        let loaded = Revision::load(&store, &states, txn.id()).unwrap();
        assert_eq!(loaded.number(), txn.number());
        assert_eq!(loaded.timestamp(), txn.timestamp());
    }

    #[test]
    fn test_metadata_frozen_through_stale_clone() {
        let (store, states) = setup();
        let mut txn = Revision::begin(&store, &states, None).unwrap();
        txn.set_author(&store, "alice").unwrap();
        let mut copy = txn.clone();
        txn.commit(&store, &states).unwrap();

        assert!(copy.set_author(&store, "mallory").is_err());
        let loaded = Revision::load(&store, &states, txn.id()).unwrap();
        assert_eq!(loaded.author(), Some("alice"));
    }

    #[test]
    fn test_metadata_frozen_after_commit() {
        let (store, states) = setup();
        let mut rev = Revision::bootstrap(&store, &states, "system", "init").unwrap();
        assert!(rev.set_author(&store, "mallory").is_err());
        assert_eq!(rev.author(), Some("system"));
    }

    #[test]
    fn test_require_active() {
        let (store, states) = setup();
        let txn = Revision::begin(&store, &states, None).unwrap();
        assert!(txn.require_active("read").is_err());
    }
}

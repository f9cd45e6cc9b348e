//! VersionedObject - a revision-bound view of one versioned identity

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::history::{reconstruct, Owner};
use super::{Binding, Context, Snapshot, Versioned, BASE_FIELD, REVISION_FIELD, STATE_FIELD};
use crate::error::{VdmError, VdmResult};
use crate::observability::{Event, Logger};
use crate::revision::{Revision, REVISION_TABLE};
use crate::state::State;
use crate::store::{Fields, Record, RecordId};

/// State that only exists once the object is bound.
#[derive(Clone, Debug)]
struct Bound {
    binding: Binding,
    /// Visible snapshots, oldest first; a working copy is always last
    history: Vec<Snapshot>,
}

impl Bound {
    fn has_working_copy(&self) -> bool {
        self.history.last().map_or(false, Snapshot::is_working_copy)
    }
}

/// An ephemeral view of a versioned identity at one `(revision,
/// transaction)` binding.
///
/// Viewing another point in history means binding again; the view itself
/// owns nothing the store does not already hold.
pub struct VersionedObject<E: Versioned> {
    ctx: Context,
    id: RecordId,
    identity: Fields,
    bound: Option<Bound>,
    _entity: PhantomData<E>,
}

impl<E: Versioned> VersionedObject<E> {
    /// Loads an identity without binding it.
    ///
    /// # Errors
    ///
    /// `NotFound` if no identity record exists.
    pub fn load(ctx: Context, id: RecordId) -> VdmResult<Self> {
        let record = ctx
            .store()
            .fetch(E::TABLE, id)?
            .ok_or_else(|| VdmError::not_found(format!("{} id {}", E::TABLE, id)))?;
        Ok(Self::from_record(ctx, record))
    }

    pub(crate) fn from_record(ctx: Context, record: Record) -> Self {
        Self {
            ctx,
            id: record.id,
            identity: record.fields,
            bound: None,
            _entity: PhantomData,
        }
    }

    /// Loads and binds in one step.
    pub fn load_bound(ctx: Context, id: RecordId, binding: &Binding) -> VdmResult<Self> {
        let mut object = Self::load(ctx, id)?;
        object.bind(binding)?;
        Ok(object)
    }

    /// Binds the view to `binding`, reconstructing the visible history.
    ///
    /// Binding never fails because the object does not exist yet; check
    /// [`exists`](Self::exists) for that.
    pub fn bind(&mut self, binding: &Binding) -> VdmResult<()> {
        let records = self
            .ctx
            .store()
            .find_by(E::VERSION_TABLE, BASE_FIELD, &self.id.to_value())?;

        let mut owners: HashMap<RecordId, Owner> = HashMap::new();
        let mut tagged = Vec::with_capacity(records.len());

        for record in records {
            let revision_id = record.reference(REVISION_FIELD).ok_or_else(|| {
                VdmError::invalid_state(format!(
                    "{} snapshot {} has no owning revision",
                    E::TABLE,
                    record.id
                ))
            })?;

            let owner = match owners.get(&revision_id) {
                Some(owner) => *owner,
                None => {
                    let owner = self.owner_of(revision_id, binding)?;
                    owners.insert(revision_id, owner);
                    owner
                }
            };

            let number = match owner {
                Owner::Committed(number) => Some(number),
                _ => None,
            };
            let snapshot = self.snapshot_from(record, revision_id, number)?;
            tagged.push((owner, snapshot));
        }

        self.bound = Some(Bound {
            binding: binding.clone(),
            history: reconstruct(tagged, binding.upper_bound()),
        });
        Ok(())
    }

    /// Consumes the view and returns it bound to `binding`.
    pub fn rebind(mut self, binding: &Binding) -> VdmResult<Self> {
        self.bind(binding)?;
        Ok(self)
    }

    fn owner_of(&self, revision_id: RecordId, binding: &Binding) -> VdmResult<Owner> {
        if binding.transaction().map(Revision::id) == Some(revision_id) {
            return Ok(Owner::BoundTransaction);
        }
        let record = self
            .ctx
            .store()
            .fetch(REVISION_TABLE, revision_id)?
            .ok_or_else(|| VdmError::not_found(format!("revision id {}", revision_id)))?;
        let revision = Revision::from_record(self.ctx.states(), &record)?;
        Ok(match revision.number() {
            Some(number) => Owner::Committed(number),
            None => Owner::OtherPending,
        })
    }

    fn snapshot_from(
        &self,
        record: Record,
        revision_id: RecordId,
        number: Option<crate::revision::RevisionNumber>,
    ) -> VdmResult<Snapshot> {
        let state = match record.reference(STATE_FIELD) {
            Some(state_id) => self.ctx.states().state(state_id)?,
            None => State::Active,
        };
        let fields = record
            .fields
            .into_iter()
            .filter(|(name, _)| E::FIELDS.contains(&name.as_str()))
            .collect();
        Ok(Snapshot::new(record.id, revision_id, number, state, fields))
    }

    /// Store identity of the object.
    pub fn id(&self) -> RecordId {
        self.id
    }

    pub(crate) fn context(&self) -> &Context {
        &self.ctx
    }

    /// Unversioned identity field value.
    pub fn identity_field(&self, name: &str) -> Option<&Value> {
        self.identity.get(name)
    }

    /// The binding this view reads through, if bound.
    pub fn binding(&self) -> Option<&Binding> {
        self.bound.as_ref().map(|b| &b.binding)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// True if any snapshot is visible at the binding. Unbound views never
    /// exist.
    pub fn exists(&self) -> bool {
        self.bound.as_ref().map_or(false, |b| !b.history.is_empty())
    }

    /// Visible snapshots, oldest first. A working copy, if any, is last.
    pub fn history(&self) -> VdmResult<&[Snapshot]> {
        Ok(&self.bound()?.history)
    }

    /// The snapshot reads are answered from.
    pub fn current(&self) -> VdmResult<&Snapshot> {
        self.bound()?
            .history
            .last()
            .ok_or_else(|| self.not_visible())
    }

    /// Reads a versioned field.
    ///
    /// # Errors
    ///
    /// - `NotBound` before [`bind`](Self::bind)
    /// - `UnknownField` for a field `E` does not declare
    /// - `NotFound` if nothing is visible at the binding
    pub fn get(&self, field: &str) -> VdmResult<&Value> {
        let current = self.current()?;
        E::check_field(field)?;
        Ok(current.field(field))
    }

    /// Reads a versioned field and deserializes it.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> VdmResult<T> {
        let value = self.get(field)?.clone();
        serde_json::from_value(value).map_err(|source| VdmError::Serialization {
            field: field.to_string(),
            source,
        })
    }

    /// State of the current snapshot.
    pub fn state(&self) -> VdmResult<State> {
        Ok(self.current()?.state())
    }

    /// Writes a versioned field through the working copy.
    ///
    /// # Errors
    ///
    /// - `NotBound` before [`bind`](Self::bind)
    /// - `UnknownField` for a field `E` does not declare
    /// - `NoTransaction` if the binding has no transaction
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> VdmResult<()> {
        self.bound()?;
        E::check_field(field)?;
        let value = value.into();

        let snapshot_id = self.ensure_working_copy()?;
        let mut update = Fields::new();
        update.insert(field.to_string(), value.clone());
        self.ctx
            .store()
            .update(E::VERSION_TABLE, snapshot_id, update)?;

        if let Some(working) = self.working_copy_mut() {
            working.set_field(field, value);
        }
        Ok(())
    }

    /// Serializes `value` and writes it to a versioned field.
    pub fn set_as<T: Serialize>(&mut self, field: &str, value: &T) -> VdmResult<()> {
        let value = serde_json::to_value(value).map_err(|source| VdmError::Serialization {
            field: field.to_string(),
            source,
        })?;
        self.set(field, value)
    }

    /// Soft-deletes the object in the bound transaction.
    pub fn delete(&mut self) -> VdmResult<()> {
        self.set_state(State::Deleted)
    }

    /// Reverses a soft delete in the bound transaction.
    pub fn restore(&mut self) -> VdmResult<()> {
        self.set_state(State::Active)
    }

    fn set_state(&mut self, state: State) -> VdmResult<()> {
        let snapshot_id = self.ensure_working_copy()?;
        let mut update = Fields::new();
        update.insert(
            STATE_FIELD.to_string(),
            self.ctx.states().id(state).to_value(),
        );
        self.ctx
            .store()
            .update(E::VERSION_TABLE, snapshot_id, update)?;

        if let Some(working) = self.working_copy_mut() {
            working.set_state(state);
        }
        Ok(())
    }

    /// Hard-deletes every snapshot and the identity record.
    ///
    /// This bypasses versioning entirely: no revision records the removal.
    pub fn purge(self) -> VdmResult<()> {
        let store = self.ctx.store();
        let snapshots = store.find_by(E::VERSION_TABLE, BASE_FIELD, &self.id.to_value())?;
        for snapshot in &snapshots {
            store.delete(E::VERSION_TABLE, snapshot.id)?;
        }
        store.delete(E::TABLE, self.id)?;
        store.flush()?;

        let id = self.id.to_string();
        let count = snapshots.len().to_string();
        Logger::event(
            Event::ObjectPurged,
            &[
                ("id", id.as_str()),
                ("snapshots", count.as_str()),
                ("table", E::TABLE),
            ],
        );
        Ok(())
    }

    /// Makes sure the bound transaction has a snapshot of this object and
    /// returns its record id.
    ///
    /// The first call clones the current snapshot (or starts a fresh,
    /// active one for a brand-new object); later calls reuse it, so a
    /// transaction adds at most one snapshot per identity. Fails with
    /// `InvalidState` once the transaction has been committed.
    pub(crate) fn ensure_working_copy(&mut self) -> VdmResult<RecordId> {
        let bound = self.bound.as_ref().ok_or(VdmError::NotBound(E::TABLE))?;
        let txn = bound
            .binding
            .transaction()
            .ok_or_else(|| VdmError::NoTransaction(format!("{} {}", E::TABLE, self.id)))?;
        txn.require_open(self.ctx.store(), "write through")?;

        if bound.has_working_copy() {
            if let Some(working) = bound.history.last() {
                return Ok(working.id());
            }
        }

        let (state, fields) = match bound.history.last() {
            Some(current) => (current.state(), current.fields().clone()),
            None => (State::Active, Fields::new()),
        };

        let mut record = fields.clone();
        record.insert(BASE_FIELD.to_string(), self.id.to_value());
        record.insert(REVISION_FIELD.to_string(), txn.id().to_value());
        record.insert(
            STATE_FIELD.to_string(),
            self.ctx.states().id(state).to_value(),
        );
        let txn_id = txn.id();
        let snapshot_id = self.ctx.store().insert(E::VERSION_TABLE, record)?;

        if let Some(bound) = self.bound.as_mut() {
            bound
                .history
                .push(Snapshot::new(snapshot_id, txn_id, None, state, fields));
        }
        Ok(snapshot_id)
    }

    fn working_copy_mut(&mut self) -> Option<&mut Snapshot> {
        self.bound
            .as_mut()
            .and_then(|b| b.history.last_mut())
            .filter(|s| s.is_working_copy())
    }

    fn bound(&self) -> VdmResult<&Bound> {
        self.bound.as_ref().ok_or(VdmError::NotBound(E::TABLE))
    }

    fn not_visible(&self) -> VdmError {
        let at = self
            .binding()
            .map(|b| b.revision().to_string())
            .unwrap_or_default();
        VdmError::not_found(format!("{} id {} does not exist at {}", E::TABLE, self.id, at))
    }
}

impl<E: Versioned> Clone for VersionedObject<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            id: self.id,
            identity: self.identity.clone(),
            bound: self.bound.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Versioned> PartialEq for VersionedObject<E> {
    /// Views are equal when they show the same identity, whatever the
    /// binding.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E: Versioned> fmt::Debug for VersionedObject<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedObject")
            .field("table", &E::TABLE)
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("bound", &self.bound)
            .finish()
    }
}

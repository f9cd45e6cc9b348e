//! Registers - revision-scoped collections of versioned objects
//!
//! A [`Register`] presents every object of one entity type, as seen from a
//! `(revision, transaction)` binding, as if it were a plain collection.
//! A [`KeyedRegister`] does the same for the links of one owner object
//! through a many-to-many link entity.

mod keyed;

pub use keyed::{KeyedRegister, Link};

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::error::{VdmError, VdmResult};
use crate::state::State;
use crate::store::Fields;
use crate::versioned::{Binding, Context, Key, Versioned, VersionedObject};

/// A revision-scoped facade over one versioned entity type.
pub struct Register<E: Versioned> {
    ctx: Context,
    binding: Binding,
    _entity: PhantomData<E>,
}

impl<E: Versioned> Register<E> {
    pub fn new(ctx: Context, binding: Binding) -> Self {
        Self {
            ctx,
            binding,
            _entity: PhantomData,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Creates a new object in the bound transaction.
    ///
    /// Identity fields go on the new identity record; versioned fields are
    /// written through the working copy, which is created even when no
    /// versioned field is given.
    ///
    /// # Errors
    ///
    /// - `NoTransaction` if the binding has no transaction
    /// - `InvalidState` if the transaction has been committed
    /// - `UnknownField` for a field `E` declares neither way
    pub fn create<I, K, V>(&self, fields: I) -> VdmResult<VersionedObject<E>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.require_open_transaction()?;

        let mut identity = Fields::new();
        let mut versioned = Fields::new();
        for (name, value) in fields {
            let name = name.into();
            if E::IDENTITY_FIELDS.contains(&name.as_str()) {
                identity.insert(name, value.into());
            } else {
                E::check_field(&name)?;
                versioned.insert(name, value.into());
            }
        }

        self.insert(identity, versioned)
    }

    /// Fails unless the binding writes through a transaction that is still
    /// open in the store.
    pub(crate) fn require_open_transaction(&self) -> VdmResult<()> {
        let txn = self
            .binding
            .transaction()
            .ok_or_else(|| VdmError::NoTransaction(format!("new {}", E::TABLE)))?;
        txn.require_open(self.ctx.store(), "create objects in")
    }

    /// Inserts an identity record and writes its first snapshot.
    pub(crate) fn insert(&self, identity: Fields, versioned: Fields) -> VdmResult<VersionedObject<E>> {
        let id = self.ctx.store().insert(E::TABLE, identity)?;
        let mut object = VersionedObject::load_bound(self.ctx.clone(), id, &self.binding)?;
        object.ensure_working_copy()?;
        for (name, value) in versioned {
            object.set(&name, value)?;
        }
        Ok(object)
    }

    /// Looks an object up by identity or natural key.
    ///
    /// Soft-deleted objects are returned: they still exist at the binding.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no identity matches, or it has no visible snapshot
    /// - `AmbiguousKey` if a natural key matches several identities
    pub fn get(&self, key: impl Into<Key>) -> VdmResult<VersionedObject<E>> {
        let key = key.into();
        let object = match &key {
            Key::Id(id) => match VersionedObject::load_bound(self.ctx.clone(), *id, &self.binding)
            {
                Err(VdmError::NotFound(_)) => return Err(self.not_found(&key)),
                other => other?,
            },
            Key::Natural(value) => self.get_by_natural_key(&key, value)?,
        };

        if object.exists() {
            Ok(object)
        } else {
            Err(self.not_found(&key))
        }
    }

    /// Identities written by other transactions are bound too, so only the
    /// ones visible here count towards ambiguity.
    fn get_by_natural_key(&self, key: &Key, value: &Value) -> VdmResult<VersionedObject<E>> {
        let field = E::KEY.ok_or_else(|| {
            VdmError::invalid_state(format!("'{}' has no natural key", E::TABLE))
        })?;

        let mut visible = Vec::new();
        for record in self.ctx.store().find_by(E::TABLE, field, value)? {
            let mut object = VersionedObject::from_record(self.ctx.clone(), record);
            object.bind(&self.binding)?;
            if object.exists() {
                visible.push(object);
            }
        }

        match visible.len() {
            0 => Err(self.not_found(key)),
            1 => Ok(visible.remove(0)),
            count => Err(VdmError::AmbiguousKey {
                table: E::TABLE,
                key: value.to_string(),
                count,
            }),
        }
    }

    /// Every object that exists at the binding and is in `state`.
    ///
    /// Scans all identities the type ever had, so cost grows with history.
    pub fn list(&self, state: State) -> VdmResult<Vec<VersionedObject<E>>> {
        let records = self.ctx.store().scan(E::TABLE)?;
        self.bind_filtered(records, state)
    }

    pub(crate) fn bind_filtered(
        &self,
        records: Vec<crate::store::Record>,
        state: State,
    ) -> VdmResult<Vec<VersionedObject<E>>> {
        let mut results = Vec::new();
        for record in records {
            let mut object = VersionedObject::from_record(self.ctx.clone(), record);
            object.bind(&self.binding)?;
            if object.exists() && object.state()? == state {
                results.push(object);
            }
        }
        Ok(results)
    }

    /// Active objects.
    pub fn active(&self) -> VdmResult<Vec<VersionedObject<E>>> {
        self.list(State::Active)
    }

    /// Number of active objects.
    pub fn len(&self) -> VdmResult<usize> {
        Ok(self.active()?.len())
    }

    pub fn is_empty(&self) -> VdmResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Soft-deletes an object in the bound transaction.
    pub fn delete(&self, key: impl Into<Key>) -> VdmResult<()> {
        self.get(key)?.delete()
    }

    /// Reverses a soft delete in the bound transaction.
    pub fn restore(&self, key: impl Into<Key>) -> VdmResult<()> {
        self.get(key)?.restore()
    }

    /// Hard-deletes an object and its whole history.
    pub fn purge(&self, key: impl Into<Key>) -> VdmResult<()> {
        self.get(key)?.purge()
    }

    fn not_found(&self, key: &Key) -> VdmError {
        VdmError::not_found(format!(
            "No {} identified by {} exists at {}",
            E::TABLE,
            key,
            self.binding.revision()
        ))
    }
}

impl<E: Versioned> Clone for Register<E> {
    fn clone(&self) -> Self {
        Self::new(self.ctx.clone(), self.binding.clone())
    }
}

impl<E: Versioned> fmt::Debug for Register<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("table", &E::TABLE)
            .field("binding", &self.binding)
            .finish()
    }
}

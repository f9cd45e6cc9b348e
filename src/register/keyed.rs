//! KeyedRegister - versioned many-to-many links
//!
//! A link entity joins an owner object to another object. Each link is
//! itself versioned, so adding and removing links is recorded per
//! transaction and the link set can be read as of any revision.

use std::fmt;

use serde_json::Value;

use super::Register;
use crate::error::{VdmError, VdmResult};
use crate::state::State;
use crate::store::{Fields, RecordId};
use crate::versioned::{Binding, Context, Versioned, VersionedObject};

/// Static declaration of a link entity.
///
/// Both endpoint fields must be listed in `IDENTITY_FIELDS`: they are set
/// once on the link's identity record and never change.
pub trait Link: Versioned {
    type Owner: Versioned;
    type Other: Versioned;

    /// Identity field holding the owner's record id
    const OWNER_FIELD: &'static str;
    /// Identity field holding the other endpoint's record id
    const OTHER_FIELD: &'static str;
}

/// The links of one owner object, as seen from a binding.
pub struct KeyedRegister<L: Link> {
    register: Register<L>,
    owner: RecordId,
}

impl<L: Link> KeyedRegister<L> {
    pub fn new(ctx: Context, binding: Binding, owner: RecordId) -> Self {
        Self {
            register: Register::new(ctx, binding),
            owner,
        }
    }

    pub fn owner(&self) -> RecordId {
        self.owner
    }

    pub fn binding(&self) -> &Binding {
        self.register.binding()
    }

    /// Links the owner to `other` in the bound transaction.
    ///
    /// `fields` are the link's own versioned fields. A pair keeps a single
    /// identity for its whole history: relinking after an unlink, or
    /// linking a pair whose only record is invisible here, writes a new
    /// active snapshot of the existing link.
    ///
    /// # Errors
    ///
    /// - `NoTransaction` if the binding has no transaction
    /// - `InvalidState` if the transaction has been committed, or the pair
    ///   is already linked
    /// - `DuplicateLink` if more than one link for the pair is visible
    pub fn create<I, K, V>(
        &self,
        other: &VersionedObject<L::Other>,
        fields: I,
    ) -> VdmResult<VersionedObject<L>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.register.require_open_transaction()?;

        let mut versioned = Fields::new();
        for (name, value) in fields {
            let name = name.into();
            L::check_field(&name)?;
            versioned.insert(name, value.into());
        }

        let mut candidates = self.candidates(other.id())?;
        let existing = match self.visible(other.id(), &candidates)? {
            Some(index) => Some(candidates.swap_remove(index)),
            None if candidates.is_empty() => None,
            None => Some(candidates.swap_remove(0)),
        };

        let Some(mut link) = existing else {
            let mut identity = Fields::new();
            identity.insert(L::OWNER_FIELD.to_string(), self.owner.to_value());
            identity.insert(L::OTHER_FIELD.to_string(), other.id().to_value());
            return self.register.insert(identity, versioned);
        };

        if link.exists() && link.state()? == State::Active {
            return Err(VdmError::invalid_state(format!(
                "{} {} is already linked to {} {} through {}",
                L::Other::TABLE,
                other.id(),
                L::Owner::TABLE,
                self.owner,
                L::TABLE
            )));
        }

        link.restore()?;
        for (name, value) in versioned {
            link.set(&name, value)?;
        }
        Ok(link)
    }

    /// The link between the owner and `other`.
    ///
    /// # Errors
    ///
    /// - `NotInRegister` if no link for the pair exists at the binding
    /// - `DuplicateLink` if more than one does
    pub fn get(&self, other: &VersionedObject<L::Other>) -> VdmResult<VersionedObject<L>> {
        let mut candidates = self.candidates(other.id())?;
        match self.visible(other.id(), &candidates)? {
            Some(index) => Ok(candidates.swap_remove(index)),
            None => Err(self.not_in_register(other.id())),
        }
    }

    /// Every link record for the pair, bound, visible or not.
    fn candidates(&self, other: RecordId) -> VdmResult<Vec<VersionedObject<L>>> {
        let other = other.to_value();
        let mut candidates = Vec::new();
        for record in self.owned_records()? {
            if record.field(L::OTHER_FIELD) != &other {
                continue;
            }
            let mut link = VersionedObject::from_record(self.register.context().clone(), record);
            link.bind(self.binding())?;
            candidates.push(link);
        }
        Ok(candidates)
    }

    /// Index of the one candidate that exists at the binding.
    fn visible(
        &self,
        other: RecordId,
        candidates: &[VersionedObject<L>],
    ) -> VdmResult<Option<usize>> {
        let visible: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, link)| link.exists())
            .map(|(index, _)| index)
            .collect();

        match visible.len() {
            0 => Ok(None),
            1 => Ok(Some(visible[0])),
            count => Err(VdmError::DuplicateLink {
                table: L::TABLE,
                owner: self.owner.value(),
                other: other.value(),
                count,
            }),
        }
    }

    /// True if a link to `other` exists and is active at the binding.
    pub fn contains(&self, other: &VersionedObject<L::Other>) -> VdmResult<bool> {
        match self.get(other) {
            Ok(link) => Ok(link.state()? == State::Active),
            Err(VdmError::NotInRegister(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Links of this owner in `state`.
    pub fn list(&self, state: State) -> VdmResult<Vec<VersionedObject<L>>> {
        let records = self.owned_records()?;
        self.register.bind_filtered(records, state)
    }

    /// The objects at the other end of the links in `state`, bound like
    /// the register. Endpoints that do not exist at the binding are skipped.
    pub fn others(&self, state: State) -> VdmResult<Vec<VersionedObject<L::Other>>> {
        let mut others = Vec::new();
        for link in self.list(state)? {
            let id = link
                .identity_field(L::OTHER_FIELD)
                .and_then(RecordId::from_value)
                .ok_or_else(|| {
                    VdmError::invalid_state(format!(
                        "{} link {} has no '{}' endpoint",
                        L::TABLE,
                        link.id(),
                        L::OTHER_FIELD
                    ))
                })?;
            let other = VersionedObject::<L::Other>::load_bound(
                self.register.context().clone(),
                id,
                self.binding(),
            )?;
            if other.exists() {
                others.push(other);
            }
        }
        Ok(others)
    }

    /// Number of active links.
    pub fn len(&self) -> VdmResult<usize> {
        Ok(self.list(State::Active)?.len())
    }

    pub fn is_empty(&self) -> VdmResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn delete(&self, other: &VersionedObject<L::Other>) -> VdmResult<()> {
        self.get(other)?.delete()
    }

    pub fn restore(&self, other: &VersionedObject<L::Other>) -> VdmResult<()> {
        self.get(other)?.restore()
    }

    pub fn purge(&self, other: &VersionedObject<L::Other>) -> VdmResult<()> {
        self.get(other)?.purge()
    }

    fn owned_records(&self) -> VdmResult<Vec<crate::store::Record>> {
        Ok(self.register.context().store().find_by(
            L::TABLE,
            L::OWNER_FIELD,
            &self.owner.to_value(),
        )?)
    }

    fn not_in_register(&self, other: RecordId) -> VdmError {
        VdmError::NotInRegister(format!(
            "{} {} is not linked to {} {} through {} at {}",
            L::Other::TABLE,
            other,
            L::Owner::TABLE,
            self.owner,
            L::TABLE,
            self.binding().revision()
        ))
    }
}

impl<L: Link> Clone for KeyedRegister<L> {
    fn clone(&self) -> Self {
        Self {
            register: self.register.clone(),
            owner: self.owner,
        }
    }
}

impl<L: Link> fmt::Debug for KeyedRegister<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedRegister")
            .field("table", &L::TABLE)
            .field("owner", &self.owner)
            .field("binding", self.binding())
            .finish()
    }
}

impl<E: Versioned> VersionedObject<E> {
    /// The links owned by this object through `L`, sharing its binding.
    ///
    /// # Errors
    ///
    /// `NotBound` if the object is not bound.
    pub fn keyed<L: Link<Owner = E>>(&self) -> VdmResult<KeyedRegister<L>> {
        let binding = self.binding().ok_or(VdmError::NotBound(E::TABLE))?;
        Ok(KeyedRegister::new(
            self.context().clone(),
            binding.clone(),
            self.id(),
        ))
    }
}

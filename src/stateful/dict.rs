//! StatefulDict - a soft-delete view over a `BTreeMap`

use std::collections::BTreeMap;
use std::fmt;

use super::{Membership, StateTags, Stateful, StatefulError, StatefulResult};

/// A map view that shows only member values of a borrowed `BTreeMap`.
pub struct StatefulDict<'a, K: Ord, V: Stateful> {
    entries: &'a mut BTreeMap<K, V>,
    membership: Membership,
}

impl<'a, K: Ord, V: Stateful> StatefulDict<'a, K, V> {
    pub fn new(entries: &'a mut BTreeMap<K, V>) -> Self {
        Self::with_tags(entries, StateTags::default())
    }

    pub fn with_tags(entries: &'a mut BTreeMap<K, V>, tags: StateTags) -> Self {
        Self {
            entries,
            membership: Membership::new(tags, false),
        }
    }

    /// View of the deleted values.
    pub fn deleted(entries: &'a mut BTreeMap<K, V>) -> Self {
        Self {
            entries,
            membership: Membership::new(StateTags::default(), true),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|value| self.membership.is_member(*value))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Member entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries
            .iter()
            .filter(move |(_, value)| self.membership.is_member(*value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `value` under `key` as a member, replacing whatever the
    /// backing map held there.
    pub fn insert(&mut self, key: K, mut value: V) {
        value.set_state(self.membership.member_tag());
        self.entries.insert(key, value);
    }

    /// Takes the value under `key` out of the view; it stays in the map.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if `key` is not a member.
    pub fn remove(&mut self, key: &K) -> StatefulResult<()>
    where
        K: fmt::Debug,
    {
        let outsider = self.membership.outsider_tag().to_string();
        match self.entries.get_mut(key) {
            Some(value) if self.membership.is_member(&*value) => {
                value.set_state(&outsider);
                Ok(())
            }
            _ => Err(StatefulError::KeyNotFound(format!("{:?}", key))),
        }
    }

    /// Takes every member out of the view.
    pub fn clear(&mut self) {
        let outsider = self.membership.outsider_tag().to_string();
        for value in self.entries.values_mut() {
            if self.membership.is_member(&*value) {
                value.set_state(&outsider);
            }
        }
    }
}

impl<K: Ord + fmt::Debug, V: Stateful + fmt::Debug> fmt::Debug for StatefulDict<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

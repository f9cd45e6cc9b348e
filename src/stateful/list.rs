//! StatefulList - a soft-delete view over a `Vec`

use std::fmt;

use super::{Membership, StateTags, Stateful, StatefulError, StatefulResult};

/// A list view that shows only member elements of a borrowed `Vec`.
///
/// View index `i` is the `i`-th member in backing order.
pub struct StatefulList<'a, T: Stateful> {
    items: &'a mut Vec<T>,
    membership: Membership,
}

impl<'a, T: Stateful> StatefulList<'a, T> {
    /// View of the active elements, with the default tags.
    pub fn new(items: &'a mut Vec<T>) -> Self {
        Self::with_tags(items, StateTags::default())
    }

    pub fn with_tags(items: &'a mut Vec<T>, tags: StateTags) -> Self {
        Self {
            items,
            membership: Membership::new(tags, false),
        }
    }

    /// View of the deleted elements.
    pub fn deleted(items: &'a mut Vec<T>) -> Self {
        Self::deleted_with_tags(items, StateTags::default())
    }

    pub fn deleted_with_tags(items: &'a mut Vec<T>, tags: StateTags) -> Self {
        Self {
            items,
            membership: Membership::new(tags, true),
        }
    }

    /// Backing position of the `index`-th member.
    fn base_index(&self, index: usize) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.membership.is_member(*item))
            .nth(index)
            .map(|(position, _)| position)
    }

    fn out_of_range(&self, index: usize) -> StatefulError {
        StatefulError::IndexOutOfRange {
            index,
            len: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items
            .iter()
            .filter(move |item| self.membership.is_member(*item))
    }

    pub fn get(&self, index: usize) -> StatefulResult<&T> {
        let position = self
            .base_index(index)
            .ok_or_else(|| self.out_of_range(index))?;
        Ok(&self.items[position])
    }

    /// The last member, if any.
    pub fn last(&self) -> Option<&T> {
        self.iter().last()
    }

    /// Makes `item` the last member.
    ///
    /// An element already in the backing list but outside the view is
    /// moved to the end and brought back in; `item` itself is dropped.
    ///
    /// # Errors
    ///
    /// `DuplicateActive` if the element is already a member.
    pub fn append(&mut self, mut item: T) -> StatefulResult<()> {
        match self.items.iter().position(|existing| existing.is_same(&item)) {
            Some(position) if self.membership.is_member(&self.items[position]) => {
                Err(StatefulError::DuplicateActive)
            }
            Some(position) => {
                let mut existing = self.items.remove(position);
                existing.set_state(self.membership.member_tag());
                self.items.push(existing);
                Ok(())
            }
            None => {
                item.set_state(self.membership.member_tag());
                self.items.push(item);
                Ok(())
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> StatefulResult<()> {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    /// Takes the `index`-th member out of the view. The element stays in
    /// the backing list.
    pub fn delete(&mut self, index: usize) -> StatefulResult<()> {
        let position = self
            .base_index(index)
            .ok_or_else(|| self.out_of_range(index))?;
        let tag = self.membership.outsider_tag().to_string();
        self.items[position].set_state(&tag);
        Ok(())
    }

    /// Replaces the whole member set with `items`.
    ///
    /// Members not in `items` leave the view. Elements of `items` that are
    /// already members keep their place; the rest are appended in order.
    pub fn replace_all<I: IntoIterator<Item = T>>(&mut self, items: I) -> StatefulResult<()> {
        let replacement: Vec<T> = items.into_iter().collect();
        let outsider = self.membership.outsider_tag().to_string();

        for existing in self.items.iter_mut() {
            if self.membership.is_member(&*existing)
                && !replacement.iter().any(|item| item.is_same(&*existing))
            {
                existing.set_state(&outsider);
            }
        }

        for item in replacement {
            let already_member = self
                .items
                .iter()
                .any(|existing| existing.is_same(&item) && self.membership.is_member(existing));
            if !already_member {
                self.append(item)?;
            }
        }
        Ok(())
    }

    /// Occurrences of `item` among members.
    pub fn count(&self, item: &T) -> usize {
        self.iter().filter(|member| member.is_same(item)).count()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.count(item) > 0
    }

    /// Takes every member out of the view.
    pub fn clear(&mut self) {
        let outsider = self.membership.outsider_tag().to_string();
        for item in self.items.iter_mut() {
            if self.membership.is_member(&*item) {
                item.set_state(&outsider);
            }
        }
    }
}

impl<T: Stateful + fmt::Debug> fmt::Debug for StatefulList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

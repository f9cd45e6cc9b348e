//! Soft-delete collection views
//!
//! [`StatefulList`] and [`StatefulDict`] borrow a caller-owned `Vec` or
//! `BTreeMap` whose elements carry a state tag, and present only the
//! members: elements whose tag is the active tag (or, for a deleted view,
//! any other tag). Removing a member only changes its tag, so the backing
//! container never loses an element.
//!
//! These views know nothing about revisions and can be used on any data.

mod dict;
mod errors;
mod list;

pub use dict::StatefulDict;
pub use errors::{StatefulError, StatefulResult};
pub use list::StatefulList;

use crate::state::State;

/// An element that carries a state tag.
pub trait Stateful {
    fn state(&self) -> &str;

    fn set_state(&mut self, state: &str);

    /// True if `other` is the same element, whatever its state.
    fn is_same(&self, other: &Self) -> bool;
}

/// The tag values a view treats as active and deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTags {
    pub active: String,
    pub deleted: String,
}

impl StateTags {
    pub fn new(active: impl Into<String>, deleted: impl Into<String>) -> Self {
        Self {
            active: active.into(),
            deleted: deleted.into(),
        }
    }
}

impl Default for StateTags {
    fn default() -> Self {
        Self::new(State::Active.as_str(), State::Deleted.as_str())
    }
}

/// Membership rule shared by both views.
#[derive(Clone, Debug)]
struct Membership {
    tags: StateTags,
    inverted: bool,
}

impl Membership {
    fn new(tags: StateTags, inverted: bool) -> Self {
        Self { tags, inverted }
    }

    fn is_member<T: Stateful>(&self, item: &T) -> bool {
        (item.state() == self.tags.active) != self.inverted
    }

    /// Tag that makes an element a member.
    fn member_tag(&self) -> &str {
        if self.inverted {
            &self.tags.deleted
        } else {
            &self.tags.active
        }
    }

    /// Tag that takes an element out of the view.
    fn outsider_tag(&self) -> &str {
        if self.inverted {
            &self.tags.active
        } else {
            &self.tags.deleted
        }
    }
}

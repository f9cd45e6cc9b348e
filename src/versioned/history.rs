//! History reconstruction
//!
//! Given every snapshot of one identity, each tagged with who owns it, and
//! the upper bound of the reading binding, the visible history is:
//!
//! 1. snapshots owned by committed revisions with `number <= upper_bound`,
//!    at most one per revision number, in ascending number order
//! 2. followed by the snapshot owned by the bound transaction, if any
//!
//! Snapshots owned by any other pending revision are never visible. The
//! current snapshot is the last element; an empty history means the object
//! does not exist for this reader.
//!
//! This is a pure function: identical inputs always give identical output.

use std::collections::BTreeMap;

use super::Snapshot;
use crate::revision::RevisionNumber;

/// Who owns a snapshot, relative to the reading binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    /// A committed revision
    Committed(RevisionNumber),
    /// The transaction the reader is bound to
    BoundTransaction,
    /// Some other transaction that has not committed
    OtherPending,
}

/// Builds the visible history of one identity.
///
/// Should two snapshots claim the same revision number, the one with the
/// higher record identity wins; the store never produces this through the
/// working-copy protocol.
pub fn reconstruct(
    snapshots: Vec<(Owner, Snapshot)>,
    upper_bound: RevisionNumber,
) -> Vec<Snapshot> {
    let mut committed: BTreeMap<RevisionNumber, Snapshot> = BTreeMap::new();
    let mut working: Option<Snapshot> = None;

    for (owner, snapshot) in snapshots {
        match owner {
            Owner::Committed(number) if number <= upper_bound => {
                let keep = committed
                    .get(&number)
                    .map_or(true, |existing| existing.id() < snapshot.id());
                if keep {
                    committed.insert(number, snapshot);
                }
            }
            Owner::Committed(_) | Owner::OtherPending => {}
            Owner::BoundTransaction => {
                let keep = working
                    .as_ref()
                    .map_or(true, |existing| existing.id() < snapshot.id());
                if keep {
                    working = Some(snapshot);
                }
            }
        }
    }

    committed.into_values().chain(working).collect()
}

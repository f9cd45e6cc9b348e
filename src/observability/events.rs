//! Observable lifecycle events
//!
//! Events are explicit and typed; the logged name is the uppercase string.

use std::fmt;

use super::logger::Severity;

/// Observable events in the repository lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Repository
    /// Default states and the first revision were written
    RepositoryInit,
    /// Store was cleared ahead of re-initialisation
    RepositoryRebuild,
    /// An existing repository was attached to
    RepositoryOpened,

    // Revisions
    /// A pending revision was created
    TransactionBegin,
    /// A pending revision became active
    RevisionCommitted,
    /// Commit was attempted on a non-pending revision
    CommitRejected,

    // Objects
    /// All snapshots of an identity were hard-deleted
    ObjectPurged,

    // Store
    /// A file store image was loaded
    StoreOpened,
    /// A file store image was written
    StoreFlushed,

    // Configuration
    /// Configuration file loaded and validated
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RepositoryInit => "REPOSITORY_INIT",
            Event::RepositoryRebuild => "REPOSITORY_REBUILD",
            Event::RepositoryOpened => "REPOSITORY_OPENED",
            Event::TransactionBegin => "TRANSACTION_BEGIN",
            Event::RevisionCommitted => "REVISION_COMMITTED",
            Event::CommitRejected => "COMMIT_REJECTED",
            Event::ObjectPurged => "OBJECT_PURGED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreFlushed => "STORE_FLUSHED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CommitRejected | Event::RepositoryRebuild | Event::ObjectPurged => {
                Severity::Warn
            }
            Event::StoreFlushed | Event::StoreOpened => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

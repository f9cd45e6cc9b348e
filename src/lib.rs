//! vdm - versioned domain model
//!
//! Git-like history for domain objects over a generic object store: every
//! change is a snapshot owned by a revision, objects can be read as of any
//! committed revision, and deletion is a tracked state change.

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod register;
pub mod repository;
pub mod revision;
pub mod state;
pub mod stateful;
pub mod store;
pub mod versioned;

pub use error::{VdmError, VdmResult};
pub use register::{KeyedRegister, Link, Register};
pub use repository::{DomainModel, Repository};
pub use revision::{Revision, RevisionNumber};
pub use state::State;
pub use versioned::{Binding, Context, Key, Versioned, VersionedObject};

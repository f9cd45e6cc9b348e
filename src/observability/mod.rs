//! Observability for the versioning core
//!
//! Structured JSON logging of repository lifecycle events. Logging is
//! read-only: it never changes the outcome of the operation being logged.
//!
//! ```ignore
//! use vdm::observability::{Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Warn);
//! Logger::event(Event::RevisionCommitted, &[("number", "2")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

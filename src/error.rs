//! Versioning error types

use thiserror::Error;

use crate::store::StoreError;

/// Result type for versioning operations
pub type VdmResult<T> = Result<T, VdmError>;

/// Errors raised by revisions, versioned objects, registers and the
/// repository.
#[derive(Debug, Error)]
pub enum VdmError {
    /// Operation needs a revision or transaction in another state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Versioned operation on an object that was never bound
    #[error("No revision is bound to this {0}, versioned operations are unavailable")]
    NotBound(&'static str),

    /// Mutation outside of a transaction
    #[error("Unable to modify {0} outside of a transaction")]
    NoTransaction(String),

    /// Nothing visible for the key at the bound revision
    #[error("Not found: {0}")]
    NotFound(String),

    /// No link between the register owner and the given object
    #[error("{0} not in this register")]
    NotInRegister(String),

    /// No revision to base a transaction on
    #[error("No revision history: {0}")]
    NoHistory(String),

    /// Field not declared by the entity type
    #[error("Entity '{table}' has no field '{field}'")]
    UnknownField { table: &'static str, field: String },

    /// Natural key matched more than one identity
    #[error("Key {key} matches {count} '{table}' objects")]
    AmbiguousKey {
        table: &'static str,
        key: String,
        count: usize,
    },

    /// More than one link record joins the same pair
    #[error("{count} '{table}' links join owner {owner} and {other}")]
    DuplicateLink {
        table: &'static str,
        owner: u64,
        other: u64,
        count: usize,
    },

    /// Field value could not be converted to or from its typed form
    #[error("Field '{field}' conversion failed: {source}")]
    Serialization {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VdmError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn no_history(msg: impl Into<String>) -> Self {
        Self::NoHistory(msg.into())
    }

    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            VdmError::InvalidState(_) => "VDM_INVALID_STATE",
            VdmError::NotBound(_) => "VDM_NOT_BOUND",
            VdmError::NoTransaction(_) => "VDM_NO_TRANSACTION",
            VdmError::NotFound(_) => "VDM_NOT_FOUND",
            VdmError::NotInRegister(_) => "VDM_NOT_IN_REGISTER",
            VdmError::NoHistory(_) => "VDM_NO_HISTORY",
            VdmError::UnknownField { .. } => "VDM_UNKNOWN_FIELD",
            VdmError::AmbiguousKey { .. } => "VDM_AMBIGUOUS_KEY",
            VdmError::DuplicateLink { .. } => "VDM_DUPLICATE_LINK",
            VdmError::Serialization { .. } => "VDM_SERIALIZATION",
            VdmError::Store(e) => e.code(),
        }
    }
}

//! Store error types
//!
//! Error codes:
//! - VDM_STORE_IO_ERROR
//! - VDM_STORE_CORRUPTION
//! - VDM_STORE_SERIALIZATION
//! - VDM_STORE_UNKNOWN_RECORD
//! - VDM_STORE_INTERNAL

use std::io;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by an [`ObjectStore`](super::ObjectStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("Store corruption: {0}")]
    Corruption(String),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No record {id} in table '{table}'")]
    UnknownRecord { table: String, id: u64 },

    #[error("Store internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Error for a poisoned table lock
    pub fn poisoned() -> Self {
        Self::Internal("Lock poisoned".into())
    }

    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Io { .. } => "VDM_STORE_IO_ERROR",
            StoreError::Corruption(_) => "VDM_STORE_CORRUPTION",
            StoreError::Serialization(_) => "VDM_STORE_SERIALIZATION",
            StoreError::UnknownRecord { .. } => "VDM_STORE_UNKNOWN_RECORD",
            StoreError::Internal(_) => "VDM_STORE_INTERNAL",
        }
    }

    /// Corruption means the on-disk image can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Corruption(_))
    }
}

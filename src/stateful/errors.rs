//! Stateful collection errors

use thiserror::Error;

pub type StatefulResult<T> = Result<T, StatefulError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatefulError {
    #[error("Element is already a member of the view")]
    DuplicateActive,

    #[error("Index {index} out of range for a view of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Key {0} is not a member of the view")]
    KeyNotFound(String),
}

impl StatefulError {
    pub fn code(&self) -> &'static str {
        match self {
            StatefulError::DuplicateActive => "VDM_DUPLICATE_ACTIVE",
            StatefulError::IndexOutOfRange { .. } => "VDM_INDEX_OUT_OF_RANGE",
            StatefulError::KeyNotFound(_) => "VDM_KEY_NOT_FOUND",
        }
    }
}

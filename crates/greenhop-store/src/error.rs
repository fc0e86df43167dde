//! Store error types.

use greenhop_core::{JobId, JobStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {id} is {actual}, expected {expected}")]
    Conflict {
        id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

impl From<StoreError> for greenhop_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => greenhop_core::Error::NotFound(err.to_string()),
            StoreError::Conflict { .. } => greenhop_core::Error::Conflict(err.to_string()),
            StoreError::InvalidTransition { .. } => {
                greenhop_core::Error::InvalidTransition(err.to_string())
            }
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

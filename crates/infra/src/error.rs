//! Infrastructure and workflow errors.

use thiserror::Error;

use stockflow_core::DomainError;

/// Storage operation error.
///
/// These are infrastructure failures (backend, locking, integrity) as opposed to
/// domain errors (validation, stock, transitions).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    /// A row lock could not be acquired within the configured timeout.
    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),

    /// A uniqueness constraint was hit at write time.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// Stored data could not be mapped back into the domain.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

/// Error returned by every workflow operation.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            WorkflowError::Domain(err) => Some(err),
            WorkflowError::Store(_) => None,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

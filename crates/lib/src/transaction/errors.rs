//! Transaction specific errors
//!
//! Failures of the store while a transaction scope is open. By the time one of
//! these reaches the caller the transaction has already been closed.

use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::field::FieldId;

/// Errors that can occur while applying an edit transactionally
///
/// Never retried by this crate; retry policy belongs to the caller.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The store refused to open a transaction
    #[error("Failed to begin transaction: {source}")]
    BeginFailed { source: DatastoreError },

    /// The store rejected the field update
    #[error("Update of field {field} rejected: {source}")]
    UpdateRejected {
        field: FieldId,
        source: DatastoreError,
    },

    /// The store could not commit the transaction
    #[error("Commit rejected: {source}")]
    CommitRejected { source: DatastoreError },
}

impl TransactionError {
    /// The underlying store error
    pub fn store_error(&self) -> &DatastoreError {
        match self {
            TransactionError::BeginFailed { source }
            | TransactionError::UpdateRejected { source, .. }
            | TransactionError::CommitRejected { source } => source,
        }
    }

    /// Check if this error was caused by another open transaction or a
    /// record id conflict
    pub fn is_conflict(&self) -> bool {
        self.store_error().is_conflict()
    }

    /// Check if the record disappeared before the edit could be applied
    pub fn is_record_missing(&self) -> bool {
        self.store_error().is_record_missing()
    }

    /// Check if the store rejected the edit's bounds
    pub fn is_out_of_bounds(&self) -> bool {
        self.store_error().is_out_of_bounds()
    }

    /// Get the field if this error concerns a specific field update
    pub fn field(&self) -> Option<&FieldId> {
        match self {
            TransactionError::UpdateRejected { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<TransactionError> for crate::Error {
    fn from(err: TransactionError) -> Self {
        crate::Error::Transaction(err)
    }
}

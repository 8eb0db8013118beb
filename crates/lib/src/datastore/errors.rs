//! Datastore errors
//!
//! Errors reported by [`Datastore`](super::Datastore) implementations. Callers
//! of the transaction wrapper see these wrapped in
//! [`TransactionError`](crate::transaction::TransactionError) when they occur
//! inside a transaction, and directly otherwise.

use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    /// No schema is registered for the table
    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    /// The table's schema does not declare the field
    #[error("Field '{field}' not found in table '{table}'")]
    FieldNotFound { table: String, field: String },

    /// The record does not exist
    #[error("Record '{record}' not found in table '{table}'")]
    RecordNotFound { table: String, record: String },

    /// A record with this id already exists
    #[error("Record '{record}' already exists in table '{table}'")]
    RecordAlreadyExists { table: String, record: String },

    /// The record id was used by a record that has since been deleted
    #[error("Record '{record}' in table '{table}' was deleted and cannot be reused")]
    RecordDeleted { table: String, record: String },

    /// A text patch reaches past the end of the field's current text
    #[error("Patch at {index} out of bounds for field '{field}' of length {len}")]
    PatchOutOfBounds {
        field: String,
        index: usize,
        len: usize,
    },

    /// A transactional operation was attempted with no transaction open
    #[error("No transaction in progress")]
    NoTransaction,

    /// A transaction was begun while another one is still open
    #[error("A transaction is already in progress")]
    TransactionInProgress,
}

impl DatastoreError {
    /// Check if this error indicates a table, field, or record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatastoreError::TableNotFound { .. }
                | DatastoreError::FieldNotFound { .. }
                | DatastoreError::RecordNotFound { .. }
        )
    }

    /// Check if this error indicates the record is gone or was never there
    pub fn is_record_missing(&self) -> bool {
        matches!(
            self,
            DatastoreError::RecordNotFound { .. } | DatastoreError::RecordDeleted { .. }
        )
    }

    /// Check if this error indicates a conflict with existing state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DatastoreError::RecordAlreadyExists { .. }
                | DatastoreError::RecordDeleted { .. }
                | DatastoreError::TransactionInProgress
        )
    }

    /// Check if this error concerns the transaction state rather than data
    pub fn is_transaction_state_error(&self) -> bool {
        matches!(
            self,
            DatastoreError::NoTransaction | DatastoreError::TransactionInProgress
        )
    }

    /// Check if this error is a patch bounds violation
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, DatastoreError::PatchOutOfBounds { .. })
    }

    /// Get the table name if this error concerns a specific table
    pub fn table(&self) -> Option<&str> {
        match self {
            DatastoreError::TableNotFound { table }
            | DatastoreError::FieldNotFound { table, .. }
            | DatastoreError::RecordNotFound { table, .. }
            | DatastoreError::RecordAlreadyExists { table, .. }
            | DatastoreError::RecordDeleted { table, .. } => Some(table),
            _ => None,
        }
    }
}

impl From<DatastoreError> for crate::Error {
    fn from(err: DatastoreError) -> Self {
        crate::Error::Datastore(err)
    }
}

//!
//! fieldtext: observable, transactional text fields.
//!
//! A text field lives in a record owned by a [`Datastore`](datastore::Datastore).
//! This crate edits it one transaction at a time and tells subscribers exactly
//! what each commit changed.
//!
//! ## Core Concepts
//!
//! * **Datastores (`datastore::Datastore`)**: Record storage with store-wide transactions and per-field commit notifications. `datastore::InMemory` is the bundled implementation.
//! * **Field accessors (`field::FieldAccessor`)**: Uncached reads of one field, identified by a `field::FieldId` of (table, record, field).
//! * **Transactions (`transaction`)**: Each edit becomes exactly one `text::FieldPatch` inside a `transaction::TransactionScope`, which always ends the store transaction.
//! * **Translation (`translate`)**: Raw per-commit diffs (`text::TextChange`) become ordered `text::ChangeEvent`s, removals before insertions.
//! * **Observable strings (`observable::ObservableString`)**: The composed value: `text`, `insert`, `remove`, `clear`, and a `changed` signal (`signal::Signal`).

pub mod datastore;
pub mod field;
pub mod observable;
pub mod signal;
pub mod text;
pub mod transaction;
pub mod translate;

pub use field::FieldId;
pub use observable::{ObservableState, ObservableString};
pub use text::{ChangeEvent, ChangeKind, EditRequest};

/// Result type used throughout the fieldtext library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the fieldtext library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured text errors from the text module
    #[error(transparent)]
    Text(text::TextError),

    /// Structured datastore errors from the datastore module
    #[error(transparent)]
    Datastore(datastore::DatastoreError),

    /// Structured transaction errors from the transaction module
    #[error(transparent)]
    Transaction(transaction::TransactionError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Text(_) => "text",
            Error::Datastore(_) => "datastore",
            Error::Transaction(_) => "transaction",
        }
    }

    /// Check if this error indicates a table, field, or record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Text(text_err) => text_err.is_absent_record(),
            Error::Datastore(store_err) => store_err.is_not_found(),
            Error::Transaction(txn_err) => txn_err.store_error().is_not_found(),
        }
    }

    /// Check if this error indicates the value's record does not exist.
    pub fn is_absent_record(&self) -> bool {
        match self {
            Error::Text(text_err) => text_err.is_absent_record(),
            _ => false,
        }
    }

    /// Check if this error is a caller-supplied range problem.
    pub fn is_range_error(&self) -> bool {
        match self {
            Error::Text(text_err) => text_err.is_range_error(),
            _ => false,
        }
    }

    /// Check if the store rejected or could not complete a transaction.
    pub fn is_transaction_error(&self) -> bool {
        matches!(self, Error::Transaction(_))
    }

    /// Check if this error indicates a conflict with concurrent or existing state.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Datastore(store_err) => store_err.is_conflict(),
            Error::Transaction(txn_err) => txn_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is datastore-related.
    pub fn is_datastore_error(&self) -> bool {
        matches!(self, Error::Datastore(_))
    }
}

//! Record datastores.
//!
//! A [`Datastore`] owns records made of named text fields, applies
//! [`FieldPatch`]es inside store-wide transactions, and tells per-field
//! observers what each commit changed. Observable values are written against
//! this trait only; [`InMemory`] is the implementation shipped with the crate.

use std::fmt;
use std::sync::Arc;

use crate::field::FieldId;
use crate::text::{FieldPatch, TextChange};

mod errors;
mod in_memory;

pub use errors::DatastoreError;
pub use in_memory::InMemory;

/// Handle returned by [`Datastore::observe`], used to stop observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Everything one commit did to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: FieldId,
    /// Store version produced by the commit
    pub version: u64,
    /// Raw diff operations, in the order the store applied them
    pub changes: Vec<TextChange>,
}

/// Notification delivered to a field observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A commit modified the observed field
    Changed(FieldChange),
    /// The record owning the observed field was deleted
    RecordDeleted(FieldId),
}

/// Callback invoked for every [`StoreEvent`] on an observed field.
pub type FieldObserver = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Store contract consumed by field accessors, the transaction wrapper, and
/// observable values.
///
/// Implementations must:
/// - deliver [`StoreEvent::Changed`] only after the commit it describes, only
///   to observers of the fields it touched, and in commit order;
/// - close the open transaction in [`end_transaction`](Self::end_transaction)
///   even when the commit fails.
pub trait Datastore: Send + Sync {
    /// Current text of a field, or `None` if its record does not exist.
    ///
    /// Inside an open transaction this includes the transaction's staged edits.
    fn get_text(&self, field: &FieldId) -> Result<Option<String>, DatastoreError>;

    /// Opens a transaction.
    fn begin_transaction(&self) -> Result<(), DatastoreError>;

    /// Commits the open transaction and closes it.
    fn end_transaction(&self) -> Result<(), DatastoreError>;

    /// Discards the open transaction's staged edits and closes it. Does
    /// nothing if no transaction is open.
    fn abort_transaction(&self);

    /// Applies a patch to a text field within the open transaction.
    fn update_text(&self, field: &FieldId, patch: &FieldPatch) -> Result<(), DatastoreError>;

    /// Registers an observer for one field.
    fn observe(&self, field: &FieldId, observer: FieldObserver) -> ObserverId;

    /// Removes an observer. Returns false if it was not registered.
    fn unobserve(&self, id: ObserverId) -> bool;
}

/// Declares a table and its text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    table: String,
    fields: Vec<String>,
}

impl Schema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_text_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

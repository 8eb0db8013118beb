//! Field identities and read access to text fields.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::datastore::Datastore;
use crate::text::char_len;

/// Identifies one field of one record: `(table, record, field)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    table: String,
    record: String,
    field: String,
}

impl FieldId {
    pub fn new(
        table: impl Into<String>,
        record: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            record: record.into(),
            field: field.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.table, self.record, self.field)
    }
}

/// Resolves the current text of one field.
///
/// Holds no copy of the text: every call goes back to the store, so a read
/// always reflects the latest committed state (or the open transaction's
/// staged state, when called inside one).
pub struct FieldAccessor<S: Datastore + ?Sized> {
    store: Arc<S>,
    field: FieldId,
}

impl<S: Datastore + ?Sized> FieldAccessor<S> {
    pub fn new(store: Arc<S>, field: FieldId) -> Self {
        Self { store, field }
    }

    pub fn field(&self) -> &FieldId {
        &self.field
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current text, or `None` if the record does not exist.
    ///
    /// # Errors
    /// Fails if the table or field is unknown.
    pub fn read(&self) -> Result<Option<String>> {
        Ok(self.store.get_text(&self.field)?)
    }

    /// Current char length, or `None` if the record does not exist.
    pub fn len(&self) -> Result<Option<usize>> {
        Ok(self.read()?.as_deref().map(char_len))
    }
}

impl<S: Datastore + ?Sized> Clone for FieldAccessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            field: self.field.clone(),
        }
    }
}

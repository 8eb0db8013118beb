//! Transactional text edits
//!
//! Every public mutation of an observable text value is applied as exactly
//! one field update inside one store transaction. [`TransactionScope`] ties
//! the store transaction to a Rust scope: committing consumes the scope, and
//! dropping it uncommitted (early return, `?`, or a panic unwinding through
//! it) rolls the transaction back. No path leaves a transaction open, and
//! subscribers never observe half of an edit.
//!
//! # Reading the length
//!
//! `Clear` needs the current length to build its patch. The length is read
//! after the transaction has been opened, so it reflects the state the patch
//! is applied to for any store that serializes transactions (as
//! [`InMemory`](crate::datastore::InMemory) does). Stores that let other
//! commits land between the read and the update must detect the conflict
//! themselves and reject the update or the commit.

pub mod errors;


pub use errors::TransactionError;
use tracing::{debug, warn};

use crate::datastore::Datastore;
use crate::field::{FieldAccessor, FieldId};
use crate::text::{EditRequest, FieldPatch, TextError, char_len};
use crate::Result;

/// An open store transaction bound to a scope.
///
/// Created by [`TransactionScope::begin`]. Call [`commit`](Self::commit) to
/// end it successfully; dropping it without committing aborts it.
pub struct TransactionScope<'a, S: Datastore + ?Sized> {
    store: &'a S,
    open: bool,
}

impl<'a, S: Datastore + ?Sized> TransactionScope<'a, S> {
    /// Opens a transaction on `store`.
    pub fn begin(store: &'a S) -> Result<Self> {
        store
            .begin_transaction()
            .map_err(|source| TransactionError::BeginFailed { source })?;
        Ok(Self { store, open: true })
    }

    /// Stages one field update.
    pub fn update(&self, field: &FieldId, patch: &FieldPatch) -> Result<()> {
        self.store
            .update_text(field, patch)
            .map_err(|source| TransactionError::UpdateRejected {
                field: field.clone(),
                source,
            })?;
        Ok(())
    }

    /// Commits and closes the transaction.
    ///
    /// The store closes the transaction even when the commit fails, so the
    /// scope is spent either way.
    pub fn commit(mut self) -> Result<()> {
        self.open = false;
        self.store
            .end_transaction()
            .map_err(|source| TransactionError::CommitRejected { source })?;
        Ok(())
    }
}

impl<S: Datastore + ?Sized> Drop for TransactionScope<'_, S> {
    fn drop(&mut self) {
        if self.open {
            if std::thread::panicking() {
                warn!("Rolling back transaction during panic");
            } else {
                debug!("Rolling back uncommitted transaction");
            }
            self.store.abort_transaction();
        }
    }
}

/// Applies one edit to the accessor's field as a single atomic update.
///
/// # Errors
/// - [`TextError::InvalidRange`] for an inverted removal, before any
///   transaction is opened
/// - [`TextError::AbsentRecord`] if the record does not exist
/// - [`TransactionError`] if the store refuses to begin, update, or commit
pub fn apply_edit<S: Datastore + ?Sized>(
    accessor: &FieldAccessor<S>,
    edit: &EditRequest,
) -> Result<()> {
    edit.validate()?;

    let field = accessor.field();
    let scope = TransactionScope::begin(accessor.store().as_ref())?;

    let current_len = accessor.len()?.ok_or_else(|| TextError::AbsentRecord {
        field: field.clone(),
    })?;
    let patch = FieldPatch::from_edit(edit, current_len)?;

    scope.update(field, &patch)?;
    scope.commit()?;

    debug!(
        field = %field,
        index = patch.index(),
        removed = patch.remove_count(),
        inserted = char_len(patch.insert_text()),
        "Applied edit"
    );
    Ok(())
}

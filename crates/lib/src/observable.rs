//! Observable text values.
//!
//! [`ObservableString`] is a handle on one text field of one record. Reads go
//! straight to the store, every mutation is one transaction, and each commit
//! that touches the field is re-emitted on [`ObservableString::changed`] as
//! normalized [`ChangeEvent`]s.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use fieldtext::{ChangeEvent, FieldId, ObservableString};
//! use fieldtext::datastore::{InMemory, Schema};
//!
//! # fn main() -> fieldtext::Result<()> {
//! let store = Arc::new(InMemory::new([Schema::new("notes").with_text_field("body")]));
//! let record = store.create_record("notes", [("body", "hello world")])?;
//! let text = ObservableString::new(store, FieldId::new("notes", record, "body"))?;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! text.changed().connect(move |event: &ChangeEvent| sink.lock().unwrap().push(event.clone()));
//!
//! text.remove(0, 6)?;
//! text.insert(0, "goodbye ")?;
//! assert_eq!(text.text()?.as_deref(), Some("goodbye world"));
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![ChangeEvent::remove(0, "hello "), ChangeEvent::insert(0, "goodbye ")]
//! );
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::Result;
use crate::datastore::{Datastore, ObserverId, StoreEvent};
use crate::field::{FieldAccessor, FieldId};
use crate::signal::{Handler, Signal, Subscribable, SubscriptionId};
use crate::text::{ChangeEvent, EditRequest, TextError};
use crate::transaction::apply_edit;
use crate::translate::translate;

/// Whether the record behind an observable value can still be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservableState {
    /// No deletion has been seen; mutations go to the store, which reports
    /// [`AbsentRecord`](TextError::AbsentRecord) if the record is not there yet
    Live,
    /// The record was deleted. Permanent, since deleted ids are never reused.
    Detached,
}

/// State shared with the store observer.
#[derive(Default)]
struct Shared {
    changed: Signal<ChangeEvent>,
    detached: AtomicBool,
}

impl Shared {
    fn on_store_event(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Changed(change) => {
                let events = translate(&change.changes);
                trace!(
                    field = %change.field,
                    version = change.version,
                    events = events.len(),
                    "Emitting change events"
                );
                for event in &events {
                    self.changed.emit(event);
                }
            }
            StoreEvent::RecordDeleted(field) => {
                if !self.detached.swap(true, Ordering::SeqCst) {
                    debug!(field = %field, "Record deleted, text value detached");
                }
            }
        }
    }
}

/// A text field whose edits are transactional and observable.
pub struct ObservableString<S: Datastore + ?Sized> {
    accessor: FieldAccessor<S>,
    shared: Arc<Shared>,
    observer: ObserverId,
}

impl<S: Datastore + ?Sized> ObservableString<S> {
    /// Binds a value to `field` and starts forwarding its store notifications.
    ///
    /// The record does not have to exist yet; edits work once it does.
    ///
    /// # Errors
    /// Fails if the table or field is unknown to the store.
    pub fn new(store: Arc<S>, field: FieldId) -> Result<Self> {
        let accessor = FieldAccessor::new(store, field);
        let shared = Arc::new(Shared::default());

        // Observe before probing the record so a deletion in between is not missed.
        let weak = Arc::downgrade(&shared);
        let observer = accessor.store().observe(
            accessor.field(),
            Arc::new(move |event: &StoreEvent| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_store_event(event);
                }
            }),
        );

        let exists = match accessor.read() {
            Ok(text) => text.is_some(),
            Err(err) => {
                accessor.store().unobserve(observer);
                return Err(err);
            }
        };
        debug!(field = %accessor.field(), exists, "Created observable string");

        Ok(Self {
            accessor,
            shared,
            observer,
        })
    }

    pub fn field(&self) -> &FieldId {
        self.accessor.field()
    }

    pub fn state(&self) -> ObservableState {
        if self.shared.detached.load(Ordering::SeqCst) {
            ObservableState::Detached
        } else {
            ObservableState::Live
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == ObservableState::Live
    }

    /// The current text, or `None` if the record does not exist.
    pub fn text(&self) -> Result<Option<String>> {
        self.accessor.read()
    }

    /// Inserts `text` before the char at `index`.
    ///
    /// An empty `text` still runs a transaction; the store decides whether it
    /// changes anything.
    pub fn insert(&self, index: usize, text: impl Into<String>) -> Result<()> {
        self.apply(EditRequest::insert(index, text))
    }

    /// Removes the chars in `start..end`.
    ///
    /// `start > end` fails before any transaction is opened. Bounds against the
    /// current text are checked by the store.
    pub fn remove(&self, start: usize, end: usize) -> Result<()> {
        self.apply(EditRequest::remove(start, end)?)
    }

    /// Removes all text. Does nothing if the record does not exist.
    pub fn clear(&self) -> Result<()> {
        if self.text()?.is_none() {
            return Ok(());
        }
        self.apply(EditRequest::Clear)
    }

    /// Applies any edit request.
    pub fn apply(&self, edit: EditRequest) -> Result<()> {
        edit.validate()?;
        if !self.is_live() {
            return Err(TextError::AbsentRecord {
                field: self.field().clone(),
            }
            .into());
        }
        apply_edit(&self.accessor, &edit)
    }

    /// Signal emitting one [`ChangeEvent`] per normalized edit, in commit order.
    pub fn changed(&self) -> &Signal<ChangeEvent> {
        &self.shared.changed
    }
}

impl<S: Datastore + ?Sized> Subscribable<ChangeEvent> for ObservableString<S> {
    fn subscribe(&self, handler: Handler<ChangeEvent>) -> SubscriptionId {
        self.shared.changed.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.changed.unsubscribe(id)
    }
}

impl<S: Datastore + ?Sized> Drop for ObservableString<S> {
    fn drop(&mut self) {
        self.accessor.store().unobserve(self.observer);
    }
}

impl<S: Datastore + ?Sized> fmt::Debug for ObservableString<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableString")
            .field("field", self.field())
            .field("state", &self.state())
            .field("subscribers", &self.shared.changed.len())
            .finish()
    }
}

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{
    Datastore, DatastoreError, FieldChange, FieldObserver, ObserverId, Schema, StoreEvent,
};
use crate::field::FieldId;
use crate::text::{self, FieldPatch, TextChange};

/// (table, record id)
type RecordKey = (String, String);

/// Field name -> text
type Record = BTreeMap<String, String>;

type ObserverMap = HashMap<FieldId, Vec<(ObserverId, FieldObserver)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn record_key(field: &FieldId) -> RecordKey {
    (field.table().to_string(), field.record().to_string())
}

/// Staged state of the open transaction.
#[derive(Debug)]
struct Pending {
    /// Thread that opened the transaction; only it may stage work or end it
    owner: ThreadId,
    /// Copy-on-write overlay of touched records; `None` marks a deletion
    staged: HashMap<RecordKey, Option<Record>>,
    /// Raw diff operations in application order
    changes: Vec<(FieldId, TextChange)>,
    /// Records deleted by this transaction, in deletion order
    deleted: Vec<RecordKey>,
}

impl Pending {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            staged: HashMap::new(),
            changes: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn is_owned(&self) -> bool {
        self.owner == thread::current().id()
    }
}

#[derive(Debug, Default)]
struct State {
    schemas: HashMap<String, Schema>,
    records: HashMap<RecordKey, Record>,
    /// Ids of deleted records, which may never be reused
    tombstones: HashSet<RecordKey>,
    version: u64,
    pending: Option<Pending>,
}

impl State {
    fn schema(&self, table: &str) -> Result<&Schema, DatastoreError> {
        self.schemas
            .get(table)
            .ok_or_else(|| DatastoreError::TableNotFound {
                table: table.to_string(),
            })
    }

    fn check_field(&self, field: &FieldId) -> Result<(), DatastoreError> {
        if self.schema(field.table())?.has_field(field.field()) {
            Ok(())
        } else {
            Err(DatastoreError::FieldNotFound {
                table: field.table().to_string(),
                field: field.field().to_string(),
            })
        }
    }

    /// The open transaction, if the calling thread owns it.
    fn own_pending(&self) -> Option<&Pending> {
        self.pending.as_ref().filter(|pending| pending.is_owned())
    }

    /// The record as seen by the calling thread: through the staged overlay
    /// if it owns the open transaction, committed state otherwise.
    fn record(&self, key: &RecordKey) -> Option<&Record> {
        if let Some(pending) = self.own_pending()
            && let Some(staged) = pending.staged.get(key)
        {
            return staged.as_ref();
        }
        self.records.get(key)
    }

    fn is_deleted(&self, key: &RecordKey) -> bool {
        self.tombstones.contains(key)
            || self
                .own_pending()
                .is_some_and(|pending| matches!(pending.staged.get(key), Some(None)))
    }

    fn missing(&self, key: &RecordKey) -> DatastoreError {
        let (table, record) = key.clone();
        if self.is_deleted(key) {
            DatastoreError::RecordDeleted { table, record }
        } else {
            DatastoreError::RecordNotFound { table, record }
        }
    }

    /// The open transaction. Fails if none is open or another thread owns it.
    fn pending_mut(&mut self) -> Result<&mut Pending, DatastoreError> {
        match self.pending.as_mut() {
            Some(pending) if pending.is_owned() => Ok(pending),
            Some(_) => Err(DatastoreError::TransactionInProgress),
            None => Err(DatastoreError::NoTransaction),
        }
    }
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<(FieldId, StoreEvent)>,
    draining: bool,
}

/// Releases the outbox if an observer panics mid-delivery. Events still
/// queued at that point are dropped rather than delivered with a later,
/// unrelated commit.
struct DrainGuard<'a> {
    outbox: &'a Mutex<Outbox>,
    armed: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut outbox = lock(self.outbox);
            if !outbox.queue.is_empty() {
                warn!(
                    dropped = outbox.queue.len(),
                    "Observer panicked, dropping undelivered store events"
                );
                outbox.queue.clear();
            }
            outbox.draining = false;
        }
    }
}

/// An in-memory [`Datastore`].
///
/// Tables are declared up front with [`Schema`]s. One transaction may be open
/// at a time across the whole store; a second
/// [`begin_transaction`](Datastore::begin_transaction) fails with
/// [`DatastoreError::TransactionInProgress`].
///
/// The open transaction belongs to the thread that began it. Only that thread
/// sees its staged edits and can end it. Other threads read committed state,
/// and their writes fail with [`DatastoreError::TransactionInProgress`] until
/// it ends.
///
/// Record creation and deletion join the calling thread's open transaction if
/// there is one and commit on their own otherwise. Creating a record does not emit text
/// changes; its initial field values are its starting state.
///
/// Commit notifications go through a FIFO outbox. They are queued while the
/// store state is still locked and delivered after it is released, so an
/// observer may edit the store from inside its callback: the resulting commit
/// is queued behind the notification being delivered.
pub struct InMemory {
    state: Mutex<State>,
    observers: RwLock<ObserverMap>,
    next_observer: AtomicU64,
    outbox: Mutex<Outbox>,
}

impl std::fmt::Debug for InMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("InMemory")
            .field("tables", &state.schemas.len())
            .field("records", &state.records.len())
            .field("version", &state.version)
            .field("in_transaction", &state.pending.is_some())
            .field(
                "observers",
                &format!("<{} observed fields>", read(&self.observers).len()),
            )
            .finish()
    }
}

impl Default for InMemory {
    fn default() -> Self {
        Self::new([])
    }
}

impl InMemory {
    pub fn new(schemas: impl IntoIterator<Item = Schema>) -> Self {
        let schemas = schemas
            .into_iter()
            .map(|schema| (schema.table().to_string(), schema))
            .collect();
        Self {
            state: Mutex::new(State {
                schemas,
                ..State::default()
            }),
            observers: RwLock::new(HashMap::new()),
            next_observer: AtomicU64::new(0),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Number of commits so far.
    pub fn version(&self) -> u64 {
        lock(&self.state).version
    }

    pub fn in_transaction(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Creates a record with a generated UUIDv4 id and returns the id.
    ///
    /// Fields not listed in `fields` start out empty.
    pub fn create_record<I, K, V>(&self, table: &str, fields: I) -> Result<String, DatastoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let record = Uuid::new_v4().to_string();
        self.create_record_with_id(table, &record, fields)?;
        Ok(record)
    }

    /// Creates a record with a caller-chosen id.
    ///
    /// # Errors
    /// Fails if the id is in use, or was used by a deleted record.
    pub fn create_record_with_id<I, K, V>(
        &self,
        table: &str,
        record: &str,
        fields: I,
    ) -> Result<(), DatastoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields: Vec<(String, String)> = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();

        self.stage_or_commit(|state| {
            let schema = state.schema(table)?;
            let mut values: Record = schema
                .fields()
                .iter()
                .map(|field| (field.clone(), String::new()))
                .collect();
            for (name, value) in fields {
                if !schema.has_field(&name) {
                    return Err(DatastoreError::FieldNotFound {
                        table: table.to_string(),
                        field: name,
                    });
                }
                values.insert(name, value);
            }

            let key = (table.to_string(), record.to_string());
            if state.is_deleted(&key) {
                return Err(state.missing(&key));
            }
            if state.record(&key).is_some() {
                return Err(DatastoreError::RecordAlreadyExists {
                    table: table.to_string(),
                    record: record.to_string(),
                });
            }

            state.pending_mut()?.staged.insert(key, Some(values));
            debug!(table, record, "Created record");
            Ok(())
        })
    }

    /// Deletes a record. Observers of its fields receive
    /// [`StoreEvent::RecordDeleted`] once the deletion commits.
    pub fn delete_record(&self, table: &str, record: &str) -> Result<(), DatastoreError> {
        self.stage_or_commit(|state| {
            state.schema(table)?;
            let key = (table.to_string(), record.to_string());
            if state.record(&key).is_none() {
                return Err(state.missing(&key));
            }

            let pending = state.pending_mut()?;
            pending.staged.insert(key.clone(), None);
            pending.deleted.push(key);
            debug!(table, record, "Deleted record");
            Ok(())
        })
    }

    pub fn record_exists(&self, table: &str, record: &str) -> Result<bool, DatastoreError> {
        let state = lock(&self.state);
        state.schema(table)?;
        Ok(state
            .record(&(table.to_string(), record.to_string()))
            .is_some())
    }

    /// Runs `op` in the open transaction, or in a transaction of its own that
    /// commits on success and rolls back on failure.
    fn stage_or_commit<T>(
        &self,
        op: impl FnOnce(&mut State) -> Result<T, DatastoreError>,
    ) -> Result<T, DatastoreError> {
        let mut state = lock(&self.state);
        match state.pending.as_ref().map(Pending::is_owned) {
            Some(true) => return op(&mut state),
            Some(false) => return Err(DatastoreError::TransactionInProgress),
            None => {}
        }

        state.pending = Some(Pending::new());
        match op(&mut state) {
            Ok(value) => {
                self.commit(state)?;
                Ok(value)
            }
            Err(err) => {
                state.pending = None;
                Err(err)
            }
        }
    }

    /// Commits the open transaction, queues its notifications, releases the
    /// state lock, then delivers.
    fn commit(&self, mut state: MutexGuard<'_, State>) -> Result<(), DatastoreError> {
        state.pending_mut()?;
        let pending = state.pending.take().ok_or(DatastoreError::NoTransaction)?;
        state.version += 1;
        let version = state.version;

        for (key, record) in pending.staged {
            match record {
                Some(record) => {
                    state.records.insert(key, record);
                }
                None => {
                    state.records.remove(&key);
                    state.tombstones.insert(key);
                }
            }
        }

        let events = collect_events(&state, version, pending.changes, &pending.deleted);
        debug!(
            version,
            events = events.len(),
            deleted = pending.deleted.len(),
            "Committed transaction"
        );

        let drain = self.enqueue(events);
        drop(state);
        if drain {
            self.drain();
        }
        Ok(())
    }

    /// Queues events. Returns true if the caller must drain the outbox.
    fn enqueue(&self, events: Vec<(FieldId, StoreEvent)>) -> bool {
        let mut outbox = lock(&self.outbox);
        outbox.queue.extend(events);
        if outbox.draining || outbox.queue.is_empty() {
            return false;
        }
        outbox.draining = true;
        true
    }

    fn drain(&self) {
        let mut guard = DrainGuard {
            outbox: &self.outbox,
            armed: true,
        };

        loop {
            let (field, event) = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.draining = false;
                        guard.armed = false;
                        return;
                    }
                }
            };

            let observers: Vec<FieldObserver> = read(&self.observers)
                .get(&field)
                .map(|list| list.iter().map(|(_, observer)| Arc::clone(observer)).collect())
                .unwrap_or_default();
            trace!(field = %field, observers = observers.len(), "Delivering store event");
            for observer in observers {
                observer(&event);
            }
        }
    }
}

/// Groups a commit's raw changes per field, in order of each field's first
/// change, followed by deletion notices for every field of deleted records.
fn collect_events(
    state: &State,
    version: u64,
    changes: Vec<(FieldId, TextChange)>,
    deleted: &[RecordKey],
) -> Vec<(FieldId, StoreEvent)> {
    let deleted_set: HashSet<&RecordKey> = deleted.iter().collect();
    let mut grouped: Vec<FieldChange> = Vec::new();

    for (field, change) in changes {
        if deleted_set.contains(&record_key(&field)) {
            continue;
        }
        match grouped.iter_mut().find(|group| group.field == field) {
            Some(group) => group.changes.push(change),
            None => grouped.push(FieldChange {
                field,
                version,
                changes: vec![change],
            }),
        }
    }

    let mut events: Vec<(FieldId, StoreEvent)> = grouped
        .into_iter()
        .map(|group| (group.field.clone(), StoreEvent::Changed(group)))
        .collect();

    for (table, record) in deleted {
        let Some(schema) = state.schemas.get(table) else {
            continue;
        };
        for name in schema.fields() {
            let field = FieldId::new(table.as_str(), record.as_str(), name.as_str());
            events.push((field.clone(), StoreEvent::RecordDeleted(field)));
        }
    }

    events
}

impl Datastore for InMemory {
    fn get_text(&self, field: &FieldId) -> Result<Option<String>, DatastoreError> {
        let state = lock(&self.state);
        state.check_field(field)?;
        Ok(state
            .record(&record_key(field))
            .map(|record| record.get(field.field()).cloned().unwrap_or_default()))
    }

    fn begin_transaction(&self) -> Result<(), DatastoreError> {
        let mut state = lock(&self.state);
        if state.pending.is_some() {
            return Err(DatastoreError::TransactionInProgress);
        }
        state.pending = Some(Pending::new());
        trace!(version = state.version, "Began transaction");
        Ok(())
    }

    fn end_transaction(&self) -> Result<(), DatastoreError> {
        self.commit(lock(&self.state))
    }

    fn abort_transaction(&self) {
        let mut state = lock(&self.state);
        if !state.pending.as_ref().is_some_and(Pending::is_owned) {
            return;
        }
        if let Some(pending) = state.pending.take() {
            debug!(
                discarded = pending.changes.len(),
                version = state.version,
                "Rolled back transaction"
            );
        }
    }

    fn update_text(&self, field: &FieldId, patch: &FieldPatch) -> Result<(), DatastoreError> {
        let mut state = lock(&self.state);
        state.pending_mut()?;
        state.check_field(field)?;

        let key = record_key(field);
        let mut record = match state.record(&key) {
            Some(record) => record.clone(),
            None => return Err(state.missing(&key)),
        };

        let current = record.entry(field.field().to_string()).or_default();
        let len = text::char_len(current);
        if patch.end() > len {
            return Err(DatastoreError::PatchOutOfBounds {
                field: field.to_string(),
                index: if patch.index() > len {
                    patch.index()
                } else {
                    patch.end()
                },
                len,
            });
        }
        let removed = text::splice(
            current,
            patch.index(),
            patch.remove_count(),
            patch.insert_text(),
        )
        .map_err(|_| DatastoreError::PatchOutOfBounds {
            field: field.to_string(),
            index: patch.index(),
            len,
        })?;

        let change = TextChange::new(patch.index(), removed, patch.insert_text());
        let pending = state.pending_mut()?;
        pending.staged.insert(key, Some(record));
        if !change.is_empty() {
            trace!(field = %field, index = change.index, "Staged text change");
            pending.changes.push((field.clone(), change));
        }
        Ok(())
    }

    fn observe(&self, field: &FieldId, observer: FieldObserver) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        write(&self.observers)
            .entry(field.clone())
            .or_default()
            .push((id, observer));
        id
    }

    fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = write(&self.observers);
        let mut removed = false;
        observers.retain(|_, list| {
            let before = list.len();
            list.retain(|(observer_id, _)| *observer_id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }
}

use std::sync::{Arc, Mutex};

use fieldtext::{
    ChangeEvent, FieldId, ObservableString,
    datastore::{InMemory, Schema},
};

pub const TABLE: &str = "notes";
pub const BODY: &str = "body";
pub const TITLE: &str = "title";

// ==========================
// CORE TEST FACTORIES
// ==========================

/// Creates a store with one `notes` table holding `title` and `body` text fields.
pub fn test_store() -> Arc<InMemory> {
    Arc::new(InMemory::new([
        Schema::new(TABLE).with_text_field(TITLE).with_text_field(BODY),
    ]))
}

/// Creates a record whose body is `text` and returns its body field id.
pub fn create_body(store: &InMemory, text: &str) -> FieldId {
    let record = store
        .create_record(TABLE, [(BODY, text)])
        .expect("Failed to create record");
    FieldId::new(TABLE, record, BODY)
}

/// Creates a store, a record with the given body, and an observable over it.
pub fn setup_value(text: &str) -> (Arc<InMemory>, ObservableString<InMemory>) {
    let store = test_store();
    let field = create_body(&store, text);
    let value =
        ObservableString::new(Arc::clone(&store), field).expect("Failed to create value");
    (store, value)
}

// ==========================
// EVENT RECORDING
// ==========================

/// Collects every event emitted by a value's `changed` signal.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn attach(value: &ObservableString<InMemory>) -> Self {
        let log = Self::default();
        let sink = Arc::clone(&log.events);
        value
            .changed()
            .connect(move |event: &ChangeEvent| sink.lock().unwrap().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns and forgets the events recorded so far.
    pub fn take(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

// ==========================
// ASSERTION HELPERS
// ==========================

pub fn assert_text(value: &ObservableString<InMemory>, expected: &str) {
    assert_eq!(
        value.text().expect("Failed to read text").as_deref(),
        Some(expected)
    );
}

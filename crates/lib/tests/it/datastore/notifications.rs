use std::sync::{Arc, Mutex};
use std::thread;

use fieldtext::{
    FieldId,
    datastore::{Datastore, FieldChange, InMemory, StoreEvent},
    text::{FieldPatch, TextChange},
};

use crate::helpers::*;

fn record_events(store: &InMemory, field: &FieldId) -> Arc<Mutex<Vec<StoreEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.observe(
        field,
        Arc::new(move |event: &StoreEvent| sink.lock().unwrap().push(event.clone())),
    );
    events
}

fn patch(store: &InMemory, field: &FieldId, index: usize, remove: usize, insert: &str) {
    store
        .update_text(field, &FieldPatch::new(index, remove, insert).unwrap())
        .expect("Failed to update");
}

#[test]
fn test_commit_reports_version_and_changes() {
    let store = test_store();
    let field = create_body(&store, "abc");
    let events = record_events(&store, &field);
    let version = store.version();

    store.begin_transaction().unwrap();
    patch(&store, &field, 3, 0, "d");
    patch(&store, &field, 0, 1, "");
    store.end_transaction().unwrap();

    assert_eq!(store.version(), version + 1);
    assert_eq!(
        *events.lock().unwrap(),
        vec![StoreEvent::Changed(FieldChange {
            field: field.clone(),
            version: version + 1,
            changes: vec![TextChange::new(3, "", "d"), TextChange::new(0, "a", "")],
        })]
    );
    assert_eq!(store.get_text(&field).unwrap().as_deref(), Some("bcd"));
}

#[test]
fn test_staged_edits_are_visible_only_inside_transaction() {
    let store = test_store();
    let field = create_body(&store, "abc");
    let events = record_events(&store, &field);

    store.begin_transaction().unwrap();
    patch(&store, &field, 0, 3, "xyz");
    assert_eq!(store.get_text(&field).unwrap().as_deref(), Some("xyz"));
    store.abort_transaction();

    assert_eq!(store.get_text(&field).unwrap().as_deref(), Some("abc"));
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_commit_touching_two_fields_notifies_each_once() {
    let store = test_store();
    let body = create_body(&store, "");
    let title = FieldId::new(TABLE, body.record(), TITLE);
    let body_events = record_events(&store, &body);
    let title_events = record_events(&store, &title);

    store.begin_transaction().unwrap();
    patch(&store, &title, 0, 0, "Title");
    patch(&store, &body, 0, 0, "Body");
    patch(&store, &title, 5, 0, "!");
    store.end_transaction().unwrap();

    let title_events = title_events.lock().unwrap();
    assert_eq!(title_events.len(), 1);
    let StoreEvent::Changed(change) = &title_events[0] else {
        panic!("Expected a change event");
    };
    assert_eq!(change.changes.len(), 2);
    assert_eq!(body_events.lock().unwrap().len(), 1);
}

#[test]
fn test_delete_notifies_every_field_of_record() {
    let store = test_store();
    let body = create_body(&store, "body");
    let title = FieldId::new(TABLE, body.record(), TITLE);
    let body_events = record_events(&store, &body);
    let title_events = record_events(&store, &title);

    store.delete_record(TABLE, body.record()).unwrap();

    assert_eq!(
        *body_events.lock().unwrap(),
        vec![StoreEvent::RecordDeleted(body.clone())]
    );
    assert_eq!(
        *title_events.lock().unwrap(),
        vec![StoreEvent::RecordDeleted(title.clone())]
    );
    assert_eq!(store.get_text(&body).unwrap(), None);
    assert!(!store.record_exists(TABLE, body.record()).unwrap());
}

#[test]
fn test_edits_to_record_deleted_in_same_commit_are_dropped() {
    let store = test_store();
    let field = create_body(&store, "abc");
    let events = record_events(&store, &field);

    store.begin_transaction().unwrap();
    patch(&store, &field, 0, 0, "x");
    store.delete_record(TABLE, field.record()).unwrap();
    let err = store
        .update_text(&field, &FieldPatch::new(0, 0, "y").unwrap())
        .unwrap_err();
    assert!(err.is_record_missing());
    store.end_transaction().unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![StoreEvent::RecordDeleted(field.clone())]
    );
}

#[test]
fn test_record_creation_emits_nothing() {
    let store = test_store();
    let field = FieldId::new(TABLE, "fixed-id", BODY);
    let events = record_events(&store, &field);

    store
        .create_record_with_id(TABLE, "fixed-id", [(BODY, "hello")])
        .unwrap();

    assert!(events.lock().unwrap().is_empty());
    assert_eq!(store.get_text(&field).unwrap().as_deref(), Some("hello"));

    let err = store
        .create_record_with_id(TABLE, "fixed-id", [(BODY, "again")])
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn test_unobserve_stops_delivery() {
    let store = test_store();
    let field = create_body(&store, "");
    let events = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&events);
    let id = store.observe(
        &field,
        Arc::new(move |_: &StoreEvent| *sink.lock().unwrap() += 1),
    );

    store.begin_transaction().unwrap();
    patch(&store, &field, 0, 0, "a");
    store.end_transaction().unwrap();

    assert!(store.unobserve(id));
    assert!(!store.unobserve(id));

    store.begin_transaction().unwrap();
    patch(&store, &field, 1, 0, "b");
    store.end_transaction().unwrap();

    assert_eq!(*events.lock().unwrap(), 1);
}

#[test]
fn test_transaction_state_errors() {
    let store = test_store();
    let field = create_body(&store, "");

    let err = store.end_transaction().unwrap_err();
    assert!(err.is_transaction_state_error());
    let err = store
        .update_text(&field, &FieldPatch::new(0, 0, "x").unwrap())
        .unwrap_err();
    assert!(err.is_transaction_state_error());

    store.begin_transaction().unwrap();
    let err = store.begin_transaction().unwrap_err();
    assert!(err.is_conflict());
    store.abort_transaction();
    store.abort_transaction();
    assert!(!store.in_transaction());
}

#[test]
fn test_other_threads_cannot_join_open_transaction() {
    let store = test_store();
    let kept = create_body(&store, "kept");
    let version = store.version();

    store.begin_transaction().unwrap();
    patch(&store, &kept, 0, 4, "staged");

    thread::scope(|scope| {
        scope.spawn(|| {
            let err = store
                .create_record(TABLE, [(BODY, "new")])
                .unwrap_err();
            assert!(err.is_conflict());

            let err = store.delete_record(TABLE, kept.record()).unwrap_err();
            assert!(err.is_transaction_state_error());

            let err = store
                .update_text(&kept, &FieldPatch::new(0, 0, "x").unwrap())
                .unwrap_err();
            assert!(err.is_conflict());
            assert!(store.end_transaction().unwrap_err().is_conflict());

            // Committed state only, and aborting is not this thread's call.
            assert_eq!(store.get_text(&kept).unwrap().as_deref(), Some("kept"));
            store.abort_transaction();
        });
    });

    assert!(store.in_transaction());
    assert_eq!(store.get_text(&kept).unwrap().as_deref(), Some("staged"));
    store.abort_transaction();

    assert_eq!(store.version(), version);
    assert!(store.record_exists(TABLE, kept.record()).unwrap());
    assert_eq!(store.get_text(&kept).unwrap().as_deref(), Some("kept"));
}

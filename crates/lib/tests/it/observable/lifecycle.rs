use std::sync::Arc;
use std::thread;

use fieldtext::{
    FieldId, ObservableState, ObservableString,
    datastore::{Datastore, InMemory},
    translate::replay,
};

use crate::helpers::*;

fn assert_detached(value: &ObservableString<InMemory>) {
    assert_eq!(value.state(), ObservableState::Detached);
    assert!(value.insert(0, "x").unwrap_err().is_absent_record());
    assert!(value.remove(0, 0).unwrap_err().is_absent_record());
    value.clear().expect("Clear on a detached value is a no-op");
    assert_eq!(value.text().unwrap(), None);
}

#[test]
fn test_value_over_missing_record_is_live() {
    let store = test_store();
    let value = ObservableString::new(Arc::clone(&store), FieldId::new(TABLE, "missing", BODY))
        .expect("Failed to create value");

    assert_eq!(value.state(), ObservableState::Live);
    assert_eq!(value.text().unwrap(), None);
    assert!(value.insert(0, "x").unwrap_err().is_absent_record());
    assert!(value.remove(0, 0).unwrap_err().is_absent_record());
    value.clear().expect("Clear on a missing record is a no-op");
    assert!(!store.in_transaction());
}

#[test]
fn test_value_created_before_its_record() {
    let store = test_store();
    let value = ObservableString::new(Arc::clone(&store), FieldId::new(TABLE, "later", BODY))
        .expect("Failed to create value");
    let log = EventLog::attach(&value);

    store
        .create_record_with_id(TABLE, "later", [(BODY, "now exists")])
        .expect("Failed to create record");
    assert!(value.is_live());
    assert_text(&value, "now exists");
    assert!(log.events().is_empty());

    value.insert(10, "!").expect("Failed to insert");
    assert_text(&value, "now exists!");
    assert_eq!(log.events(), vec![fieldtext::ChangeEvent::insert(10, "!")]);

    store.delete_record(TABLE, "later").unwrap();
    assert_detached(&value);
}

#[test]
fn test_value_over_unknown_field_fails() {
    let store = test_store();
    let field = create_body(&store, "text");
    let bogus = FieldId::new(TABLE, field.record(), "summary");

    let err = ObservableString::new(Arc::clone(&store), bogus).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_datastore_error());
}

#[test]
fn test_delete_detaches_value() {
    let (store, value) = setup_value("doomed");
    let log = EventLog::attach(&value);
    assert!(value.is_live());

    store
        .delete_record(TABLE, value.field().record())
        .expect("Failed to delete");

    assert_detached(&value);
    assert!(log.events().is_empty());
}

#[test]
fn test_deleted_record_id_is_not_reused() {
    let (store, value) = setup_value("doomed");
    let record = value.field().record().to_string();
    store.delete_record(TABLE, &record).unwrap();

    let err = store
        .create_record_with_id(TABLE, &record, [(BODY, "reborn")])
        .unwrap_err();
    assert!(err.is_record_missing());
    assert_detached(&value);
}

#[test]
fn test_delete_takes_effect_on_commit() {
    let (store, value) = setup_value("text");
    let record = value.field().record().to_string();

    store.begin_transaction().unwrap();
    store.delete_record(TABLE, &record).unwrap();
    assert!(value.is_live());
    store.abort_transaction();
    assert!(value.is_live());
    assert_text(&value, "text");

    store.begin_transaction().unwrap();
    store.delete_record(TABLE, &record).unwrap();
    store.end_transaction().unwrap();
    assert_detached(&value);
}

#[test]
fn test_handles_on_same_field_share_state() {
    let (store, value) = setup_value("shared");
    let other = ObservableString::new(Arc::clone(&store), value.field().clone()).unwrap();
    let log = EventLog::attach(&other);

    value.insert(6, "!").unwrap();
    assert_text(&other, "shared!");
    assert_eq!(log.events().len(), 1);

    drop(value);
    other.insert(0, "still ").unwrap();
    assert_text(&other, "still shared!");
}

#[test]
fn test_concurrent_writers_retry_on_conflict() {
    const WRITERS: usize = 4;
    const EDITS: usize = 25;

    let (store, mirror) = setup_value("");
    let log = EventLog::attach(&mirror);
    let field = mirror.field().clone();

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let value = ObservableString::new(Arc::clone(&store), field.clone())
                .expect("Failed to create writer");
            scope.spawn(move || {
                let letter = char::from(b'a' + writer as u8).to_string();
                for _ in 0..EDITS {
                    loop {
                        match value.insert(0, letter.as_str()) {
                            Ok(()) => break,
                            Err(err) if err.is_conflict() => thread::yield_now(),
                            Err(err) => panic!("Unexpected error: {err}"),
                        }
                    }
                }
            });
        }
    });

    let text = mirror.text().unwrap().unwrap();
    assert_eq!(text.chars().count(), WRITERS * EDITS);
    assert_eq!(replay("", &log.events()).unwrap(), text);
    assert!(!store.in_transaction());
}

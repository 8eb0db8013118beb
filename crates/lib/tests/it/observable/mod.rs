//! ObservableString integration tests
//!
//! Organized by concern:
//! - edits: insert/remove/clear semantics, error handling, and atomicity
//! - events: change event contents, ordering, and filtering
//! - lifecycle: Live/Detached transitions and concurrent writers

mod lifecycle;

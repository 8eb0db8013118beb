//! Datastore integration tests
//!
//! - notifications: what observers receive for commits and deletions
//! - trait_object: observable values over `dyn Datastore`

mod notifications;

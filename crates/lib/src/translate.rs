//! Translation of raw store diffs into change events.
//!
//! A commit's raw diff is a list of [`TextChange`]s in the order the store
//! applied them, each possibly removing and inserting at one index. Each
//! becomes zero, one, or two [`ChangeEvent`]s: the removal first, then the
//! insertion. Replaying the events in order against the pre-commit text
//! reproduces the post-commit text.

use tracing::trace;

use crate::text::{ChangeEvent, TextChange, TextError};

/// Translates one commit's raw diff operations, in order.
///
/// Operations with both spans empty produce nothing.
pub fn translate(changes: &[TextChange]) -> Vec<ChangeEvent> {
    let mut events = Vec::with_capacity(changes.len());
    for change in changes {
        if !change.removed.is_empty() {
            events.push(ChangeEvent::remove(change.index, change.removed.clone()));
        }
        if !change.inserted.is_empty() {
            events.push(ChangeEvent::insert(change.index, change.inserted.clone()));
        }
        if change.is_empty() {
            trace!(index = change.index, "Skipping empty text change");
        }
    }
    events
}

/// Replays `events` against `base`.
///
/// # Errors
/// [`TextError`] if an event does not fit the text it is applied to.
pub fn replay<'a>(
    base: &str,
    events: impl IntoIterator<Item = &'a ChangeEvent>,
) -> Result<String, TextError> {
    let mut text = base.to_string();
    for event in events {
        event.apply_to(&mut text)?;
    }
    Ok(text)
}

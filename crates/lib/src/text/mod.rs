//! Text edit data model.
//!
//! All positions in this module are counted in Unicode scalar values (`char`s),
//! never bytes, so that an index means the same thing to the store, to the
//! observable value, and to subscribers mirroring the text from events.

use serde::{Deserialize, Serialize};

pub mod errors;

pub use errors::TextError;

/// Number of chars in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the char at `index`, or `text.len()` when `index` is the
/// char length. `None` past the end.
pub(crate) fn byte_offset(text: &str, index: usize) -> Option<usize> {
    text.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .nth(index)
}

/// Replaces `remove_count` chars at `index` with `insert`, returning the
/// removed span. `text` is untouched on error.
pub(crate) fn splice(
    text: &mut String,
    index: usize,
    remove_count: usize,
    insert: &str,
) -> Result<String, TextError> {
    let len = char_len(text);
    let end = index
        .checked_add(remove_count)
        .ok_or(TextError::InvalidRange {
            start: index,
            end: usize::MAX,
        })?;
    if index > len {
        return Err(TextError::OutOfBounds { index, len });
    }
    if end > len {
        return Err(TextError::OutOfBounds { index: end, len });
    }

    let start_byte = byte_offset(text, index).ok_or(TextError::OutOfBounds { index, len })?;
    let end_byte = byte_offset(text, end).ok_or(TextError::OutOfBounds { index: end, len })?;
    let removed = text[start_byte..end_byte].to_string();
    text.replace_range(start_byte..end_byte, insert);
    Ok(removed)
}

/// One logical edit against a text value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EditRequest {
    /// Insert `text` before the char at `index`
    Insert { index: usize, text: String },
    /// Remove the chars in `start..end`
    Remove { start: usize, end: usize },
    /// Remove everything
    Clear,
}

impl EditRequest {
    pub fn insert(index: usize, text: impl Into<String>) -> Self {
        EditRequest::Insert {
            index,
            text: text.into(),
        }
    }

    /// Creates a removal of `start..end`.
    ///
    /// # Errors
    /// [`TextError::InvalidRange`] if `start > end`.
    pub fn remove(start: usize, end: usize) -> Result<Self, TextError> {
        let edit = EditRequest::Remove { start, end };
        edit.validate()?;
        Ok(edit)
    }

    pub fn clear() -> Self {
        EditRequest::Clear
    }

    /// Checks the caller contract that does not depend on the current text.
    ///
    /// Requests built through [`EditRequest::remove`] are always valid, but
    /// deserialized ones are not.
    pub fn validate(&self) -> Result<(), TextError> {
        match self {
            EditRequest::Remove { start, end } if start > end => Err(TextError::InvalidRange {
                start: *start,
                end: *end,
            }),
            _ => Ok(()),
        }
    }
}

/// A positional update to a text field: remove `remove_count` chars at
/// `index`, then insert `insert_text` there.
///
/// This is the only update shape a [`Datastore`](crate::datastore::Datastore)
/// accepts for text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    index: usize,
    remove_count: usize,
    insert_text: String,
}

impl FieldPatch {
    /// Creates a patch.
    ///
    /// # Errors
    /// [`TextError::InvalidRange`] if `index + remove_count` overflows.
    pub fn new(
        index: usize,
        remove_count: usize,
        insert_text: impl Into<String>,
    ) -> Result<Self, TextError> {
        if index.checked_add(remove_count).is_none() {
            return Err(TextError::InvalidRange {
                start: index,
                end: usize::MAX,
            });
        }
        Ok(Self {
            index,
            remove_count,
            insert_text: insert_text.into(),
        })
    }

    /// Derives the patch for `edit` given the field's current char length.
    ///
    /// Only `Clear` uses `current_len`; bounds of the other edits are left for
    /// the store to check.
    pub fn from_edit(edit: &EditRequest, current_len: usize) -> Result<Self, TextError> {
        match edit {
            EditRequest::Insert { index, text } => Self::new(*index, 0, text.clone()),
            EditRequest::Remove { start, end } => {
                let remove_count = end.checked_sub(*start).ok_or(TextError::InvalidRange {
                    start: *start,
                    end: *end,
                })?;
                Self::new(*start, remove_count, String::new())
            }
            EditRequest::Clear => Self::new(0, current_len, String::new()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn remove_count(&self) -> usize {
        self.remove_count
    }

    pub fn insert_text(&self) -> &str {
        &self.insert_text
    }

    /// Char index one past the removed span.
    pub fn end(&self) -> usize {
        self.index.saturating_add(self.remove_count)
    }
}

/// The store's raw record of one applied patch: at `index`, `removed` was
/// taken out and `inserted` put in. Either span may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextChange {
    pub index: usize,
    pub removed: String,
    pub inserted: String,
}

impl TextChange {
    pub fn new(index: usize, removed: impl Into<String>, inserted: impl Into<String>) -> Self {
        Self {
            index,
            removed: removed.into(),
            inserted: inserted.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Remove,
}

/// A normalized, user-facing description of one edit.
///
/// For [`ChangeKind::Remove`], `end - start` is the char length of `value`.
/// For [`ChangeKind::Insert`], `start == end` and `value` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl ChangeEvent {
    pub fn insert(start: usize, value: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Insert,
            start,
            end: start,
            value: value.into(),
        }
    }

    pub fn remove(start: usize, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: ChangeKind::Remove,
            start,
            end: start + char_len(&value),
            value,
        }
    }

    /// Applies this event to a mirror of the text it was emitted for.
    ///
    /// A remove only checks its range, not that the removed chars match
    /// `value`.
    pub fn apply_to(&self, text: &mut String) -> Result<(), TextError> {
        match self.kind {
            ChangeKind::Insert => splice(text, self.start, 0, &self.value).map(|_| ()),
            ChangeKind::Remove => {
                if self.start > self.end {
                    return Err(TextError::InvalidRange {
                        start: self.start,
                        end: self.end,
                    });
                }
                splice(text, self.start, self.end - self.start, "").map(|_| ())
            }
        }
    }
}

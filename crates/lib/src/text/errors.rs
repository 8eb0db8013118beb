//! Text value errors
//!
//! Errors raised by the text data model and by observable text values before
//! any transaction is opened.

use thiserror::Error;

use crate::field::FieldId;

/// Errors for text edits and text values.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextError {
    /// The identity does not resolve to a record
    #[error("Record not found for field {field}")]
    AbsentRecord { field: FieldId },

    /// A range was given with its start after its end
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    /// An index lies past the end of the text it applies to
    #[error("Index {index} out of bounds for text of length {len}")]
    OutOfBounds { index: usize, len: usize },
}

impl TextError {
    /// Check if this error indicates the record is absent
    pub fn is_absent_record(&self) -> bool {
        matches!(self, TextError::AbsentRecord { .. })
    }

    /// Check if this error is a caller-supplied range problem
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            TextError::InvalidRange { .. } | TextError::OutOfBounds { .. }
        )
    }

    /// Get the field identity if this error concerns a specific field
    pub fn field(&self) -> Option<&FieldId> {
        match self {
            TextError::AbsentRecord { field } => Some(field),
            _ => None,
        }
    }
}

impl From<TextError> for crate::Error {
    fn from(err: TextError) -> Self {
        crate::Error::Text(err)
    }
}

//! Error types for changeset operations.

use crate::pool::AttribNum;
use thiserror::Error;

/// Errors that can occur while decoding, validating or combining changesets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangesetError {
    /// The changeset text or its op stream is structurally invalid.
    #[error("Malformed changeset: {0}")]
    Malformed(String),

    /// A changeset was applied to (or combined with) something of the wrong length.
    #[error("Length mismatch: expected {expected}, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// An op references an attribute number the pool does not know.
    #[error("Unknown attribute number: {0}")]
    UnknownAttribute(AttribNum),

    /// A builder consumed more characters than the document it was declared against.
    #[error("Builder consumed {consumed} chars of a {old_len}-char document")]
    BuilderOverrun { consumed: usize, old_len: usize },
}

impl ChangesetError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ChangesetError::Malformed(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ChangesetError>;

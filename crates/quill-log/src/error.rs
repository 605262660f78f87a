//! Error types for the revision log.

use crate::revision::Rev;
use crate::store::StoreError;
use quill_changeset::ChangesetError;
use thiserror::Error;

/// Errors that can occur while reading or extending a document's log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Changeset error: {0}")]
    Changeset(#[from] ChangesetError),

    #[error("Revision {rev} of document {doc} not found")]
    RevisionNotFound { doc: String, rev: Rev },

    #[error("Invalid revision range {start}..={end} (head: {head})")]
    InvalidRange { start: Rev, end: Rev, head: Rev },

    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        LogError::Store(err.into())
    }
}

pub type Result<T> = std::result::Result<T, LogError>;

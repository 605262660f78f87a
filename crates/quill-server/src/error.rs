//! Error types for the coordinator.

use crate::registry::ConnectionId;
use quill_changeset::ChangesetError;
use quill_log::{LogError, Rev};
use thiserror::Error;

/// What the coordinator does about an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-order message: logged and dropped.
    Protocol,
    /// The session broke an OT invariant: it is kicked.
    Invariant,
    /// Persistence failed: reported to the submitter, head unchanged.
    Storage,
    /// Something referenced does not exist.
    NotFound,
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad changeset: {0}")]
    BadChangeset(#[from] ChangesetError),

    #[error("Base revision {base} is outside -1..={head}")]
    InvalidBase { base: Rev, head: Rev },

    #[error("Changeset expects a document of length {expected}, found {actual}")]
    StaleChangeset { expected: usize, actual: usize },

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::Protocol(_)
            | CoordinatorError::Serialization(_)
            | CoordinatorError::Io(_) => ErrorKind::Protocol,
            CoordinatorError::BadChangeset(_)
            | CoordinatorError::InvalidBase { .. }
            | CoordinatorError::StaleChangeset { .. } => ErrorKind::Invariant,
            CoordinatorError::Log(err) => match err {
                LogError::Changeset(_) => ErrorKind::Invariant,
                LogError::Store(_) | LogError::Corrupt { .. } => ErrorKind::Storage,
                LogError::RevisionNotFound { .. } | LogError::InvalidRange { .. } => {
                    ErrorKind::NotFound
                }
            },
            CoordinatorError::UnknownConnection(_) => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;

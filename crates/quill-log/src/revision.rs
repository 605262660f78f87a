//! Stored revision records.

use chrono::{DateTime, Utc};
use quill_changeset::{AText, AttributePool, Changeset};
use serde::{Deserialize, Serialize};

/// Revision number. `-1` denotes the empty document before any revision.
pub type Rev = i64;

/// Every revision whose number is a multiple of this embeds a full snapshot.
pub const KEYFRAME_INTERVAL: Rev = 100;

/// Nearest snapshot revision at or below `rev`.
pub fn key_revision_number(rev: Rev) -> Rev {
    rev - rev.rem_euclid(KEYFRAME_INTERVAL)
}

/// One entry of the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub changeset: Changeset,
    pub meta: RevisionMeta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMeta {
    /// Submitting author, empty for server-generated revisions.
    pub author: String,
    pub timestamp: DateTime<Utc>,
    /// Document state after this revision; present on snapshot revisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atext: Option<AText>,
}

/// The `doc:<id>` record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct DocRecord {
    pub head: Rev,
    pub atext: AText,
    pub pool: AttributePool,
}

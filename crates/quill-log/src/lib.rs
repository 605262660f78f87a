//! # quill-log
//!
//! Durable, append-only revision history for Quill documents.
//!
//! Each document ([`Pad`]) owns a log of changesets stored in a
//! [`KeyValueStore`]. Every [`KEYFRAME_INTERVAL`]th revision also records a
//! full snapshot, so any historical state can be rebuilt from the nearest
//! snapshot plus fewer than [`KEYFRAME_INTERVAL`] changesets.
//!
//! ## Example
//!
//! ```rust
//! use quill_log::{MemoryStore, Pad};
//! use quill_changeset::Changeset;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut pad = Pad::load("notes", Arc::new(MemoryStore::new()), None).await.unwrap();
//! let cs = Changeset::make_splice(pad.text(), 0, 0, "Hello", &[]).unwrap();
//! let rev = pad.append_revision(cs, "a.1").await.unwrap();
//!
//! assert_eq!(rev, 0);
//! assert_eq!(pad.text(), "Hello\n");
//! # });
//! ```

pub mod error;
pub mod pad;
pub mod revision;
pub mod store;

pub use error::{LogError, Result};
pub use pad::{clean_text, Pad};
pub use revision::{key_revision_number, Rev, Revision, RevisionMeta, KEYFRAME_INTERVAL};
pub use store::{doc_key, rev_key, KeyValueStore, MemoryStore, StoreError, StoreResult};

//! # quill-server
//!
//! Session coordination for Quill documents.
//!
//! The [`Coordinator`] admits sessions (`JOIN`), rebases their edits onto
//! the document head (`EDIT`), commits them through [`quill_log`] and fans
//! the new revision out: `ACK` to the submitter, `DELTA` to everyone else.
//! Peers learn about each other through `USER_JOINED` and `USER_LEFT`.
//!
//! ## Architecture
//!
//! - [`protocol`] - wire messages
//! - [`coordinator`] - per-document pipeline: access, rebase, commit, broadcast
//! - [`registry`] - connected sessions and their outboxes
//! - [`access`] - pluggable join authorization
//! - [`repair`] - corrective revisions after edits
//! - [`listener`] - line-delimited JSON over TCP
//! - [`client`] - client-side replica with pending/buffered edits
//!
//! ## Example
//!
//! ```rust
//! use quill_server::{AllowAll, ClientReplica, Coordinator, ServerConfig};
//! use quill_log::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let coordinator = Coordinator::new(
//!     ServerConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(AllowAll::new()),
//! );
//! let (conn, mut inbox) = coordinator.connect();
//! let mut client = ClientReplica::new("notes", "token");
//!
//! coordinator.handle_message(conn, client.join_message()).await;
//! client.receive(&inbox.recv().await.unwrap()).unwrap();
//!
//! client.local_edit(0, 0, "Hello").unwrap();
//! let edit = client.flush().unwrap().unwrap();
//! coordinator.handle_message(conn, edit).await;
//! client.receive(&inbox.recv().await.unwrap()).unwrap();
//!
//! assert!(client.is_settled());
//! assert_eq!(coordinator.snapshot("notes").await.unwrap().0, "Hello\n");
//! # });
//! ```

pub mod access;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod repair;

pub use access::{AccessControl, AccessStatus, AllowAll, StaticAccess};
pub use client::ClientReplica;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use coordinator::Coordinator;
pub use error::{CoordinatorError, ErrorKind, Result};
pub use listener::{bind, serve};
pub use protocol::{ClientMessage, KickReason, RejectReason, ServerMessage, PROTOCOL_VERSION};
pub use registry::{ConnectionId, SessionInfo, SessionRegistry, SessionState};
pub use repair::{blank_line_repair, list_marker_repair, LIST_KEY};

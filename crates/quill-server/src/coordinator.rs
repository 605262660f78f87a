//! The session coordinator: admits sessions to documents, rebases and
//! commits their edits and fans committed revisions out to everyone else.

use crate::access::{AccessControl, AccessStatus};
use crate::config::ServerConfig;
use crate::error::{CoordinatorError, ErrorKind, Result};
use crate::protocol::{ClientMessage, KickReason, RejectReason, ServerMessage, PROTOCOL_VERSION};
use crate::registry::{ConnectionId, SessionRegistry, SessionState};
use crate::repair::{blank_line_repair, list_marker_repair};
use parking_lot::RwLock;
use quill_changeset::{follow, AttributePool, Changeset};
use quill_log::{KeyValueStore, Pad, Rev};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

type PadHandle = Arc<Mutex<Pad>>;

/// Coordinates all sessions of all documents.
///
/// Documents are edited in parallel; within a document the whole
/// join/edit/broadcast pipeline runs under that document's lock, so exactly
/// one edit is in flight per document and every session sees revisions in
/// order.
pub struct Coordinator {
    config: ServerConfig,
    store: Arc<dyn KeyValueStore>,
    access: Arc<dyn AccessControl>,
    registry: SessionRegistry,
    documents: RwLock<HashMap<String, PadHandle>>,
    /// Per-document load locks, so each document has one live `Pad` while
    /// loads of different documents proceed in parallel.
    loading: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Coordinator {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn KeyValueStore>,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            config,
            store,
            access,
            registry: SessionRegistry::new(),
            documents: RwLock::new(HashMap::new()),
            loading: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a new connection.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (connection, inbox) = self.registry.connect();
        debug!(%connection, "connection opened");
        (connection, inbox)
    }

    /// Drop a connection. The remaining sessions of its document are told
    /// the author left, and the document is evicted from the cache once its
    /// last session is gone.
    pub fn disconnect(&self, connection: ConnectionId) {
        let Some(info) = self.registry.disconnect(connection) else {
            return;
        };
        debug!(%connection, doc = ?info.document_id, "connection closed");

        if let Some(doc) = info.document_id {
            if let Some(author_id) = info.author_id {
                self.notify_others(&doc, connection, || ServerMessage::UserLeft {
                    author_id: author_id.clone(),
                });
            }
            self.evict_if_idle(&doc);
        }
    }

    /// Evict a document that no session is attached to. Skipped while an
    /// in-flight operation still holds the pad; that operation re-checks
    /// when it ends.
    fn evict_if_idle(&self, document_id: &str) {
        if self.registry.count_for(document_id) > 0 {
            return;
        }
        let mut documents = self.documents.write();
        if documents
            .get(document_id)
            .map_or(false, |pad| Arc::strong_count(pad) == 1)
        {
            documents.remove(document_id);
            debug!(doc = %document_id, "evicted document");
        }
    }

    /// Send a message to every session of a document except `except`.
    fn notify_others(
        &self,
        document_id: &str,
        except: ConnectionId,
        message: impl Fn() -> ServerMessage,
    ) {
        for other in self.registry.sessions_for(document_id) {
            if other.connection != except {
                self.registry.send(other.connection, message());
            }
        }
    }

    /// Whether `document_id` is currently cached.
    pub fn is_loaded(&self, document_id: &str) -> bool {
        self.documents.read().contains_key(document_id)
    }

    /// Current text and head of a document.
    pub async fn snapshot(&self, document_id: &str) -> Result<(String, Rev)> {
        let handle = self.document(document_id).await?;
        let pad = handle.lock().await;
        Ok((pad.text().to_string(), pad.head()))
    }

    /// Process one message from a connection. Errors only ever affect the
    /// sending session.
    pub async fn handle_message(&self, connection: ConnectionId, message: ClientMessage) {
        let document_id = match &message {
            ClientMessage::Join { document_id, .. } => Some(document_id.clone()),
            ClientMessage::Edit { .. } => self
                .registry
                .get(connection)
                .and_then(|session| session.document_id),
        };

        let result = match message {
            ClientMessage::Join {
                document_id,
                token,
                protocol_version,
                last_acked_revision,
            } => {
                self.handle_join(connection, &document_id, &token, protocol_version, last_acked_revision)
                    .await
            }
            ClientMessage::Edit {
                base_rev,
                changeset,
                pool,
            } => self.handle_edit(connection, base_rev, &changeset, &pool).await,
        };

        if let Err(err) = result {
            self.handle_error(connection, err);
        }
        // The last session may have left while this message held the pad.
        if let Some(doc) = document_id {
            self.evict_if_idle(&doc);
        }
    }

    fn handle_error(&self, connection: ConnectionId, err: CoordinatorError) {
        match err.kind() {
            ErrorKind::Protocol | ErrorKind::NotFound => {
                warn!(%connection, error = %err, "dropped message");
            }
            ErrorKind::Invariant => {
                warn!(%connection, error = %err, "kicking session");
                self.kick(connection, KickReason::BadChangeset);
            }
            ErrorKind::Storage => {
                error!(%connection, error = %err, "persistence failed");
                self.registry.send(
                    connection,
                    ServerMessage::Reject {
                        reason: RejectReason::PersistenceFailed,
                    },
                );
            }
        }
    }

    fn kick(&self, connection: ConnectionId, reason: KickReason) {
        self.registry.send(connection, ServerMessage::Kick { reason });
        self.disconnect(connection);
    }

    fn reject(&self, connection: ConnectionId, reason: RejectReason) {
        info!(%connection, ?reason, "join rejected");
        self.registry.send(connection, ServerMessage::Reject { reason });
        self.disconnect(connection);
    }

    /// Get the cached document or load it from the store.
    async fn document(&self, document_id: &str) -> Result<PadHandle> {
        if let Some(handle) = self.documents.read().get(document_id) {
            return Ok(handle.clone());
        }

        let lock = self
            .loading
            .lock()
            .entry(document_id.to_string())
            .or_default()
            .clone();
        let loaded = {
            let _guard = lock.lock().await;
            self.load_document(document_id).await
        };
        drop(lock);

        // The last one through drops the entry.
        let mut loading = self.loading.lock();
        if loading
            .get(document_id)
            .map_or(false, |entry| Arc::strong_count(entry) == 1)
        {
            loading.remove(document_id);
        }
        loaded
    }

    /// Load a document into the cache. Callers hold its loading lock.
    async fn load_document(&self, document_id: &str) -> Result<PadHandle> {
        if let Some(handle) = self.documents.read().get(document_id) {
            return Ok(handle.clone());
        }

        let pad = Pad::load(
            document_id,
            self.store.clone(),
            Some(self.config.default_text.as_str()),
        )
        .await?;
        let handle = Arc::new(Mutex::new(pad));
        self.documents
            .write()
            .insert(document_id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn handle_join(
        &self,
        connection: ConnectionId,
        document_id: &str,
        token: &str,
        protocol_version: u32,
        last_acked: Rev,
    ) -> Result<()> {
        let session = self
            .registry
            .get(connection)
            .ok_or(CoordinatorError::UnknownConnection(connection))?;
        if session.state != SessionState::Connected {
            return Err(CoordinatorError::Protocol(format!(
                "join while {:?}",
                session.state
            )));
        }
        if protocol_version != PROTOCOL_VERSION {
            return Err(CoordinatorError::Protocol(format!(
                "unsupported protocol version {}",
                protocol_version
            )));
        }

        self.registry
            .set_state(connection, SessionState::AwaitingAccessCheck);
        let denial = match self.access.check_access(document_id, token).await {
            AccessStatus::Grant { author_id } => Ok(author_id),
            AccessStatus::Deny => Err(RejectReason::Deny),
            AccessStatus::NeedPassword => Err(RejectReason::NeedPassword),
            AccessStatus::WrongPassword => Err(RejectReason::WrongPassword),
        };
        let author_id = match denial {
            Ok(author_id) => author_id,
            Err(reason) => {
                self.reject(connection, reason);
                return Ok(());
            }
        };

        if self.registry.count_for(document_id) >= self.config.max_sessions_per_document {
            self.reject(connection, RejectReason::PadFull);
            return Ok(());
        }

        let handle = match self.document(document_id).await {
            Ok(handle) => handle,
            Err(err) => {
                error!(%connection, doc = %document_id, error = %err, "failed to load document");
                self.reject(connection, RejectReason::PersistenceFailed);
                return Ok(());
            }
        };
        let pad = handle.lock().await;

        if last_acked < -1 || last_acked > pad.head() {
            self.reject(connection, RejectReason::InvalidRevision);
            return Ok(());
        }

        // A fresh client starts from the snapshot in WELCOME.
        let from = if last_acked == -1 { pad.head() } else { last_acked };
        let catch_up = match self.load_deltas(&pad, from).await {
            Ok(deltas) => deltas,
            Err(err) => {
                error!(%connection, doc = %document_id, error = %err, "failed to read catch-up revisions");
                self.reject(connection, RejectReason::PersistenceFailed);
                return Ok(());
            }
        };

        let (atext, pool) = pad.pool().prepare_atext_for_wire(pad.atext())?;

        for other in self.registry.sessions_for(document_id) {
            if other.author_id.as_deref() == Some(author_id.as_str()) {
                info!(connection = %other.connection, author = %author_id, "replaced by a newer session");
                self.kick(other.connection, KickReason::DuplicateAuthor);
            }
        }

        let users = self
            .registry
            .sessions_for(document_id)
            .into_iter()
            .filter_map(|info| info.author_id)
            .collect();
        self.registry
            .attach(connection, document_id, &author_id, last_acked);
        self.registry.send(
            connection,
            ServerMessage::Welcome {
                document_id: document_id.to_string(),
                author_id: author_id.clone(),
                head: pad.head(),
                users,
                atext,
                pool,
            },
        );
        self.notify_others(document_id, connection, || ServerMessage::UserJoined {
            author_id: author_id.clone(),
        });

        for (_, message) in catch_up {
            self.registry.send(connection, message);
        }
        self.registry.set_last_acked(connection, pad.head());
        self.registry.set_state(connection, SessionState::Active);

        info!(%connection, doc = %document_id, author = %author_id, head = pad.head(), "session joined");
        Ok(())
    }

    async fn handle_edit(
        &self,
        connection: ConnectionId,
        base_rev: Rev,
        encoded: &str,
        wire_pool: &AttributePool,
    ) -> Result<()> {
        let session = self
            .registry
            .get(connection)
            .ok_or(CoordinatorError::UnknownConnection(connection))?;
        let (Some(document_id), Some(author_id), SessionState::Active) =
            (session.document_id, session.author_id, session.state)
        else {
            return Err(CoordinatorError::Protocol(
                "edit before joining a document".to_string(),
            ));
        };

        let changeset: Changeset = encoded.parse()?;
        changeset.check_rep()?;

        let handle = self.document(&document_id).await?;
        let mut pad = handle.lock().await;

        let mut pool = pad.pool().clone();
        let mut changeset = pool.remap(wire_pool, &changeset)?;

        let head = pad.head();
        if base_rev < -1 || base_rev > head {
            return Err(CoordinatorError::InvalidBase {
                base: base_rev,
                head,
            });
        }
        for rev in base_rev + 1..=head {
            let committed = pad.get_revision_changeset(rev).await?;
            changeset = follow(&changeset, &committed, &pool)?;
        }

        let len = pad.atext().len();
        if changeset.old_len != len {
            return Err(CoordinatorError::StaleChangeset {
                expected: changeset.old_len,
                actual: len,
            });
        }

        let new_rev = pad.append_with_pool(changeset, &author_id, pool).await?;
        debug!(%connection, doc = %document_id, rev = new_rev, base = base_rev, "committed edit");

        if let Err(err) = self.run_repairs(&mut pad).await {
            error!(doc = %document_id, error = %err, "repair failed");
        }
        self.broadcast(&pad, Some((connection, new_rev))).await;
        Ok(())
    }

    /// Append corrective revisions for the current document state.
    async fn run_repairs(&self, pad: &mut Pad) -> Result<()> {
        if let Some(fix) = list_marker_repair(pad.atext(), pad.pool())? {
            let rev = pad.append_revision(fix, "").await?;
            debug!(doc = %pad.id(), rev, "repaired line markers");
        }
        if self.config.blank_line_padding {
            if let Some(fix) = blank_line_repair(pad.text())? {
                let rev = pad.append_revision(fix, "").await?;
                debug!(doc = %pad.id(), rev, "padded trailing blank line");
            }
        }
        Ok(())
    }

    /// `DELTA` messages for every revision after `from`, re-encoded with a
    /// minimal pool each.
    async fn load_deltas(&self, pad: &Pad, from: Rev) -> Result<Vec<(Rev, ServerMessage)>> {
        let mut deltas = Vec::new();
        for rev in from + 1..=pad.head() {
            let revision = pad.get_revision(rev).await?;
            let (changeset, pool) = pad.pool().prepare_for_wire(&revision.changeset)?;
            deltas.push((
                rev,
                ServerMessage::Delta {
                    new_rev: rev,
                    changeset: changeset.to_string(),
                    pool,
                    author: revision.meta.author,
                },
            ));
        }
        Ok(deltas)
    }

    /// Bring every active session of the document up to the head. The
    /// submitter of `own` receives an `ACK` for that revision instead of its
    /// delta.
    async fn broadcast(&self, pad: &Pad, own: Option<(ConnectionId, Rev)>) {
        let sessions: Vec<_> = self
            .registry
            .sessions_for(pad.id())
            .into_iter()
            .filter(|info| info.state == SessionState::Active)
            .collect();
        let Some(from) = sessions.iter().map(|info| info.last_acked).min() else {
            return;
        };

        let deltas = match self.load_deltas(pad, from).await {
            Ok(deltas) => deltas,
            Err(err) => {
                error!(doc = %pad.id(), error = %err, "failed to read revisions for broadcast");
                return;
            }
        };

        for session in sessions {
            for (rev, message) in deltas.iter().filter(|(rev, _)| *rev > session.last_acked) {
                let message = match own {
                    Some((connection, own_rev)) if connection == session.connection && own_rev == *rev => {
                        ServerMessage::Ack { new_rev: *rev }
                    }
                    _ => message.clone(),
                };
                self.registry.send(session.connection, message);
            }
            self.registry.set_last_acked(session.connection, pad.head());
        }
    }

    /// Kick every session of a document and delete its history.
    pub async fn remove_document(&self, document_id: &str) -> Result<()> {
        let handle = self.document(document_id).await?;
        let mut pad = handle.lock().await;

        // Everyone goes at once, so nobody is told about the others leaving.
        for session in self.registry.sessions_for(document_id) {
            self.registry.send(
                session.connection,
                ServerMessage::Kick {
                    reason: KickReason::DocumentDeleted,
                },
            );
            self.registry.disconnect(session.connection);
        }
        pad.remove().await?;
        self.documents.write().remove(document_id);

        info!(doc = %document_id, "document removed");
        Ok(())
    }
}

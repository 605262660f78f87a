//! Connected sessions and their per-document bookkeeping.

use crate::protocol::ServerMessage;
use parking_lot::RwLock;
use quill_log::Rev;
use std::collections::HashMap;
use tokio::sync::mpsc;
use ulid::Ulid;

/// Identifier of one client connection.
pub type ConnectionId = Ulid;

/// Lifecycle of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    AwaitingAccessCheck,
    Joined,
    Active,
    Disconnected,
}

/// Snapshot of a session's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub connection: ConnectionId,
    pub document_id: Option<String>,
    pub author_id: Option<String>,
    /// Highest revision this session has been sent.
    pub last_acked: Rev,
    pub state: SessionState,
}

struct Entry {
    info: SessionInfo,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

/// All live sessions. Removing a session drops its outbox sender, which
/// closes the connection's message stream once pending messages are read.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its id and message stream.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let connection = Ulid::new();
        let info = SessionInfo {
            connection,
            document_id: None,
            author_id: None,
            last_acked: -1,
            state: SessionState::Connected,
        };
        self.sessions
            .write()
            .insert(connection, Entry { info, outbox });
        (connection, inbox)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<SessionInfo> {
        self.sessions
            .read()
            .get(&connection)
            .map(|entry| entry.info.clone())
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.sessions.read().contains_key(&connection)
    }

    pub fn set_state(&self, connection: ConnectionId, state: SessionState) {
        if let Some(entry) = self.sessions.write().get_mut(&connection) {
            entry.info.state = state;
        }
    }

    /// Bind a connection to a document as `author_id`.
    pub fn attach(&self, connection: ConnectionId, document_id: &str, author_id: &str, last_acked: Rev) {
        if let Some(entry) = self.sessions.write().get_mut(&connection) {
            entry.info.document_id = Some(document_id.to_string());
            entry.info.author_id = Some(author_id.to_string());
            entry.info.last_acked = last_acked;
            entry.info.state = SessionState::Joined;
        }
    }

    pub fn set_last_acked(&self, connection: ConnectionId, rev: Rev) {
        if let Some(entry) = self.sessions.write().get_mut(&connection) {
            entry.info.last_acked = rev;
        }
    }

    /// Sessions attached to `document_id` (joined or active).
    pub fn sessions_for(&self, document_id: &str) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|entry| {
                entry.info.document_id.as_deref() == Some(document_id)
                    && matches!(entry.info.state, SessionState::Joined | SessionState::Active)
            })
            .map(|entry| entry.info.clone())
            .collect();
        sessions.sort_by_key(|info| info.connection);
        sessions
    }

    pub fn count_for(&self, document_id: &str) -> usize {
        self.sessions_for(document_id).len()
    }

    /// Queue a message for a connection. Returns false if it is gone.
    pub fn send(&self, connection: ConnectionId, message: ServerMessage) -> bool {
        match self.sessions.read().get(&connection) {
            Some(entry) => entry.outbox.send(message).is_ok(),
            None => false,
        }
    }

    /// Remove a connection, returning its final state.
    pub fn disconnect(&self, connection: ConnectionId) -> Option<SessionInfo> {
        self.sessions.write().remove(&connection).map(|entry| SessionInfo {
            state: SessionState::Disconnected,
            ..entry.info
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let registry = SessionRegistry::new();
        let (conn, mut inbox) = registry.connect();
        assert_eq!(registry.get(conn).unwrap().state, SessionState::Connected);
        assert_eq!(registry.count_for("d"), 0);

        registry.attach(conn, "d", "a.1", -1);
        let info = registry.get(conn).unwrap();
        assert_eq!(info.state, SessionState::Joined);
        assert_eq!(info.author_id.as_deref(), Some("a.1"));
        assert_eq!(registry.count_for("d"), 1);

        assert!(registry.send(conn, ServerMessage::Ack { new_rev: 0 }));
        assert_eq!(inbox.try_recv().unwrap(), ServerMessage::Ack { new_rev: 0 });

        let last = registry.disconnect(conn).unwrap();
        assert_eq!(last.state, SessionState::Disconnected);
        assert!(!registry.send(conn, ServerMessage::Ack { new_rev: 1 }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_disconnect_closes_stream_after_pending_messages() {
        let registry = SessionRegistry::new();
        let (conn, mut inbox) = registry.connect();
        registry.send(conn, ServerMessage::Ack { new_rev: 3 });
        registry.disconnect(conn);

        assert_eq!(inbox.try_recv().unwrap(), ServerMessage::Ack { new_rev: 3 });
        assert!(matches!(
            inbox.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_sessions_for_ignores_unjoined() {
        let registry = SessionRegistry::new();
        let (a, _ia) = registry.connect();
        let (b, _ib) = registry.connect();
        let (_c, _ic) = registry.connect();
        registry.attach(a, "d", "a.1", -1);
        registry.attach(b, "e", "a.2", -1);
        registry.set_state(a, SessionState::Active);

        let sessions = registry.sessions_for("d");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].connection, a);
        assert_eq!(registry.len(), 3);
    }
}

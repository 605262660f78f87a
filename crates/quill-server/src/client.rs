//! Client-side document replica.
//!
//! A replica keeps at most one edit in flight (`pending`) and collects
//! further local edits in `buffer` until that edit is acknowledged.
//! Incoming deltas are rebased over both so the local text always equals
//! the server head followed by the unacknowledged local edits.

use crate::error::Result;
use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use quill_changeset::{
    apply_to_atext, compose, transform, AText, Attribute, AttributePool, Changeset,
};
use quill_log::Rev;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
pub struct ClientReplica {
    document_id: String,
    token: String,
    author_id: Option<String>,
    /// Authors of the other sessions on the document.
    users: BTreeSet<String>,
    atext: AText,
    pool: AttributePool,
    base_rev: Rev,
    pending: Option<Changeset>,
    buffer: Option<Changeset>,
}

impl ClientReplica {
    /// A replica of an empty document.
    pub fn new(document_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            token: token.into(),
            author_id: None,
            users: BTreeSet::new(),
            atext: AText::default(),
            pool: AttributePool::new(),
            base_rev: -1,
            pending: None,
            buffer: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.atext.text
    }

    pub fn atext(&self) -> &AText {
        &self.atext
    }

    pub fn pool(&self) -> &AttributePool {
        &self.pool
    }

    /// Last server revision incorporated.
    pub fn base_rev(&self) -> Rev {
        self.base_rev
    }

    pub fn author_id(&self) -> Option<&str> {
        self.author_id.as_deref()
    }

    /// Authors of the other sessions currently on the document.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(String::as_str)
    }

    /// Whether every local edit has been acknowledged.
    pub fn is_settled(&self) -> bool {
        self.pending.is_none() && self.buffer.is_none()
    }

    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            document_id: self.document_id.clone(),
            token: self.token.clone(),
            protocol_version: PROTOCOL_VERSION,
            last_acked_revision: self.base_rev,
        }
    }

    /// Replace `remove` chars at `start` with `insert`, attributed to this
    /// replica's author.
    pub fn local_edit(&mut self, start: usize, remove: usize, insert: &str) -> Result<()> {
        let attribs = match (&self.author_id, insert.is_empty()) {
            (Some(author), false) => vec![self.pool.intern(Attribute::author(author.as_str()))],
            _ => Vec::new(),
        };
        self.apply_local(Changeset::make_splice(
            &self.atext.text,
            start,
            remove,
            insert,
            &attribs,
        )?)
    }

    /// Apply an arbitrary local changeset whose attribute numbers refer to
    /// [`pool`](Self::pool).
    pub fn apply_local(&mut self, changeset: Changeset) -> Result<()> {
        if changeset.is_identity() {
            return Ok(());
        }
        self.atext = apply_to_atext(&changeset, &self.atext, &mut self.pool)?;
        self.buffer = Some(match self.buffer.take() {
            Some(buffer) => compose(&buffer, &changeset, &mut self.pool)?,
            None => changeset,
        });
        Ok(())
    }

    /// Send the buffered edits if nothing is in flight.
    pub fn flush(&mut self) -> Result<Option<ClientMessage>> {
        if self.pending.is_some() {
            return Ok(None);
        }
        let Some(changeset) = self.buffer.take() else {
            return Ok(None);
        };
        let (wire, pool) = self.pool.prepare_for_wire(&changeset)?;
        self.pending = Some(changeset);
        Ok(Some(ClientMessage::Edit {
            base_rev: self.base_rev,
            changeset: wire.to_string(),
            pool,
        }))
    }

    /// Incorporate a message from the coordinator.
    pub fn receive(&mut self, message: &ServerMessage) -> Result<()> {
        match message {
            ServerMessage::Welcome {
                author_id,
                head,
                users,
                atext,
                pool,
                ..
            } => {
                self.author_id = Some(author_id.clone());
                self.users = users.iter().cloned().collect();
                // A fresh replica receives the document instead of its
                // history; treat it as one delta from the empty document.
                if self.base_rev == -1 && *head >= 0 {
                    let snapshot = self.pool.remap(pool, &atext.to_changeset()?)?;
                    self.incorporate(snapshot, *head)?;
                }
            }
            ServerMessage::Ack { new_rev } => {
                self.pending = None;
                self.base_rev = *new_rev;
            }
            ServerMessage::Delta {
                new_rev,
                changeset,
                pool,
                ..
            } => {
                let wire: Changeset = changeset.parse()?;
                let incoming = self.pool.remap(pool, &wire)?;
                self.incorporate(incoming, *new_rev)?;
            }
            ServerMessage::UserJoined { author_id } => {
                self.users.insert(author_id.clone());
            }
            ServerMessage::UserLeft { author_id } => {
                self.users.remove(author_id);
            }
            ServerMessage::Reject { .. } | ServerMessage::Kick { .. } => {}
        }
        Ok(())
    }

    /// Rebase a server revision over the local edits and apply it.
    fn incorporate(&mut self, mut incoming: Changeset, new_rev: Rev) -> Result<()> {
        for local in [&mut self.pending, &mut self.buffer] {
            if let Some(edit) = local.take() {
                let rebased = transform(&incoming, &edit, true, &self.pool)?;
                *local = Some(transform(&edit, &incoming, false, &self.pool)?);
                incoming = rebased;
            }
        }

        self.atext = apply_to_atext(&incoming, &self.atext, &mut self.pool)?;
        self.base_rev = new_rev;
        Ok(())
    }
}

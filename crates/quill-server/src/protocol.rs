//! Wire messages exchanged between clients and the coordinator.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"JOIN","documentId":"notes","token":"t1","protocolVersion":2,"lastAckedRevision":-1}
//! {"type":"EDIT","baseRev":0,"changeset":"Z:6>3+3$Hi ","pool":{"numToAttrib":{},"nextNum":0}}
//! {"type":"ACK","newRev":1}
//! {"type":"USER_LEFT","authorId":"a.1"}
//! ```

use quill_changeset::{AText, AttributePool};
use quill_log::Rev;
use serde::{Deserialize, Serialize};

/// Version a client must declare when joining.
pub const PROTOCOL_VERSION: u32 = 2;

/// Messages sent by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        document_id: String,
        token: String,
        protocol_version: u32,
        /// Last revision the client has incorporated; `-1` for a fresh client.
        last_acked_revision: Rev,
    },
    /// A changeset made against `base_rev`. The changeset stays in its
    /// encoded form here so that decoding failures are handled as bad
    /// changesets rather than unreadable messages.
    #[serde(rename_all = "camelCase")]
    Edit {
        base_rev: Rev,
        changeset: String,
        pool: AttributePool,
    },
}

/// Messages sent by the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Join accepted. A client that joined with `lastAckedRevision` -1
    /// starts from `atext`; any other client receives catch-up deltas from
    /// its declared revision right after this message.
    #[serde(rename_all = "camelCase")]
    Welcome {
        document_id: String,
        author_id: String,
        head: Rev,
        /// Authors of the other sessions attached to the document.
        users: Vec<String>,
        /// The document at `head`, its attribution numbered against `pool`.
        atext: AText,
        pool: AttributePool,
    },
    /// Another session joined the document.
    #[serde(rename_all = "camelCase")]
    UserJoined { author_id: String },
    /// Another session left the document.
    #[serde(rename_all = "camelCase")]
    UserLeft { author_id: String },
    /// The submitter's own edit was committed as `new_rev`.
    #[serde(rename_all = "camelCase")]
    Ack { new_rev: Rev },
    /// A revision committed by someone else (or by the server).
    #[serde(rename_all = "camelCase")]
    Delta {
        new_rev: Rev,
        changeset: String,
        pool: AttributePool,
        author: String,
    },
    Reject { reason: RejectReason },
    Kick { reason: KickReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    Deny,
    NeedPassword,
    WrongPassword,
    PadFull,
    InvalidRevision,
    PersistenceFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KickReason {
    BadChangeset,
    DuplicateAuthor,
    DocumentDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_wire_shape() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "JOIN",
            "documentId": "notes",
            "token": "t1",
            "protocolVersion": 2,
            "lastAckedRevision": -1
        }))
        .unwrap();

        assert_eq!(
            msg,
            ClientMessage::Join {
                document_id: "notes".into(),
                token: "t1".into(),
                protocol_version: PROTOCOL_VERSION,
                last_acked_revision: -1,
            }
        );
    }

    #[test]
    fn test_edit_keeps_changeset_encoded() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "EDIT",
            "baseRev": 3,
            "changeset": "not a changeset",
            "pool": {"numToAttrib": {}, "nextNum": 0}
        }))
        .unwrap();

        assert!(matches!(msg, ClientMessage::Edit { base_rev: 3, .. }));
    }

    #[test]
    fn test_server_messages() {
        assert_eq!(
            serde_json::to_value(ServerMessage::Ack { new_rev: 4 }).unwrap(),
            json!({"type": "ACK", "newRev": 4})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Kick {
                reason: KickReason::BadChangeset
            })
            .unwrap(),
            json!({"type": "KICK", "reason": "badChangeset"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::UserJoined {
                author_id: "a.1".into()
            })
            .unwrap(),
            json!({"type": "USER_JOINED", "authorId": "a.1"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Reject {
                reason: RejectReason::PersistenceFailed
            })
            .unwrap(),
            json!({"type": "REJECT", "reason": "persistenceFailed"})
        );
    }

    #[test]
    fn test_welcome_carries_the_document() {
        let msg = ServerMessage::Welcome {
            document_id: "notes".into(),
            author_id: "a.1".into(),
            head: 0,
            users: vec![],
            atext: AText::new("hi"),
            pool: AttributePool::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "WELCOME");
        assert_eq!(json["atext"], json!({"text": "hi\n", "attribs": "|1+3"}));
        assert_eq!(json["pool"], json!({"numToAttrib": {}, "nextNum": 0}));
        assert_eq!(serde_json::from_value::<ServerMessage>(json).unwrap(), msg);
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let res = serde_json::from_str::<ClientMessage>(r#"{"type":"CHAT","text":"hi"}"#);
        assert!(res.is_err());
    }
}

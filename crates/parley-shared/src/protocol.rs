//! WebSocket frames exchanged with the daemon.
//!
//! The daemon speaks JSON envelopes: a `type` discriminant plus a
//! type-specific `payload` object. Payload field names mirror the
//! daemon's own structs and must not be renamed. Outbound frames carry
//! no sender; the daemon stamps the authenticated identity itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::error::ProtocolError;
use crate::types::{ChatId, GroupId, Message, PeerId};

// ---------------------------------------------------------------------------
// Inbound (daemon -> client)
// ---------------------------------------------------------------------------

/// A parsed inbound frame. Live deliveries and echoes of our own sends
/// arrive through the same two variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum InboundFrame {
    #[serde(rename = "DIRECT_MESSAGE")]
    Direct(DirectPayload),
    #[serde(rename = "GROUP_MESSAGE")]
    Group(GroupPayload),
}

/// Payload of an inbound `DIRECT_MESSAGE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectPayload {
    pub sender_peer_id: String,
    pub target_peer_id: String,
    pub message: String,
    /// Origin timestamp. Not every daemon revision sends one.
    #[serde(rename = "Time", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Payload of an inbound `GROUP_MESSAGE`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupPayload {
    pub sender_peer_id: String,
    pub group_id: String,
    pub message: String,
    #[serde(rename = "Time", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl InboundFrame {
    /// Parse a raw text frame. Unknown types and missing fields are
    /// errors; callers drop the frame and keep reading.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The conversation this frame belongs to, from the local identity's
    /// point of view.
    pub fn chat_id(&self, local_id: &PeerId) -> ChatId {
        match self {
            Self::Direct(p) => {
                chat::direct_chat_id(local_id, &p.sender_peer_id, &p.target_peer_id)
            }
            Self::Group(p) => chat::group_chat_id(&p.group_id),
        }
    }

    /// Convert into the domain message entity. Frames without an origin
    /// timestamp are stamped with the receipt time.
    pub fn into_message(self, local_id: &PeerId) -> Message {
        let chat_id = self.chat_id(local_id);
        let (sender, body, time) = match self {
            Self::Direct(p) => (p.sender_peer_id, p.message, p.time),
            Self::Group(p) => (p.sender_peer_id, p.message, p.time),
        };
        let sender_id = PeerId::new(&sender);
        Message {
            chat_id,
            outgoing: &sender_id == local_id,
            sender_id,
            body,
            sent_at: time.unwrap_or_else(Utc::now),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound (client -> daemon)
// ---------------------------------------------------------------------------

/// A frame to push onto the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundFrame {
    #[serde(rename = "DIRECT_MESSAGE")]
    Direct {
        target_peer_id: String,
        message: String,
    },
    #[serde(rename = "GROUP_MESSAGE")]
    Group { group_id: String, message: String },
}

impl OutboundFrame {
    /// Direct message to `target`.
    pub fn direct(target: &PeerId, body: impl Into<String>) -> Self {
        Self::Direct {
            target_peer_id: target.as_str().to_string(),
            message: body.into(),
        }
    }

    /// Message to every member of `group`.
    pub fn group(group: &GroupId, body: impl Into<String>) -> Self {
        Self::Group {
            group_id: group.as_str().to_string(),
            message: body.into(),
        }
    }

    /// Serialize to the JSON text the daemon expects.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_direct_wire_shape() {
        let frame = OutboundFrame::direct(&PeerId::new("p2"), "hello");
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "DIRECT_MESSAGE",
                "payload": { "target_peer_id": "p2", "message": "hello" }
            })
        );
    }

    #[test]
    fn test_outbound_group_wire_shape() {
        let frame = OutboundFrame::group(&GroupId::new("g1"), "hi all");
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "GROUP_MESSAGE",
                "payload": { "group_id": "g1", "message": "hi all" }
            })
        );
    }

    #[test]
    fn test_inbound_direct_parses_without_time() {
        let raw = r#"{"type":"DIRECT_MESSAGE","payload":{"sender_peer_id":"p2","target_peer_id":"p1","message":"yo"}}"#;
        let frame = InboundFrame::from_json(raw).unwrap();
        match frame {
            InboundFrame::Direct(p) => {
                assert_eq!(p.sender_peer_id, "p2");
                assert_eq!(p.target_peer_id, "p1");
                assert_eq!(p.message, "yo");
                assert!(p.time.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_inbound_group_parses_rfc3339_time() {
        let raw = r#"{"type":"GROUP_MESSAGE","payload":{"sender_peer_id":"p3","group_id":"g1","message":"m","Time":"2024-01-15T10:30:00Z"}}"#;
        let frame = InboundFrame::from_json(raw).unwrap();
        match frame {
            InboundFrame::Group(p) => {
                let time = p.time.unwrap();
                assert_eq!(time.to_rfc3339(), "2024-01-15T10:30:00+00:00");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let raw = r#"{"type":"DIRECT_MESSAGE","payload":{"message":"hi"}}"#;
        assert!(InboundFrame::from_json(raw).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = r#"{"type":"CALL_OFFER","payload":{}}"#;
        assert!(InboundFrame::from_json(raw).is_err());
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(InboundFrame::from_json("not json{{{").is_err());
    }

    #[test]
    fn test_echo_materializes_as_outgoing() {
        let local = PeerId::new("p1");
        let frame = InboundFrame::Direct(DirectPayload {
            sender_peer_id: "p1".to_string(),
            target_peer_id: "p2".to_string(),
            message: "sent by me".to_string(),
            time: None,
        });
        let message = frame.into_message(&local);
        assert!(message.outgoing);
        assert_eq!(message.chat_id.as_str(), "p2");
        assert_eq!(message.sender_id, local);
    }

    #[test]
    fn test_incoming_direct_keys_on_sender() {
        let local = PeerId::new("p1");
        let frame = InboundFrame::Direct(DirectPayload {
            sender_peer_id: "p2".to_string(),
            target_peer_id: "p1".to_string(),
            message: "hi".to_string(),
            time: None,
        });
        let message = frame.into_message(&local);
        assert!(!message.outgoing);
        assert_eq!(message.chat_id.as_str(), "p2");
    }

    #[test]
    fn test_missing_time_falls_back_to_receipt_time() {
        let local = PeerId::new("p1");
        let frame = InboundFrame::Group(GroupPayload {
            sender_peer_id: "p2".to_string(),
            group_id: "g1".to_string(),
            message: "m".to_string(),
            time: None,
        });
        let before = Utc::now();
        let message = frame.into_message(&local);
        let after = Utc::now();
        assert!(message.sent_at >= before && message.sent_at <= after);
    }
}

//! Bulk history payloads returned by the daemon's REST API.
//!
//! The two history endpoints return different shapes: group history
//! names each sender, direct history only flags whether an entry was
//! outgoing. Both are normalized into [`Message`] here so the rest of
//! the client never sees the difference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, GroupId, Message, PeerId};

/// Response body of `POST /group-chat/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupHistoryResponse {
    /// Null when the group has no stored messages.
    #[serde(rename = "Messages")]
    pub messages: Option<Vec<GroupHistoryEntry>>,
}

/// One entry of a group history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupHistoryEntry {
    #[serde(rename = "SenderPeerId")]
    pub sender_peer_id: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
}

/// Response body of `POST /chat/messages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectHistoryResponse {
    /// Null when the conversation has no stored messages.
    #[serde(rename = "Messages")]
    pub messages: Option<Vec<DirectHistoryEntry>>,
}

/// One entry of a direct history response. The daemon does not name the
/// sender here; `IsOutgoing` is relative to the local identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectHistoryEntry {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "SendTime")]
    pub send_time: DateTime<Utc>,
    #[serde(rename = "IsOutgoing")]
    pub is_outgoing: bool,
}

/// Normalize a group history response into messages keyed on `group_id`.
pub fn normalize_group_history(
    local_id: &PeerId,
    group_id: &GroupId,
    response: GroupHistoryResponse,
) -> Vec<Message> {
    let chat_id = ChatId::group(group_id);
    response
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let sender_id = PeerId::new(&entry.sender_peer_id);
            Message {
                chat_id: chat_id.clone(),
                outgoing: &sender_id == local_id,
                sender_id,
                body: entry.message,
                sent_at: entry.time,
            }
        })
        .collect()
}

/// Normalize a direct history response into messages keyed on the
/// conversation with `peer_id`. Outgoing entries are attributed to the
/// local identity, incoming ones to the conversation peer.
pub fn normalize_direct_history(
    local_id: &PeerId,
    peer_id: &PeerId,
    response: DirectHistoryResponse,
) -> Vec<Message> {
    let chat_id = ChatId::direct(peer_id);
    response
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(|entry| {
            let sender_id = if entry.is_outgoing {
                local_id.clone()
            } else {
                peer_id.clone()
            };
            Message {
                chat_id: chat_id.clone(),
                sender_id,
                outgoing: entry.is_outgoing,
                body: entry.message,
                sent_at: entry.send_time,
            }
        })
        .collect()
}

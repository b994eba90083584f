//! Core domain types: identifier newtypes, the message entity, and the
//! roster models reported by the daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A peer identity as issued by the daemon. Opaque to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Build a peer id, trimming surrounding whitespace. Ids copied out
    /// of config files and UIs routinely carry stray whitespace, which
    /// would otherwise break self-detection.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for display: first two and last six characters.
    pub fn short(&self) -> String {
        let len = self.0.chars().count();
        if len < 9 {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(2).collect();
        let tail: String = self.0.chars().skip(len - 6).collect();
        format!("{head}*{tail}")
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a group chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation key. For a 1:1 chat this is the *other* participant's
/// peer id, never the raw sender; for a group chat it is the group id.
/// Both directions of a direct exchange therefore share one key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(String);

impl ChatId {
    /// Key of the 1:1 conversation with `peer`.
    pub fn direct(peer: &PeerId) -> Self {
        Self(peer.as_str().to_string())
    }

    /// Key of the group conversation `group`.
    pub fn group(group: &GroupId) -> Self {
        Self(group.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single chat message. Immutable once created; logs never edit in
/// place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Resolved conversation this message belongs to.
    pub chat_id: ChatId,
    /// Peer that produced the message, local or remote.
    pub sender_id: PeerId,
    /// Text content.
    pub body: String,
    /// Origin timestamp when the daemon supplied one, receipt time
    /// otherwise.
    pub sent_at: DateTime<Utc>,
    /// True when `sender_id` is the local identity.
    pub outgoing: bool,
}

impl Message {
    /// Logical identity used for duplicate detection. Two deliveries of
    /// the same send agree on all four fields.
    pub fn dedup_key(&self) -> (&str, &str, DateTime<Utc>, &str) {
        (
            self.chat_id.as_str(),
            self.sender_id.as_str(),
            self.sent_at,
            self.body.as_str(),
        )
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// A confirmed friend as reported by `GET /profile/friends`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friend {
    #[serde(rename = "PeerID")]
    pub peer_id: String,
    /// Display name assigned by the local user, when one exists.
    #[serde(rename = "DisplayName", alias = "display_name", default)]
    pub display_name: Option<String>,
    /// Live connection status at the time of the fetch.
    #[serde(rename = "IsOnline", default)]
    pub is_online: bool,
}

impl Friend {
    /// Name to render: the assigned display name, or a shortened peer id.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => PeerId::new(&self.peer_id).short(),
        }
    }
}

/// A group chat membership as reported by `GET /group-chats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupChat {
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Conversation key resolution.
//!
//! Every message must land in the log of exactly one conversation. For
//! group traffic the key is simply the group id. For direct traffic the
//! key is the *other* participant: when the daemon echoes back one of
//! our own sends, the sender is the local identity and the conversation
//! is the target's. Keying on the raw sender would split a 1:1 exchange
//! into two logs.
//!
//! Ids are trimmed before any comparison.

use crate::types::{ChatId, GroupId, PeerId};

/// Resolve the conversation key for a direct message.
pub fn direct_chat_id(local_id: &PeerId, sender_id: &str, target_id: &str) -> ChatId {
    let sender = PeerId::new(sender_id);
    if &sender == local_id {
        ChatId::direct(&PeerId::new(target_id))
    } else {
        ChatId::direct(&sender)
    }
}

/// Resolve the conversation key for a group message. The sender is
/// irrelevant here; all members share the group's log.
pub fn group_chat_id(group_id: &str) -> ChatId {
    ChatId::group(&GroupId::new(group_id))
}

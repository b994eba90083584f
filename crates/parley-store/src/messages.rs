//! In-memory per-conversation message logs.
//!
//! One log per chat id, created on first reference and kept for the
//! whole session. Logs are append-only: a history merge may re-order
//! entries, but nothing is ever truncated or edited in place. Callers
//! only get borrowed views; the store alone mutates.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use parley_shared::{ChatId, Message};

/// Message sequence for one conversation, oldest first.
#[derive(Debug, Clone, Default)]
struct ChatLog {
    messages: Vec<Message>,
}

impl ChatLog {
    /// Append unless the message repeats the current tail entry.
    fn append(&mut self, message: Message) -> bool {
        if let Some(last) = self.messages.last() {
            if last.dedup_key() == message.dedup_key() {
                return false;
            }
        }
        self.messages.push(message);
        true
    }
}

/// Keyed store holding every conversation's full log. The single source
/// of truth for what is known about each chat in a running session.
#[derive(Debug, Default)]
pub struct MessageStore {
    logs: HashMap<ChatId, ChatLog>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a live message to the tail of its conversation's log.
    ///
    /// Returns `false` when the message matches the most recent entry on
    /// the `(chat, sender, sent_at, body)` key; duplicate deliveries and
    /// echo races are absorbed here. Older repeats deeper in the log are
    /// legitimate re-sends and are kept.
    pub fn append(&mut self, message: Message) -> bool {
        let chat_id = message.chat_id.clone();
        let appended = self.logs.entry(chat_id.clone()).or_default().append(message);
        if !appended {
            debug!(chat = %chat_id, "Dropping duplicate tail append");
        }
        appended
    }

    /// Merge a completed history fetch into the conversation's log.
    ///
    /// Live messages that arrived while the fetch was in flight are
    /// kept. The merged log is re-sorted by `sent_at` (stable, so equal
    /// timestamps keep history-then-arrival order) and exact duplicates
    /// collapse to their first occurrence.
    pub fn replace_history(&mut self, chat_id: &ChatId, fetched: Vec<Message>) {
        let log = self.logs.entry(chat_id.clone()).or_default();
        let live = std::mem::take(&mut log.messages);
        let live_count = live.len();

        let mut merged = fetched;
        merged.extend(live);
        merged.sort_by_key(|m| m.sent_at);

        let mut seen = HashSet::new();
        merged.retain(|m| seen.insert((m.sender_id.clone(), m.sent_at, m.body.clone())));

        debug!(
            chat = %chat_id,
            merged = merged.len(),
            live = live_count,
            "Merged fetched history"
        );
        log.messages = merged;
    }

    /// All messages of a conversation, oldest first. Empty slice for a
    /// chat that was never written to.
    pub fn messages(&self, chat_id: &ChatId) -> &[Message] {
        self.logs
            .get(chat_id)
            .map(|log| log.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Number of stored messages for a conversation.
    pub fn len(&self, chat_id: &ChatId) -> usize {
        self.logs.get(chat_id).map(|log| log.messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, chat_id: &ChatId) -> bool {
        self.len(chat_id) == 0
    }

    /// Chat ids that currently have a log, in no particular order.
    pub fn chat_ids(&self) -> Vec<ChatId> {
        self.logs.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

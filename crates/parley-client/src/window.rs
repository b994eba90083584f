//! Pagination over stored chat logs.
//!
//! Rendering only ever shows a suffix of each log. The window for a
//! chat is sized once on first selection, widened a page at a time by
//! load-older requests, and widened by one on every live append so a
//! new message is never hidden behind the load-older affordance. It
//! never shrinks.

use std::collections::HashMap;

use tracing::debug;

use parley_shared::constants::{INITIAL_PAGE_SIZE, PAGE_INCREMENT};
use parley_shared::ChatId;
use parley_store::MessageStore;

/// Render-relevant description of one chat's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowView {
    /// Number of most-recent messages to show. Never exceeds the stored
    /// length.
    pub displayed_count: usize,
    /// Whether older stored messages remain hidden.
    pub has_more: bool,
}

/// Per-chat window state, keyed by chat id.
///
/// The raw counter may briefly exceed the stored length, e.g. when a
/// chat is selected before its history fetch lands. Exposed views clamp
/// to the log, and the clamped count is the one that grows
/// monotonically.
#[derive(Debug, Default)]
pub struct ChatWindows {
    displayed: HashMap<ChatId, usize>,
}

impl ChatWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a chat. The first selection sizes the window to one page;
    /// re-selection keeps whatever depth was already revealed.
    pub fn select_chat(&mut self, store: &MessageStore, chat_id: &ChatId) -> WindowView {
        if !self.displayed.contains_key(chat_id) {
            self.displayed.insert(chat_id.clone(), INITIAL_PAGE_SIZE);
            debug!(chat = %chat_id, "Opened chat window");
        }
        self.view(store, chat_id)
    }

    /// Reveal up to one more page of older messages. No-op when the
    /// whole log is already visible.
    pub fn load_older(&mut self, store: &MessageStore, chat_id: &ChatId) -> WindowView {
        let current = self.view(store, chat_id);
        if !current.has_more {
            return current;
        }
        let total = store.len(chat_id);
        let grown = (current.displayed_count + PAGE_INCREMENT).min(total);
        self.displayed.insert(chat_id.clone(), grown);
        debug!(chat = %chat_id, displayed = grown, "Revealed older messages");
        self.view(store, chat_id)
    }

    /// Widen the window by one after a live append to this chat. Chats
    /// that were never opened have no window to widen.
    pub fn on_append(&mut self, chat_id: &ChatId) {
        if let Some(count) = self.displayed.get_mut(chat_id) {
            *count += 1;
        }
    }

    /// Current view for a chat; a zero-size window when never opened.
    pub fn view(&self, store: &MessageStore, chat_id: &ChatId) -> WindowView {
        let total = store.len(chat_id);
        let raw = self.displayed.get(chat_id).copied().unwrap_or(0);
        let displayed_count = raw.min(total);
        WindowView {
            displayed_count,
            has_more: total > displayed_count,
        }
    }

    /// Whether a window was ever opened for this chat.
    pub fn is_open(&self, chat_id: &ChatId) -> bool {
        self.displayed.contains_key(chat_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # parley-store
//!
//! Append-only, in-memory message storage. Each conversation owns a log
//! ordered by timestamp; live appends deduplicate against the tail and
//! history fetches merge without ever dropping messages that arrived in
//! the meantime.

pub mod messages;

pub use messages::MessageStore;

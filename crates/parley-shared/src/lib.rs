//! # parley-shared
//!
//! Types and pure logic shared by every Parley crate: identifier
//! newtypes, the message entity, conversation-key resolution, the
//! daemon's WebSocket frame and REST history shapes, and protocol-wide
//! constants.

pub mod chat;
pub mod constants;
pub mod history;
pub mod protocol;
pub mod types;

mod error;

pub use error::ProtocolError;
pub use types::{ChatId, Friend, GroupChat, GroupId, Message, PeerId};

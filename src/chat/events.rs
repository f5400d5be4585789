//! Wire contract of the single-room gateway. Frames are JSON objects of
//! the form `{ "event": ..., "data": ... }`.

use serde::{Deserialize, Serialize};

use crate::messages::{Message, MessageKind};
use crate::rfc3339;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage { content: String },
    TypingStart,
    TypingStop,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Always empty: the room starts fresh on every connect.
    RecentMessages(Vec<MessagePayload>),
    NewMessage(MessagePayload),
    #[serde(rename_all = "camelCase")]
    UserJoined { alias: String, online_count: usize },
    #[serde(rename_all = "camelCase")]
    UserLeft { alias: String, online_count: usize },
    OnlineCount { count: usize },
    UserTyping { alias: String },
    UserStopTyping { alias: String },
    #[serde(rename_all = "camelCase")]
    MessageFiltered { message: String, warning_count: i64, remaining_warnings: i64 },
    #[serde(rename_all = "camelCase")]
    TypingBlocked { message: String, warning_count: i64 },
    ErrorMessage { message: String },
    #[serde(rename_all = "camelCase")]
    UserBlocked { user_id: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub alias: String,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: String,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> MessagePayload {
        MessagePayload {
            id: message.id.clone(),
            alias: message.alias.clone(),
            content: message.content.clone(),
            kind: message.kind,
            created_at: rfc3339(message.created_at),
        }
    }
}

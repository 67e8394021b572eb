//! Chat and message types for Parley.
//!
//! A chat is an ordered transcript of role-tagged messages plus a small
//! amount of metadata (title, model, creation time).

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

// Re-export MessageRole from llm module (it's used in both chat and llm contexts).
pub use crate::llm::MessageRole;

use crate::llm::Message;

/// A conversation and its transcript.
///
/// `messages` is ordered by `(created_at, id)` ascending. Store reads that
/// only need metadata (e.g. listings) leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub title: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    /// Create an empty chat with a fresh time-sortable id.
    pub fn new(model: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            model: model.into(),
            created_at: now_micros(),
            messages: Vec::new(),
        }
    }

    /// The transcript as role/content pairs, in order.
    pub fn transcript(&self) -> Vec<Message> {
        self.messages.iter().map(ChatMessage::to_llm_message).collect()
    }

    /// The most recent message, if any.
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// A single message within a chat.
///
/// Messages are append-only. The id is a UUID v7 generated at append time,
/// so it breaks ties between messages sharing a timestamp in append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a new message stamped with the current time.
    pub fn new(chat_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            chat_id,
            role,
            content: content.into(),
            created_at: now_micros(),
        }
    }

    /// Strip persistence metadata, keeping only what a completion call needs.
    pub fn to_llm_message(&self) -> Message {
        Message {
            role: self.role.clone(),
            content: self.content.clone(),
        }
    }
}

/// Current time truncated to the microsecond precision both stores keep.
///
/// A value built in memory therefore compares equal to the same value read
/// back from the database.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Named points in the chat workflows where a failure can occur.
///
/// Carried by `ChatError` so callers (and tests) can tell which step of a
/// multi-step operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStep {
    LoadChat,
    GenerateReply,
    GenerateTitle,
    PersistChat,
    PersistMessage,
    PersistUserMessage,
    PersistReply,
}

impl fmt::Display for ChatStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatStep::LoadChat => write!(f, "load_chat"),
            ChatStep::GenerateReply => write!(f, "generate_reply"),
            ChatStep::GenerateTitle => write!(f, "generate_title"),
            ChatStep::PersistChat => write!(f, "persist_chat"),
            ChatStep::PersistMessage => write!(f, "persist_message"),
            ChatStep::PersistUserMessage => write!(f, "persist_user_message"),
            ChatStep::PersistReply => write!(f, "persist_reply"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_reexport() {
        // Verify MessageRole is accessible from the chat module.
        let role = MessageRole::User;
        assert_eq!(role.to_string(), "user");
    }

    #[test]
    fn test_chat_transcript_preserves_order() {
        let mut chat = Chat::new("gpt-4o-mini", None);
        chat.messages.push(ChatMessage::new(chat.id, MessageRole::System, "be brief"));
        chat.messages.push(ChatMessage::new(chat.id, MessageRole::User, "Hello"));
        chat.messages.push(ChatMessage::new(chat.id, MessageRole::Assistant, "Hi there"));

        let transcript = chat.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].role, MessageRole::System);
        assert_eq!(transcript[1].content, "Hello");
        assert_eq!(transcript[2].role, MessageRole::Assistant);
        assert_eq!(chat.last_message().unwrap().content, "Hi there");
    }

    #[test]
    fn test_message_ids_sort_in_creation_order() {
        let chat_id = Uuid::now_v7();
        let first = ChatMessage::new(chat_id, MessageRole::User, "one");
        let second = ChatMessage::new(chat_id, MessageRole::User, "two");
        assert!(first.id < second.id);
    }

    #[test]
    fn test_timestamps_have_microsecond_precision() {
        let msg = ChatMessage::new(Uuid::now_v7(), MessageRole::User, "hi");
        assert_eq!(msg.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_chat_step_serde() {
        let json = serde_json::to_string(&ChatStep::GenerateTitle).unwrap();
        assert_eq!(json, "\"generate_title\"");
        assert_eq!(ChatStep::GenerateTitle.to_string(), "generate_title");
    }

    #[test]
    fn test_chat_deserialize_without_messages() {
        let json = r#"{
            "id": "0190a5b2-7c1e-7d3a-9f00-000000000001",
            "title": null,
            "model": "gpt-4o-mini",
            "created_at": "2026-01-01T00:00:00Z"
        }"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert!(chat.messages.is_empty());
        assert!(chat.title.is_none());
    }
}

//! ChatRepository trait definition.
//!
//! Append-only persistence of chats and their messages. Follows the RPITIT
//! pattern used by every port in this crate.

use parley_types::chat::{Chat, ChatMessage};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat and message persistence.
///
/// Implementations live in parley-infra (`SqliteChatRepository`,
/// `PgChatRepository`). Every write is a single-row insert; rows are never
/// updated or reordered.
pub trait ChatRepository: Send + Sync {
    /// Insert chat metadata. `RepositoryError::Conflict` if the id exists.
    ///
    /// `chat.messages` is ignored; messages are appended with `save_message`.
    fn create_chat(
        &self,
        chat: &Chat,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Append one message. `RepositoryError::NotFound` if the chat does not exist.
    fn save_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Chat metadata plus all messages ordered by `(created_at, id)` ascending.
    fn get_chat(
        &self,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, RepositoryError>> + Send;

    /// Chat metadata only, newest first.
    fn list_chats(
        &self,
        limit: i64,
        offset: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;
}

//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the writer
//! pool and reads on the reader pool.

use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{Chat, ChatMessage, MessageRole};
use parley_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};
use crate::database::map_write_error;

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    title: Option<String>,
    model: String,
    created_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            model: row.try_get("model")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid chat id: {e}")))?;
        let created_at = parse_datetime(&self.created_at).map_err(RepositoryError::Query)?;

        Ok(Chat {
            id,
            title: self.title,
            model: self.model,
            created_at,
            messages: Vec::new(),
        })
    }
}

struct MessageRow {
    id: String,
    chat_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let chat_id = Uuid::parse_str(&self.chat_id)
            .map_err(|e| RepositoryError::Query(format!("invalid chat_id: {e}")))?;
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at).map_err(RepositoryError::Query)?;

        Ok(ChatMessage {
            id,
            chat_id,
            role,
            content: self.content,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chats (id, title, model, created_at) VALUES (?, ?, ?, ?)")
            .bind(chat.id.to_string())
            .bind(&chat.title)
            .bind(&chat.model)
            .bind(format_datetime(&chat.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id.to_string())
        .bind(message.chat_id.to_string())
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT id, title, model, created_at FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut chat = ChatRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_chat()?;

        let rows = sqlx::query(
            r#"SELECT id, chat_id, role, content, created_at
               FROM messages
               WHERE chat_id = ?
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(chat_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        chat.messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            chat.messages.push(msg_row.into_message()?);
        }

        Ok(Some(chat))
    }

    async fn list_chats(&self, limit: i64, offset: i64) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, title, model, created_at
               FROM chats
               ORDER BY created_at DESC, id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row =
                ChatRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            chats.push(chat_row.into_chat()?);
        }

        Ok(chats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parley_core::bootstrap::Bootstrapper;

    use super::*;
    use crate::sqlite::INIT_SCRIPT;
    use crate::sqlite::bootstrap::SqliteBootstrapper;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("chat.db").display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        let pool = DatabasePool::new(&url).await.unwrap();
        SqliteBootstrapper::new(&url)
            .unwrap()
            .ensure_initialized(INIT_SCRIPT)
            .await
            .unwrap();
        pool
    }

    async fn saved_chat(repo: &SqliteChatRepository) -> Chat {
        let chat = Chat::new("gpt-4o-mini", Some("Test Chat".to_string()));
        repo.create_chat(&chat).await.unwrap();
        chat
    }

    #[tokio::test]
    async fn test_create_and_get_chat() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = saved_chat(&repo).await;

        let loaded = repo.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, chat.id);
        assert_eq!(loaded.title.as_deref(), Some("Test Chat"));
        assert_eq!(loaded.model, "gpt-4o-mini");
        assert_eq!(loaded.created_at, chat.created_at);
        assert!(loaded.messages.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_chat_is_none() {
        let repo = SqliteChatRepository::new(test_pool().await);
        assert!(repo.get_chat(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_chat_is_conflict() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = saved_chat(&repo).await;

        let err = repo.create_chat(&chat).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_message_for_unknown_chat_is_not_found() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let orphan = ChatMessage::new(Uuid::now_v7(), MessageRole::User, "hello?");

        let err = repo.save_message(&orphan).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_messages_returned_in_append_order() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = saved_chat(&repo).await;

        let mut appended = Vec::new();
        for i in 0..20 {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            let msg = ChatMessage::new(chat.id, role, format!("message {i}"));
            repo.save_message(&msg).await.unwrap();
            appended.push(msg);
        }

        let loaded = repo.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages, appended);
    }

    #[tokio::test]
    async fn test_identical_timestamps_ordered_by_id() {
        let repo = SqliteChatRepository::new(test_pool().await);
        let chat = saved_chat(&repo).await;

        let at = parley_types::chat::now_micros();
        let mut msgs: Vec<ChatMessage> = (0..5)
            .map(|i| ChatMessage {
                created_at: at,
                ..ChatMessage::new(chat.id, MessageRole::User, format!("same instant {i}"))
            })
            .collect();

        // Insert in reverse id order; reads must still come back sorted by id.
        for msg in msgs.iter().rev() {
            repo.save_message(msg).await.unwrap();
        }
        msgs.sort_by_key(|m| m.id);

        let loaded = repo.get_chat(&chat.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages, msgs);
    }

    #[tokio::test]
    async fn test_list_chats_newest_first_with_paging() {
        let repo = SqliteChatRepository::new(test_pool().await);

        let mut ids = Vec::new();
        for i in 0..3 {
            let chat = Chat {
                created_at: Utc::now() + chrono::Duration::seconds(i),
                ..Chat::new("gpt-4o-mini", Some(format!("chat {i}")))
            };
            repo.create_chat(&chat).await.unwrap();
            ids.push(chat.id);
        }

        let listed: Vec<Uuid> = repo
            .list_chats(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1], ids[0]]);

        let page = repo.list_chats(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1]);
        assert!(page[0].messages.is_empty());
    }
}

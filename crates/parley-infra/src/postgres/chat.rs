//! PostgreSQL chat repository implementation.

use chrono::{DateTime, Utc};
use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{Chat, ChatMessage, MessageRole};
use parley_types::error::RepositoryError;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::map_write_error;

/// PostgreSQL-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct ChatRow {
    id: Uuid,
    title: Option<String>,
    model: String,
    created_at: DateTime<Utc>,
}

impl ChatRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            model: row.try_get("model")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            title: self.title,
            model: self.model,
            created_at: self.created_at,
            messages: Vec::new(),
        }
    }
}

struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            role,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

impl ChatRepository for PgChatRepository {
    async fn create_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO chats (id, title, model, created_at) VALUES ($1, $2, $3, $4)")
            .bind(chat.id)
            .bind(&chat.title)
            .bind(&chat.model)
            .bind(chat.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_chat(&self, chat_id: &Uuid) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT id, title, model, created_at FROM chats WHERE id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut chat = ChatRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_chat();

        let rows = sqlx::query(
            r#"SELECT id, chat_id, role, content, created_at
               FROM messages
               WHERE chat_id = $1
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
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
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ChatRow::from_row(row)
                    .map(ChatRow::into_chat)
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }
}

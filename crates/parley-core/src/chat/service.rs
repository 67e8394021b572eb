//! Chat orchestrator: the start, continue and retry workflows.
//!
//! `ChatOrchestrator` composes a `CompletionClient` and a `ChatRepository`.
//! Each workflow is a fixed sequence of `ChatStep`s; a failure names the step
//! it happened in so callers can tell a title failure from a reply failure,
//! or a lost write from an unavailable completion service.
//!
//! Ordering rules:
//! - `start_new_chat` calls the completion client before writing anything,
//!   so a completion failure leaves the store untouched.
//! - `continue_chat` persists the user's message before the completion call,
//!   so the message survives a completion failure (`ChatError::Unanswered`).
//! - An assistant message is only ever appended after a user message.

use parley_types::chat::{Chat, ChatMessage, ChatStep, MessageRole};
use parley_types::error::{ChatError, RepositoryError};
use parley_types::llm::{CompletionRequest, CompletionResponse, Message};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::chat::prompt::{SYSTEM_PROMPT, TITLE_PROMPT, clean_title, validate_content};
use crate::chat::repository::ChatRepository;
use crate::llm::client::CompletionClient;

/// Largest page `list_chats` will return.
pub const MAX_LIST_LIMIT: i64 = 200;

/// Orchestrates chat creation and continuation.
///
/// Generic over `ChatRepository` and `CompletionClient` to maintain clean
/// architecture (parley-core never depends on parley-infra). Holds no
/// mutable state; concurrent calls for different chats are independent.
pub struct ChatOrchestrator<R: ChatRepository, C: CompletionClient> {
    repo: R,
    client: C,
    model: String,
}

impl<R: ChatRepository, C: CompletionClient> ChatOrchestrator<R, C> {
    /// Create an orchestrator. `model` is used for new chats; existing chats
    /// keep the model they were created with.
    pub fn new(repo: R, client: C, model: impl Into<String>) -> Self {
        Self {
            repo,
            client,
            model: model.into(),
        }
    }

    /// Access the chat repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Access the completion client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Model identifier assigned to new chats.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a chat from the user's first message.
    ///
    /// Steps: `GenerateReply`, `GenerateTitle`, then `PersistChat` followed by
    /// `PersistMessage` for the system, user and assistant messages in that
    /// order. Nothing is written unless both completions succeed. A store
    /// failure part-way through persistence is reported as
    /// `ChatError::Store` and may leave a prefix of the writes behind.
    #[tracing::instrument(name = "start_new_chat", skip(self, content), fields(model = %self.model))]
    pub async fn start_new_chat(&self, content: &str) -> Result<Chat, ChatError> {
        validate_content(content)?;

        let mut chat = Chat::new(self.model.clone(), None);
        let system = ChatMessage::new(chat.id, MessageRole::System, SYSTEM_PROMPT);
        let user = ChatMessage::new(chat.id, MessageRole::User, content);

        let reply = self
            .complete(
                ChatStep::GenerateReply,
                &chat.model,
                vec![system.to_llm_message(), user.to_llm_message()],
            )
            .await?;
        let assistant = ChatMessage::new(chat.id, MessageRole::Assistant, reply.message.content);

        let title = self
            .complete(
                ChatStep::GenerateTitle,
                &chat.model,
                vec![
                    system.to_llm_message(),
                    user.to_llm_message(),
                    assistant.to_llm_message(),
                    Message::user(TITLE_PROMPT),
                ],
            )
            .await?;
        chat.title = Some(clean_title(&title.message.content, content));

        self.repo
            .create_chat(&chat)
            .await
            .map_err(|e| ChatError::store(ChatStep::PersistChat, e))?;

        for message in [&system, &user, &assistant] {
            self.repo.save_message(message).await.map_err(|e| {
                warn!(chat_id = %chat.id, role = %message.role, error = %e, "Chat persisted partially");
                ChatError::store(ChatStep::PersistMessage, e)
            })?;
        }

        chat.messages = vec![system, user, assistant];
        info!(chat_id = %chat.id, title = ?chat.title, "Chat started");
        Ok(chat)
    }

    /// Append a user message to an existing chat and answer it.
    ///
    /// The user message is persisted before the completion call. If the
    /// completion fails the message stays persisted and
    /// `ChatError::Unanswered` carries it back to the caller, who may call
    /// `retry_reply` later. If the reply cannot be persisted it is discarded
    /// and `ChatError::Store { step: PersistReply }` is returned.
    #[tracing::instrument(name = "continue_chat", skip(self, content), fields(chat_id = %chat_id))]
    pub async fn continue_chat(
        &self,
        chat_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        validate_content(content)?;

        let chat = self.load_chat(chat_id).await?;
        let user = ChatMessage::new(chat.id, MessageRole::User, content);

        self.repo.save_message(&user).await.map_err(|e| match e {
            RepositoryError::NotFound => ChatError::NotFound(chat_id),
            other => ChatError::store(ChatStep::PersistUserMessage, other),
        })?;

        let mut transcript = chat.transcript();
        transcript.push(user.to_llm_message());

        let reply = match self
            .complete(ChatStep::GenerateReply, &chat.model, transcript)
            .await
        {
            Ok(reply) => reply,
            Err(cause) => {
                warn!(message_id = %user.id, error = %cause, "User message saved but not answered");
                return Err(ChatError::Unanswered {
                    user_message: Box::new(user),
                    cause: Box::new(cause),
                });
            }
        };

        self.persist_reply(chat.id, reply).await
    }

    /// Answer a chat whose last message is an unanswered user message.
    ///
    /// Fails with `ChatError::Validation` when the chat is empty or its last
    /// message is not from the user.
    #[tracing::instrument(name = "retry_reply", skip(self), fields(chat_id = %chat_id))]
    pub async fn retry_reply(&self, chat_id: Uuid) -> Result<ChatMessage, ChatError> {
        let chat = self.load_chat(chat_id).await?;

        match chat.last_message() {
            Some(last) if last.role == MessageRole::User => {}
            _ => {
                return Err(ChatError::Validation(
                    "chat has no unanswered user message".to_string(),
                ));
            }
        }

        let reply = self
            .complete(ChatStep::GenerateReply, &chat.model, chat.transcript())
            .await?;

        self.persist_reply(chat.id, reply).await
    }

    /// Load a chat and its ordered transcript.
    pub async fn load_chat(&self, chat_id: Uuid) -> Result<Chat, ChatError> {
        self.repo
            .get_chat(&chat_id)
            .await
            .map_err(|e| ChatError::store(ChatStep::LoadChat, e))?
            .ok_or(ChatError::NotFound(chat_id))
    }

    /// List chat metadata, newest first. Messages are not loaded.
    ///
    /// `limit` must be in `1..=MAX_LIST_LIMIT` and `offset` non-negative.
    pub async fn list_chats(&self, limit: i64, offset: i64) -> Result<Vec<Chat>, ChatError> {
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(ChatError::Validation(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}"
            )));
        }
        if offset < 0 {
            return Err(ChatError::Validation("offset must not be negative".to_string()));
        }

        self.repo
            .list_chats(limit, offset)
            .await
            .map_err(|e| ChatError::store(ChatStep::LoadChat, e))
    }

    async fn persist_reply(
        &self,
        chat_id: Uuid,
        reply: CompletionResponse,
    ) -> Result<ChatMessage, ChatError> {
        let assistant = ChatMessage::new(chat_id, MessageRole::Assistant, reply.message.content);
        self.repo
            .save_message(&assistant)
            .await
            .map_err(|e| ChatError::store(ChatStep::PersistReply, e))?;

        debug!(chat_id = %chat_id, message_id = %assistant.id, "Reply persisted");
        Ok(assistant)
    }

    /// One completion call, attributed to `step`.
    async fn complete(
        &self,
        step: ChatStep,
        model: &str,
        messages: Vec<Message>,
    ) -> Result<CompletionResponse, ChatError> {
        let request = CompletionRequest {
            model: model.to_string(),
            messages,
        };

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.client.name(),
            gen_ai.request.model = %request.model,
            parley.step = %step,
        );

        self.client
            .complete(&request)
            .instrument(span)
            .await
            .map_err(|e| ChatError::from_completion(step, e))
    }
}

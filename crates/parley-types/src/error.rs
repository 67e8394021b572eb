use thiserror::Error;
use uuid::Uuid;

use crate::chat::{ChatMessage, ChatStep};
use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the one-time database bootstrap.
///
/// Every variant except `ReadScript` is raised with the bootstrap
/// transaction rolled back and the marker absent.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap connection error: {0}")]
    Connection(String),

    #[error("failed to acquire bootstrap lock: {0}")]
    Lock(String),

    #[error("bootstrap marker error: {0}")]
    Marker(String),

    #[error("initialization script failed: {0}")]
    Script(String),

    #[error("failed to commit bootstrap: {0}")]
    Commit(String),

    #[error("failed to read initialization script '{path}': {source}")]
    ReadScript {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bootstrap timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors surfaced by the chat orchestrator to its callers.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat {0} not found")]
    NotFound(Uuid),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("completion unavailable during {step}: {source}")]
    CompletionUnavailable {
        step: ChatStep,
        #[source]
        source: LlmError,
    },

    #[error("completion returned no candidates during {step}")]
    EmptyCompletion { step: ChatStep },

    #[error("store failure during {step}: {source}")]
    Store {
        step: ChatStep,
        #[source]
        source: RepositoryError,
    },

    /// The user's message was persisted but no reply was produced.
    ///
    /// Distinct from total failure: the caller can retry only the
    /// completion step for `user_message.chat_id`.
    #[error("message {} was saved but not answered: {cause}", .user_message.id)]
    Unanswered {
        user_message: Box<ChatMessage>,
        #[source]
        cause: Box<ChatError>,
    },
}

impl ChatError {
    /// Classify a completion failure at the given step.
    pub fn from_completion(step: ChatStep, err: LlmError) -> Self {
        if err.is_empty_completion() {
            ChatError::EmptyCompletion { step }
        } else {
            ChatError::CompletionUnavailable { step, source: err }
        }
    }

    /// Wrap a store failure at the given step.
    pub fn store(step: ChatStep, err: RepositoryError) -> Self {
        ChatError::Store { step, source: err }
    }

    /// The step this error is attributed to, if any.
    pub fn step(&self) -> Option<ChatStep> {
        match self {
            ChatError::CompletionUnavailable { step, .. }
            | ChatError::EmptyCompletion { step }
            | ChatError::Store { step, .. } => Some(*step),
            ChatError::Unanswered { cause, .. } => cause.step(),
            ChatError::NotFound(_) | ChatError::Validation(_) => None,
        }
    }
}

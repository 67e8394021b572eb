//! CompletionClient trait definition.

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless adapter that turns one ordered transcript into one reply.
///
/// Implementations own their request timeout and never retry internally;
/// retrying is the caller's decision. A response with zero candidates must
/// be reported as `LlmError::EmptyCompletion`.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait CompletionClient: Send + Sync {
    /// Human-readable client name (e.g., "openai_compatible").
    fn name(&self) -> &str;

    /// Send a completion request and receive the first reply candidate.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}

//! OpenAI-compatible completion client.
//!
//! Sends `POST {base_url}/chat/completions` with a bearer key and returns the
//! first choice. Works against OpenAI and any server that implements the same
//! endpoint (LiteLLM, vLLM, Ollama's OpenAI shim, ...).
//!
//! The client has one fixed request timeout and never retries.

pub mod types;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use parley_core::llm::client::CompletionClient;
use parley_types::config::LlmConfig;
use parley_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, MessageRole, Usage,
};

use self::types::{ChatCompletionMessage, ChatCompletionRequest, ChatCompletionResponse};

/// Completion client for any OpenAI-compatible chat completions API.
///
/// # API Key Security
///
/// The API key is stored as a [`SecretString`] and is only exposed when
/// building the `Authorization` header. The client does not derive Debug.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    /// Create a client. `api_key` may be `None` for local servers that do
    /// not check authentication.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Create a client from the `[llm]` configuration section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            LlmError::Transport(err.to_string())
        }
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if request.messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "completion request has no messages".to_string(),
            ));
        }

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatCompletionMessage {
                    role: m.role.to_string(),
                    content: &m.content,
                })
                .collect(),
        };

        let mut builder = self.client.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(&response);
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited {
                    retry_after_secs: retry_after,
                },
                code => LlmError::Status {
                    status: code,
                    body: error_body,
                },
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                LlmError::Deserialization(format!("failed to parse response: {e}"))
            }
        })?;

        let usage = parsed.usage.unwrap_or_default();
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(LlmError::EmptyCompletion);
        };
        // A null content (refusal, tool call) has no text to store as a reply.
        let Some(content) = choice.message.content else {
            return Err(LlmError::EmptyCompletion);
        };

        debug!(
            model = parsed.model.as_deref().unwrap_or(&request.model),
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            finish_reason = ?choice.finish_reason,
            "Completion received"
        );

        Ok(CompletionResponse {
            id: parsed.id,
            message: Message {
                role: MessageRole::Assistant,
                content,
            },
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            finish_reason: choice.finish_reason,
            usage: Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(
            format!("{}/v1", server.uri()),
            Some(SecretString::from("sk-test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::system("be brief"), Message::user("Hello")],
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"},
                    {"index": 1, "message": {"role": "assistant", "content": "Ignored"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).complete(&request()).await.unwrap();
        assert_eq!(response.message, Message::assistant("Hi there"));
        assert_eq!(response.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[tokio::test]
    async fn test_zero_choices_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(err.is_empty_completion());
    }

    #[tokio::test]
    async fn test_null_content_is_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": null}}
                ]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(err.is_empty_completion());
    }

    #[tokio::test]
    async fn test_from_config_sends_configured_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-from-config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = LlmConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some(SecretString::from("sk-from-config".to_string())),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::from_config(&config).unwrap();
        let response = client.complete(&request()).await.unwrap();
        assert_eq!(response.message, Message::assistant("ok"));
    }

    #[tokio::test]
    async fn test_status_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_and_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.complete(&request()).await.unwrap_err(),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            client.complete(&request()).await.unwrap_err(),
            LlmError::RateLimited {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_deserialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let client = OpenAiCompatibleClient::new(
            server.uri(),
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Nothing listens on port 9 (discard) on CI hosts.
        let client =
            OpenAiCompatibleClient::new("http://127.0.0.1:9/v1", None, Duration::from_secs(2))
                .unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_) | LlmError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected_locally() {
        let client =
            OpenAiCompatibleClient::new("http://127.0.0.1:9/v1", None, Duration::from_secs(1))
                .unwrap();
        let err = client
            .complete(&CompletionRequest {
                model: "m".to_string(),
                messages: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let config = LlmConfig {
            base_url: "http://localhost:4000/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::from_config(&config).unwrap();
        assert_eq!(client.url(), "http://localhost:4000/v1/chat/completions");
        assert_eq!(client.name(), "openai_compatible");
    }
}

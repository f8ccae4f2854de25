use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::CompletionConfig;
use crate::errors::{CompletionError, CompletionResult};
use crate::types::*;

/// Opaque text-generation capability used by the conversation pipeline.
///
/// Implementations perform exactly one upstream call per invocation and never retry.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn invoke(&self, prompt: &Prompt) -> CompletionResult<String>;
}

/// Type alias for Arc-wrapped CompletionGateway trait objects
pub type CompletionGatewayRef = Arc<dyn CompletionGateway>;

/// Client for an OpenAI-compatible chat completion API
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiClient {
    /// Create a new client. A missing credential is not an error here; it is
    /// reported as [`CompletionError::Unconfigured`] on every invocation.
    pub fn new(config: CompletionConfig) -> anyhow::Result<Self> {
        if config.credential().is_none() {
            warn!("No completion API key configured; completion calls will fail");
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.credential().is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Helper method to extract text from a response
    pub fn extract_text_from_response(response: &ChatCompletionResponse) -> CompletionResult<String> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| CompletionError::Upstream("No choices in response".to_string()))?;

        let text = choice
            .message
            .as_ref()
            .and_then(|message| message.content.as_ref())
            .ok_or_else(|| CompletionError::Upstream("No text in choice".to_string()))?;

        Ok(text.clone())
    }
}

fn transport_error(err: reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Upstream(format!("Failed to send request: {}", err))
    }
}

#[async_trait]
impl CompletionGateway for OpenAiClient {
    async fn invoke(&self, prompt: &Prompt) -> CompletionResult<String> {
        let api_key = self.config.credential().ok_or_else(|| {
            CompletionError::Unconfigured("API key is required to call the completion service".to_string())
        })?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: &prompt.messages,
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
        };

        debug!(
            model = %self.config.model,
            messages = prompt.messages.len(),
            chars = prompt.char_len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = match serde_json::from_str::<UpstreamErrorResponse>(&body) {
                Ok(parsed) => parsed.error.message,
                Err(_) => body,
            };
            return Err(CompletionError::Upstream(format!(
                "HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            CompletionError::Upstream(format!("Failed to parse response: {}", e))
        })?;

        Self::extract_text_from_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn spawn_upstream(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    fn config_for(addr: SocketAddr) -> CompletionConfig {
        CompletionConfig {
            api_key: Some("sk-test".to_string()),
            base_url: format!("http://{}/v1/", addr),
            timeout_ms: 2_000,
            ..CompletionConfig::default()
        }
    }

    fn prompt() -> Prompt {
        Prompt::new(vec![ChatMessage::system("rules"), ChatMessage::user("question")])
    }

    #[tokio::test]
    async fn returns_first_choice_text() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["messages"][1]["role"], "user");
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Strong match" } }]
                }))
            }),
        );
        let client = OpenAiClient::new(config_for(spawn_upstream(app).await)).unwrap();

        assert_eq!(client.invoke(&prompt()).await.unwrap(), "Strong match");
    }

    #[tokio::test]
    async fn missing_key_is_unconfigured_without_network() {
        let config = CompletionConfig {
            api_key: None,
            // Nothing listens here; reaching the network would produce Upstream instead.
            base_url: "http://127.0.0.1:9/v1".to_string(),
            ..CompletionConfig::default()
        };
        let client = OpenAiClient::new(config).unwrap();

        assert!(!client.is_configured());
        let err = client.invoke(&prompt()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Unconfigured(_)));
    }

    #[tokio::test]
    async fn error_status_maps_to_upstream_with_message() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": { "message": "Incorrect API key", "type": "invalid_request_error" } })),
                )
            }),
        );
        let client = OpenAiClient::new(config_for(spawn_upstream(app).await)).unwrap();

        match client.invoke(&prompt()).await.unwrap_err() {
            CompletionError::Upstream(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn body_without_text_is_upstream() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let client = OpenAiClient::new(config_for(spawn_upstream(app).await)).unwrap();

        let err = client.invoke(&prompt()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Upstream(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "choices": [] }))
            }),
        );
        let mut config = config_for(spawn_upstream(app).await);
        config.timeout_ms = 100;
        let client = OpenAiClient::new(config).unwrap();

        let err = client.invoke(&prompt()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Timeout));
        assert_eq!(err.kind(), "timeout");
    }
}

//! OpenAI-compatible completion relay for ChatRelay
//!
//! This module implements [`CompletionProvider`] against any endpoint that
//! speaks the OpenAI `/chat/completions` contract (Groq by default). It
//! supports one-shot completions and token streaming, normalizing the
//! provider's `data:` event stream into a plain sequence of content deltas.

use crate::config::ProviderConfig;
use crate::error::{ChatRelayError, Result};
use crate::providers::sse::{data_payloads, DONE_SENTINEL};
use crate::providers::{Completion, CompletionParams, CompletionProvider, DeltaStream, Message};

use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection establishment timeout for upstream requests
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay to an OpenAI-compatible chat completions API
///
/// # Examples
///
/// ```no_run
/// use chatrelay::config::ProviderConfig;
/// use chatrelay::providers::{CompletionParams, CompletionProvider, Message, OpenAiCompatibleProvider};
///
/// # async fn example() -> chatrelay::error::Result<()> {
/// let config = ProviderConfig {
///     api_key: Some("gsk_0123456789".to_string()),
///     ..ProviderConfig::default()
/// };
/// let provider = OpenAiCompatibleProvider::new(&config)?;
/// let completion = provider
///     .complete(&[Message::user("Hello!")], CompletionParams::default())
///     .await?;
/// println!("{}", completion.content);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
    request_timeout: Duration,
}

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

/// One streamed `chat.completion.chunk` event
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Create a new relay from provider configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ChatRelayError::Config("provider API key is required".to_string()))?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatRelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: config.provider_type.clone(),
            endpoint: format!("{}/chat/completions", config.resolved_api_base()),
            model: config.resolved_model(),
            api_key,
            request_timeout: config.request_timeout(),
        })
    }

    /// Model requested from the provider
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [Message],
        params: CompletionParams,
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature_or_default(),
            max_tokens: params.max_tokens_or_default(),
            stream,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, "Upstream request failed: {}", e);
                ChatRelayError::upstream(None, format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %self.name,
                status = status.as_u16(),
                body = %body,
                "Upstream provider returned error"
            );
            return Err(ChatRelayError::upstream(Some(status.as_u16()), body).into());
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<Completion> {
        let body = self.request_body(messages, params, false);

        tracing::debug!(
            provider = %self.name,
            model = %self.model,
            messages = messages.len(),
            "Sending completion request"
        );

        let response = self
            .send(
                self.client
                    .post(&self.endpoint)
                    .timeout(self.request_timeout)
                    .json(&body),
            )
            .await?;

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(provider = %self.name, "Failed to parse completion response: {}", e);
            ChatRelayError::upstream(None, format!("invalid response body: {}", e))
        })?;

        Ok(Completion {
            content: first_choice_content(&raw),
            raw,
        })
    }

    async fn stream_complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<DeltaStream> {
        let body = self.request_body(messages, params, true);

        tracing::debug!(
            provider = %self.name,
            model = %self.model,
            messages = messages.len(),
            "Opening streaming completion"
        );

        let response = self
            .send(
                self.client
                    .post(&self.endpoint)
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(&body),
            )
            .await?;

        Ok(content_deltas(data_payloads(response.bytes_stream())))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Extracts `choices[0].message.content` from a one-shot response body
fn first_choice_content(raw: &serde_json::Value) -> String {
    raw.pointer("/choices/0/message/content")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Normalizes provider `data:` payloads into content deltas
///
/// Stops at the `[DONE]` sentinel. Role-only and empty deltas are dropped;
/// malformed chunks are logged and skipped without ending the stream.
pub(crate) fn content_deltas<S, E>(payloads: S) -> DeltaStream
where
    S: Stream<Item = std::result::Result<String, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let deltas = payloads
        .take_while(|item| future::ready(!matches!(item, Ok(p) if p == DONE_SENTINEL)))
        .filter_map(|item| {
            future::ready(match item {
                Ok(payload) => parse_chunk(&payload).map(Ok),
                Err(e) => {
                    tracing::error!("Upstream stream interrupted: {}", e);
                    let err: anyhow::Error =
                        ChatRelayError::upstream(None, format!("stream interrupted: {}", e)).into();
                    Some(Err(err))
                }
            })
        });

    Box::pin(deltas)
}

fn parse_chunk(payload: &str) -> Option<String> {
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty()),
        Err(e) => {
            let err = ChatRelayError::ChunkDecode(e.to_string());
            tracing::warn!(data = %payload, "Skipping streamed chunk: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]}).to_string()
    }

    async fn deltas_of(payloads: Vec<std::result::Result<String, String>>) -> Vec<String> {
        content_deltas(futures::stream::iter(payloads))
            .map(|d| d.expect("no errors"))
            .collect()
            .await
    }

    #[test]
    fn test_provider_requires_api_key() {
        let result = OpenAiCompatibleProvider::new(&ProviderConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_endpoint_from_config() {
        let config = ProviderConfig {
            api_key: Some("gsk_0123456789".to_string()),
            api_base: Some("http://127.0.0.1:1234/v1".to_string()),
            ..ProviderConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint, "http://127.0.0.1:1234/v1/chat/completions");
        assert_eq!(provider.model(), "llama3-70b-8192");
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_request_body_applies_defaults() {
        let config = ProviderConfig {
            api_key: Some("gsk_0123456789".to_string()),
            ..ProviderConfig::default()
        };
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        let messages = vec![Message::user("hi")];
        let body = provider.request_body(&messages, CompletionParams::default(), true);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_first_choice_content() {
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi"}}]
        });
        assert_eq!(first_choice_content(&raw), "Hi");
        assert_eq!(first_choice_content(&serde_json::json!({"choices": []})), "");
    }

    #[tokio::test]
    async fn test_content_deltas_skips_role_only_and_empty() {
        let role_only =
            serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]}).to_string();
        let deltas = deltas_of(vec![
            Ok(role_only),
            Ok(chunk("Hel")),
            Ok(chunk("")),
            Ok(chunk("lo")),
        ])
        .await;
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_content_deltas_stops_at_done() {
        let deltas = deltas_of(vec![
            Ok(chunk("a")),
            Ok(DONE_SENTINEL.to_string()),
            Ok(chunk("never")),
        ])
        .await;
        assert_eq!(deltas, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_content_deltas_tolerates_malformed_chunk() {
        let deltas = deltas_of(vec![
            Ok(chunk("a")),
            Ok("{not json".to_string()),
            Ok(chunk("b")),
        ])
        .await;
        assert_eq!(deltas, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_content_deltas_surfaces_transport_error() {
        let items: Vec<_> = content_deltas(futures::stream::iter(vec![
            Ok(chunk("a")),
            Err("connection reset".to_string()),
        ]))
        .collect()
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        let err = items[1].as_ref().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatRelayError>(),
            Some(ChatRelayError::Upstream { status: None, .. })
        ));
    }
}

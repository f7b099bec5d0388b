//! HTTP client for the chat API

use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{ChatRelayError, Result};
use crate::providers::sse::{data_payloads, PayloadError};
use crate::providers::{CompletionParams, Message};

/// `data:` payloads of a streaming chat response
pub type PayloadStream =
    Pin<Box<dyn Stream<Item = std::result::Result<String, PayloadError<reqwest::Error>>> + Send>>;

/// Body of `POST /chat` as sent by the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutgoingChatRequest {
    /// Conversation history to send
    pub messages: Vec<Message>,
    /// Server conversation to continue
    #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Stream the reply
    pub stream: bool,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl OutgoingChatRequest {
    /// Builds a request from history and sampling parameters
    pub fn new(
        messages: Vec<Message>,
        conversation_id: Option<String>,
        params: CompletionParams,
    ) -> Self {
        Self {
            messages,
            conversation_id,
            stream: false,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

/// Non-streaming chat reply
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// Assistant reply
    pub content: String,
    /// Server conversation id
    pub conversation_id: String,
    /// Provider response
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

/// Health check reply
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HealthReply {
    /// `"ok"` when healthy
    pub status: String,
    /// Server time
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Server-side transcript as returned by `GET /conversations/:id`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConversation {
    /// Server conversation id
    pub id: String,
    /// Stored messages, oldest first
    pub messages: Vec<Message>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Client for a running chat server
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl ChatClient {
    /// Creates a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| ChatRelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a chat turn and waits for the full reply
    ///
    /// Bounded by the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, timeout, non-success status, or
    /// an unreadable body.
    pub async fn send_message(&self, request: &OutgoingChatRequest) -> Result<ChatReply> {
        let body = OutgoingChatRequest {
            stream: false,
            ..request.clone()
        };

        let response = self
            .http
            .post(self.url("/chat"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatRelayError::Client(format!("Chat request failed: {}", status)).into());
        }

        response
            .json::<ChatReply>()
            .await
            .map_err(|e| ChatRelayError::Client(format!("Unreadable chat reply: {}", e)).into())
    }

    /// Opens a streaming chat turn and returns its `data:` payloads
    ///
    /// No timeout applies once the response has started.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status.
    pub async fn stream_message(&self, request: &OutgoingChatRequest) -> Result<PayloadStream> {
        let body = OutgoingChatRequest {
            stream: true,
            ..request.clone()
        };

        let response = self
            .http
            .post(self.url("/chat"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                ChatRelayError::Client(format!("Streaming request failed: {}", status)).into(),
            );
        }

        Ok(Box::pin(data_payloads(response.bytes_stream())))
    }

    /// Calls the health endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or not healthy.
    pub async fn health_check(&self) -> Result<HealthReply> {
        let response = self
            .http
            .get(self.url("/health"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatRelayError::Client(format!("Health check failed: {}", status)).into());
        }
        Ok(response.json().await?)
    }

    /// Fetches the server transcript of a conversation
    ///
    /// Returns `None` if the server does not know the id (or it expired).
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or an unexpected status.
    pub async fn get_conversation_history(&self, id: &str) -> Result<Option<RemoteConversation>> {
        let response = self
            .http
            .get(self.url(&format!("/conversations/{}", id)))
            .timeout(self.request_timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ChatRelayError::Client(format!(
                "Conversation lookup failed: {}",
                status
            ))
            .into()),
        }
    }

    /// Deletes the server transcript of a conversation
    ///
    /// Returns whether the server had it.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or an unexpected status.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let response = self
            .http
            .delete(self.url(&format!("/conversations/{}", id)))
            .timeout(self.request_timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(ChatRelayError::Client(format!(
                "Conversation delete failed: {}",
                status
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_absent_fields() {
        let request = OutgoingChatRequest::new(
            vec![Message::user("hi")],
            None,
            CompletionParams::default(),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn test_request_includes_conversation_and_params() {
        let request = OutgoingChatRequest::new(
            vec![Message::user("hi")],
            Some("abc".to_string()),
            CompletionParams {
                temperature: Some(0.7),
                max_tokens: Some(2048),
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["conversationId"], "abc");
        assert_eq!(json["max_tokens"], 2048);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ClientConfig {
            server_url: "http://localhost:3000/api/v1/".to_string(),
            ..ClientConfig::default()
        };
        let client = ChatClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api/v1");
        assert_eq!(client.url("/chat"), "http://localhost:3000/api/v1/chat");
    }

    #[test]
    fn test_remote_conversation_ignores_timestamps_on_entries() {
        let body = serde_json::json!({
            "id": "abc",
            "messages": [{"role": "user", "content": "hi", "timestamp": "2024-01-01T00:00:00Z"}],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let remote: RemoteConversation = serde_json::from_value(body).unwrap();
        assert_eq!(remote.messages, vec![Message::user("hi")]);
    }
}

//! Base provider trait and common types for ChatRelay
//!
//! This module defines the [`CompletionProvider`] trait that every upstream
//! completion provider implements, along with the message and parameter
//! types shared by the relay, the chat endpoint, and the client.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Default sampling temperature when a request does not specify one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default completion token limit when a request does not specify one
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions layered on top of the conversation
    System,
    /// A human turn
    User,
    /// A model turn
    Assistant,
}

impl Role {
    /// Parses a wire role name
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::providers::Role;
    ///
    /// assert_eq!(Role::parse("user"), Some(Role::User));
    /// assert_eq!(Role::parse("tool"), None);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for conversation
///
/// Represents a single turn in a conversation. The same shape is used on the
/// client wire format, in the conversation store, and in upstream requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Creates a new message with an explicit role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::providers::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::providers::{Message, Role};
    ///
    /// let msg = Message::assistant("Hello, user!");
    /// assert_eq!(msg.role, Role::Assistant);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new system message
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::providers::{Message, Role};
    ///
    /// let msg = Message::system("You are a helpful assistant");
    /// assert_eq!(msg.role, Role::System);
    /// ```
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Optional sampling parameters for a completion request
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionParams {
    /// Sampling temperature in `[0, 2]`
    pub temperature: Option<f64>,
    /// Maximum completion tokens in `[1, 4096]`
    pub max_tokens: Option<u32>,
}

impl CompletionParams {
    /// Temperature to send upstream, falling back to the default
    ///
    /// # Examples
    ///
    /// ```
    /// use chatrelay::providers::CompletionParams;
    ///
    /// let params = CompletionParams::default();
    /// assert_eq!(params.temperature_or_default(), 0.7);
    /// assert_eq!(params.max_tokens_or_default(), 512);
    /// ```
    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Token limit to send upstream, falling back to the default
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// Result of a one-shot completion
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Text of the first choice, empty if the provider returned none
    pub content: String,
    /// Provider response body, passed through to the caller untouched
    pub raw: serde_json::Value,
}

/// Lazy, forward-only sequence of text deltas from a streaming completion
///
/// Items are content fragments in arrival order. An `Err` item means the
/// connection failed mid-stream; the stream ends after it.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Capability interface over an upstream completion provider
///
/// The chat endpoint only talks to this trait, so alternate providers can be
/// substituted without touching request handling.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Completes a conversation in a single blocking round trip
    ///
    /// # Errors
    ///
    /// Returns `ChatRelayError::Upstream` if the provider responds with a
    /// non-success status or the transport fails.
    async fn complete(&self, messages: &[Message], params: CompletionParams)
        -> Result<Completion>;

    /// Opens a streaming completion and returns its content deltas
    ///
    /// # Errors
    ///
    /// Returns `ChatRelayError::Upstream` if the connection cannot be opened
    /// or the provider rejects the request before streaming begins.
    async fn stream_complete(
        &self,
        messages: &[Message],
        params: CompletionParams,
    ) -> Result<DeltaStream>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}

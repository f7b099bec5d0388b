//! In-process scripted provider for unit and integration tests
//!
//! [`FakeProvider`] implements [`CompletionProvider`] without any network
//! I/O. Each call replays a [`Script`] and records the context it was given,
//! so tests can assert both what the endpoint sent upstream and how it
//! handled the reply.
//!
//! # Example
//!
//! ```
//! use chatrelay::providers::fake::{FakeProvider, Script};
//! use chatrelay::providers::{CompletionParams, CompletionProvider, Message};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = FakeProvider::new(Script::reply(["Hel", "lo"]));
//! let completion = provider
//!     .complete(&[Message::user("hi")], CompletionParams::default())
//!     .await
//!     .unwrap();
//! assert_eq!(completion.content, "Hello");
//! assert_eq!(provider.calls()[0], vec![Message::user("hi")]);
//! # }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ChatRelayError, Result};
use crate::providers::{Completion, CompletionParams, CompletionProvider, DeltaStream, Message};

/// Scripted behaviour for the next provider calls
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Succeed; stream these deltas, or their concatenation for one-shot calls
    Reply(Vec<String>),
    /// Fail before any output with this upstream status
    Fail {
        /// Status reported in the upstream error
        status: u16,
        /// Body reported in the upstream error
        message: String,
    },
    /// Stream these deltas, then fail the connection
    FailMidStream {
        /// Deltas delivered before the failure
        deltas: Vec<String>,
        /// Transport error text
        message: String,
    },
}

impl Script {
    /// Convenience constructor for [`Script::Reply`]
    pub fn reply<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply(deltas.into_iter().map(Into::into).collect())
    }
}

/// Provider double that replays a [`Script`]
#[derive(Debug)]
pub struct FakeProvider {
    script: Mutex<Script>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl FakeProvider {
    /// Creates a provider that replays `script` on every call
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the script for subsequent calls
    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = script;
    }

    /// Upstream contexts received so far, one entry per call
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, messages: &[Message]) -> Script {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        self.script.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _params: CompletionParams,
    ) -> Result<Completion> {
        match self.record(messages) {
            Script::Reply(deltas) => {
                let content = deltas.concat();
                let raw = serde_json::json!({
                    "object": "chat.completion",
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                });
                Ok(Completion { content, raw })
            }
            Script::Fail { status, message } => {
                Err(ChatRelayError::upstream(Some(status), message).into())
            }
            Script::FailMidStream { message, .. } => {
                Err(ChatRelayError::upstream(None, message).into())
            }
        }
    }

    async fn stream_complete(
        &self,
        messages: &[Message],
        _params: CompletionParams,
    ) -> Result<DeltaStream> {
        let items: Vec<Result<String>> = match self.record(messages) {
            Script::Reply(deltas) => deltas.into_iter().map(Ok).collect(),
            Script::Fail { status, message } => {
                return Err(ChatRelayError::upstream(Some(status), message).into())
            }
            Script::FailMidStream { deltas, message } => deltas
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(
                    ChatRelayError::upstream(None, message).into()
                )))
                .collect(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_replays_deltas() {
        let provider = FakeProvider::new(Script::reply(["a", "b", "c"]));
        let stream = provider
            .stream_complete(&[Message::user("x")], CompletionParams::default())
            .await
            .unwrap();
        let deltas: Vec<String> = stream.map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fail_script_fails_to_open() {
        let provider = FakeProvider::new(Script::Fail {
            status: 500,
            message: "boom".to_string(),
        });
        let result = provider
            .stream_complete(&[Message::user("x")], CompletionParams::default())
            .await;
        assert!(result.is_err());
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_mid_stream_ends_with_error() {
        let provider = FakeProvider::new(Script::FailMidStream {
            deltas: vec!["a".to_string()],
            message: "reset".to_string(),
        });
        let items: Vec<_> = provider
            .stream_complete(&[Message::user("x")], CompletionParams::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}

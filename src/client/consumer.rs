//! Streaming consumer for chat replies
//!
//! Tracks one streaming request through
//! `Idle -> Connecting -> Receiving -> Completed | Failed`. While receiving,
//! each `data:` payload is interpreted as one event; content events grow
//! the accumulated reply, and the caller is handed the total text so far
//! (never just the delta) so a redraw always shows the whole reply.

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::{ChatRelayError, Result};
use crate::providers::sse::DONE_SENTINEL;

/// Lifecycle of one streaming request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// No request issued yet
    Idle,
    /// Request sent, waiting for the response
    Connecting,
    /// Reading events
    Receiving,
    /// Stream ended normally
    Completed,
    /// Stream failed; the reply should be replaced by a failure message
    Failed,
}

/// One decoded server event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A content delta
    Content(String),
    /// Successful end of stream, with the server conversation id if given
    Done {
        /// Id the server stored the reply under
        conversation_id: Option<String>,
    },
    /// Server-reported failure
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Interprets one `data:` payload
///
/// Returns `None` for payloads that carry nothing actionable (unparseable
/// JSON, empty content, unknown shapes).
///
/// # Examples
///
/// ```
/// use chatrelay::client::consumer::{parse_event, StreamEvent};
///
/// assert_eq!(parse_event(r#"{"content":"Hi"}"#), Some(StreamEvent::Content("Hi".into())));
/// assert_eq!(parse_event("[DONE]"), Some(StreamEvent::Done { conversation_id: None }));
/// assert_eq!(parse_event("garbage"), None);
/// ```
pub fn parse_event(payload: &str) -> Option<StreamEvent> {
    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done {
            conversation_id: None,
        });
    }

    let event: WireEvent = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(data = %payload, "Failed to parse stream event: {}", e);
            return None;
        }
    };

    if let Some(content) = event.content.filter(|c| !c.is_empty()) {
        return Some(StreamEvent::Content(content));
    }
    if let Some(error) = event.error {
        return Some(StreamEvent::Error(error));
    }
    if event.kind.as_deref() == Some("done") {
        return Some(StreamEvent::Done {
            conversation_id: event.conversation_id,
        });
    }
    None
}

/// Result of a completed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Full reply text
    pub content: String,
    /// Server conversation id from the terminal event, if any
    pub conversation_id: Option<String>,
}

/// State machine for one streaming request
#[derive(Debug)]
pub struct StreamConsumer {
    state: ConsumerState,
    content: String,
    conversation_id: Option<String>,
}

impl Default for StreamConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamConsumer {
    /// Creates an idle consumer
    pub fn new() -> Self {
        Self {
            state: ConsumerState::Idle,
            content: String::new(),
            conversation_id: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Marks the request as issued
    pub fn connecting(&mut self) {
        self.state = ConsumerState::Connecting;
    }

    /// Marks the request as failed
    pub fn fail(&mut self) {
        self.state = ConsumerState::Failed;
    }

    /// Reads payloads until the stream ends
    ///
    /// `on_content` is called with the accumulated reply after every
    /// content event.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails or the server sends an error
    /// event. The consumer is left in [`ConsumerState::Failed`].
    pub async fn consume<S, E, F>(&mut self, payloads: S, mut on_content: F) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<String, E>>,
        E: std::fmt::Display,
        F: FnMut(&str),
    {
        self.state = ConsumerState::Receiving;
        futures::pin_mut!(payloads);

        while let Some(item) = payloads.next().await {
            let payload = match item {
                Ok(payload) => payload,
                Err(e) => {
                    self.state = ConsumerState::Failed;
                    return Err(ChatRelayError::Client(format!("Stream read failed: {}", e)).into());
                }
            };

            match parse_event(&payload) {
                Some(StreamEvent::Content(delta)) => {
                    self.content.push_str(&delta);
                    on_content(&self.content);
                }
                Some(StreamEvent::Done { conversation_id }) => {
                    if conversation_id.is_some() {
                        self.conversation_id = conversation_id;
                    }
                    break;
                }
                Some(StreamEvent::Error(message)) => {
                    self.state = ConsumerState::Failed;
                    return Err(ChatRelayError::Client(format!("Server reported: {}", message)).into());
                }
                None => {}
            }
        }

        self.state = ConsumerState::Completed;
        Ok(StreamOutcome {
            content: self.content.clone(),
            conversation_id: self.conversation_id.clone(),
        })
    }
}

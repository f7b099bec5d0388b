//! Send orchestration for the chat client
//!
//! A send inserts the user turn optimistically, adds an empty assistant
//! placeholder, and fills the placeholder as the reply arrives. The
//! placeholder is tracked by [`MessageId`], so later insertions cannot
//! redirect updates to the wrong message. Whatever the outcome, the busy
//! flags are cleared before the call returns.

use crate::client::api::{ChatClient, OutgoingChatRequest};
use crate::client::consumer::StreamConsumer;
use crate::client::state::{ClientState, MessageId};
use crate::config::ClientConfig;
use crate::error::{ChatRelayError, Result};
use crate::providers::{CompletionParams, Message};

/// Text shown in place of a reply that could not be produced
pub const FAILURE_TEXT: &str = "Sorry, an error occurred while processing your request.";

/// Outcome of one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Client conversation the turn was added to
    pub conversation_id: String,
    /// Assistant message holding the reply
    pub reply_id: MessageId,
    /// Final text of the assistant message
    pub reply: String,
    /// False if the reply was replaced by [`FAILURE_TEXT`]
    pub succeeded: bool,
}

/// A chat client bound to local conversation state
#[derive(Debug)]
pub struct ChatSession {
    client: ChatClient,
    state: ClientState,
    params: CompletionParams,
    system_prompt: Option<String>,
    streaming: bool,
}

impl ChatSession {
    /// Creates a session with empty local state
    pub fn new(client: ChatClient, config: &ClientConfig) -> Self {
        Self {
            client,
            state: ClientState::new(),
            params: CompletionParams {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
            },
            system_prompt: None,
            streaming: true,
        }
    }

    /// Sends a system prompt with every request
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    /// Chooses between streamed and one-shot replies
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Local conversation state
    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Mutable local conversation state
    pub fn state_mut(&mut self) -> &mut ClientState {
        &mut self.state
    }

    /// Underlying API client
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Sends a user turn in the active conversation
    ///
    /// Creates a conversation if none is active. `on_update` receives the
    /// reply text so far each time it grows. It is not called with
    /// [`FAILURE_TEXT`]; check [`SendReport::succeeded`] instead.
    ///
    /// # Errors
    ///
    /// Returns error only if a request is already in progress. Request
    /// failures are reported through [`SendReport::succeeded`].
    pub async fn send<F>(&mut self, content: &str, mut on_update: F) -> Result<SendReport>
    where
        F: FnMut(&str),
    {
        if self.state.is_busy() {
            return Err(
                ChatRelayError::Client("a request is already in progress".to_string()).into(),
            );
        }

        let conversation_id = match self.state.current_conversation_id() {
            Some(id) => id.to_string(),
            None => self.state.create_conversation(),
        };

        self.state.add_message(&conversation_id, Message::user(content));

        let (history, server_id) = match self.state.conversation(&conversation_id) {
            Some(c) => (c.history(), c.server_conversation_id.clone()),
            None => (vec![Message::user(content)], None),
        };
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        messages.extend(history);
        let request = OutgoingChatRequest::new(messages, server_id, self.params);

        let reply_id = match self
            .state
            .add_message(&conversation_id, Message::assistant(""))
        {
            Some(id) => id,
            None => {
                return Err(ChatRelayError::Client("conversation disappeared".to_string()).into())
            }
        };

        let outcome = if self.streaming {
            self.state.set_streaming(true);
            let outcome = self
                .stream_reply(&request, &conversation_id, reply_id, &mut on_update)
                .await;
            self.state.set_streaming(false);
            outcome
        } else {
            self.state.set_loading(true);
            let outcome = self.blocking_reply(&request).await;
            self.state.set_loading(false);
            outcome
        };

        let (reply, succeeded) = match outcome {
            Ok((reply, server_id)) => {
                if let Some(server_id) = server_id {
                    self.state.set_server_conversation_id(&conversation_id, &server_id);
                }
                (reply, true)
            }
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, "Chat request failed: {:#}", e);
                (FAILURE_TEXT.to_string(), false)
            }
        };

        self.state.update_message(&conversation_id, reply_id, &reply);
        if succeeded {
            on_update(&reply);
        }

        Ok(SendReport {
            conversation_id,
            reply_id,
            reply,
            succeeded,
        })
    }

    async fn stream_reply<F>(
        &mut self,
        request: &OutgoingChatRequest,
        conversation_id: &str,
        reply_id: MessageId,
        on_update: &mut F,
    ) -> Result<(String, Option<String>)>
    where
        F: FnMut(&str),
    {
        let mut consumer = StreamConsumer::new();
        consumer.connecting();

        let payloads = match self.client.stream_message(request).await {
            Ok(payloads) => payloads,
            Err(e) => {
                consumer.fail();
                return Err(e);
            }
        };

        let state = &mut self.state;
        let outcome = consumer
            .consume(payloads, |total| {
                state.update_message(conversation_id, reply_id, total);
                on_update(total);
            })
            .await?;

        Ok((outcome.content, outcome.conversation_id))
    }

    async fn blocking_reply(
        &self,
        request: &OutgoingChatRequest,
    ) -> Result<(String, Option<String>)> {
        let reply = self.client.send_message(request).await?;
        Ok((reply.content, Some(reply.conversation_id)))
    }
}

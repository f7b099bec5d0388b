//! Chat endpoint
//!
//! `POST /api/v1/chat` validates the body, merges the new user turn into the
//! conversation store, and relays the resulting context upstream. Replies
//! are returned either as one JSON object or as a server-push event stream.
//!
//! # Streaming protocol
//!
//! Each event is a single `data: <json>` line followed by a blank line:
//!
//! - `{"content": "..."}` for every delta, in arrival order
//! - `{"type": "done", "conversationId": "..."}` after the full reply was stored
//! - `{"error": "..."}` if the upstream failed; the stream then closes

use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::conversation::{ConversationStore, Upserted};
use crate::metrics::{ChatMode, RequestMetrics};
use crate::providers::{CompletionParams, Message, Role};
use crate::server::error::{ApiError, CHAT_FAILED};
use crate::server::validation::{parse_chat_request, ChatRequest};
use crate::server::AppState;

/// Message carried by the terminal error event
pub const STREAM_ERROR: &str = "Upstream provider error";

/// Buffered events between the relay task and the response body
const EVENT_BUFFER: usize = 32;

/// Non-streaming response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Assistant reply
    pub content: String,
    /// Conversation the reply was stored under
    pub conversation_id: String,
    /// Provider response, untouched
    pub raw: serde_json::Value,
}

/// One server-push event
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OutboundEvent<'a> {
    Delta {
        content: &'a str,
    },
    Done {
        #[serde(rename = "type")]
        kind: &'static str,
        #[serde(rename = "conversationId")]
        conversation_id: &'a str,
    },
    Error {
        error: &'static str,
    },
}

impl OutboundEvent<'_> {
    fn to_event(&self) -> Event {
        Event::default().json_data(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to encode stream event: {}", e);
            Event::default().data(r#"{"error":"Upstream provider error"}"#)
        })
    }
}

/// Upstream context resolved for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    /// Conversation the turn belongs to
    pub conversation_id: String,
    /// Request system messages followed by the stored history
    pub messages: Vec<Message>,
}

/// Merges the request into the store and builds the upstream context
///
/// Only a trailing `user` message is persisted. System messages from the
/// request are prepended to the stored history but never stored.
pub fn resolve_context(store: &ConversationStore, request: &ChatRequest) -> ChatContext {
    let user_message = request
        .messages
        .last()
        .filter(|m| m.role == Role::User)
        .cloned();

    let Upserted { id, history } = store.upsert(request.conversation_id.as_deref(), user_message);

    let mut messages: Vec<Message> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .cloned()
        .collect();
    messages.extend(history);

    ChatContext {
        conversation_id: id,
        messages,
    }
}

/// Handler for `POST /api/v1/chat`
pub async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    let request = parse_chat_request(&body).map_err(|violations| {
        tracing::debug!(violations = violations.len(), "Rejected chat request");
        ApiError::Validation(violations)
    })?;

    let context = resolve_context(&state.store, &request);
    tracing::debug!(
        conversation_id = %context.conversation_id,
        context_messages = context.messages.len(),
        stream = request.stream,
        "Resolved chat context"
    );

    if request.stream {
        Ok(stream_reply(state, context, request.params))
    } else {
        blocking_reply(state, context, request.params).await
    }
}

async fn blocking_reply(
    state: AppState,
    context: ChatContext,
    params: CompletionParams,
) -> Result<Response, ApiError> {
    let metrics = RequestMetrics::new(ChatMode::Blocking);

    match state.provider.complete(&context.messages, params).await {
        Ok(completion) => {
            persist_reply(&state.store, &context.conversation_id, &completion.content);
            metrics.record_completion();
            Ok(Json(ChatResponse {
                content: completion.content,
                conversation_id: context.conversation_id,
                raw: completion.raw,
            })
            .into_response())
        }
        Err(e) => {
            tracing::error!(
                conversation_id = %context.conversation_id,
                "Chat completion error: {:#}",
                e
            );
            metrics.record_error("upstream");
            Err(ApiError::Internal(CHAT_FAILED))
        }
    }
}

fn stream_reply(state: AppState, context: ChatContext, params: CompletionParams) -> Response {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(relay_stream(state, context, params, tx));

    let events = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(events).into_response()
}

/// Drives one upstream stream into the response channel
///
/// The reply is stored only if the upstream finished cleanly. A closed
/// channel means the client went away; relaying stops without storing.
async fn relay_stream(
    state: AppState,
    context: ChatContext,
    params: CompletionParams,
    tx: mpsc::Sender<Event>,
) {
    let metrics = RequestMetrics::new(ChatMode::Stream);
    let id = context.conversation_id.as_str();

    let mut deltas = match state.provider.stream_complete(&context.messages, params).await {
        Ok(deltas) => deltas,
        Err(e) => {
            tracing::error!(conversation_id = %id, "Streaming chat error: {:#}", e);
            metrics.record_error("upstream");
            let _ = tx.send(OutboundEvent::Error { error: STREAM_ERROR }.to_event()).await;
            return;
        }
    };

    let mut reply = String::new();
    while let Some(item) = deltas.next().await {
        match item {
            Ok(delta) => {
                reply.push_str(&delta);
                let event = OutboundEvent::Delta { content: &delta }.to_event();
                if tx.send(event).await.is_err() {
                    tracing::info!(conversation_id = %id, "Client disconnected mid-stream");
                    metrics.record_error("disconnected");
                    return;
                }
            }
            Err(e) => {
                tracing::error!(conversation_id = %id, "Streaming chat error: {:#}", e);
                metrics.record_error("stream_interrupted");
                let _ = tx.send(OutboundEvent::Error { error: STREAM_ERROR }.to_event()).await;
                return;
            }
        }
    }

    persist_reply(&state.store, id, &reply);
    let done = OutboundEvent::Done {
        kind: "done",
        conversation_id: id,
    };
    let _ = tx.send(done.to_event()).await;
    metrics.record_completion();
}

fn persist_reply(store: &ConversationStore, conversation_id: &str, content: &str) {
    if content.trim().is_empty() {
        tracing::debug!(conversation_id = %conversation_id, "Empty reply, not stored");
        return;
    }
    if store
        .append(conversation_id, Message::assistant(content))
        .is_none()
    {
        tracing::warn!(
            conversation_id = %conversation_id,
            "Conversation expired before the reply could be stored"
        );
    }
}

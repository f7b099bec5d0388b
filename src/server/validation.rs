//! Chat request validation
//!
//! The request body is inspected as raw JSON so that every offending field
//! is reported at once, rather than stopping at the first deserialization
//! error. Unknown fields are ignored.

use serde_json::{Map, Value};

use crate::error::FieldViolation;
use crate::providers::{CompletionParams, Message, Role};

/// Upper bound for `max_tokens`
pub const MAX_TOKENS_LIMIT: u32 = 4096;

/// A validated `POST /chat` body
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Non-empty message list; the last entry is the new turn
    pub messages: Vec<Message>,
    /// Conversation to continue; empty strings are treated as absent
    pub conversation_id: Option<String>,
    /// Stream deltas as server-push events
    pub stream: bool,
    /// Sampling parameters forwarded upstream
    pub params: CompletionParams,
}

/// Validates a raw request body
///
/// # Errors
///
/// Returns every field-level violation found.
///
/// # Examples
///
/// ```
/// use chatrelay::server::validation::parse_chat_request;
///
/// let request = parse_chat_request(br#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
/// assert!(!request.stream);
///
/// let violations = parse_chat_request(br#"{"messages":[],"temperature":3}"#).unwrap_err();
/// assert_eq!(violations.len(), 2);
/// ```
pub fn parse_chat_request(body: &[u8]) -> Result<ChatRequest, Vec<FieldViolation>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| vec![FieldViolation::new("body", "must be valid JSON")])?;
    let object = value
        .as_object()
        .ok_or_else(|| vec![FieldViolation::new("body", "must be a JSON object")])?;

    let mut violations = Vec::new();

    let messages = parse_messages(object, &mut violations);
    let conversation_id = parse_conversation_id(object, &mut violations);
    let stream = match present(object, "stream") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            violations.push(FieldViolation::new("stream", "must be a boolean"));
            false
        }
    };
    let temperature = parse_temperature(object, &mut violations);
    let max_tokens = parse_max_tokens(object, &mut violations);

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(ChatRequest {
        messages,
        conversation_id,
        stream,
        params: CompletionParams {
            temperature,
            max_tokens,
        },
    })
}

/// Field value, treating JSON `null` as absent
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn parse_messages(object: &Map<String, Value>, violations: &mut Vec<FieldViolation>) -> Vec<Message> {
    let items = match present(object, "messages") {
        None => {
            violations.push(FieldViolation::new("messages", "is required"));
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            violations.push(FieldViolation::new("messages", "must be an array"));
            return Vec::new();
        }
    };

    if items.is_empty() {
        violations.push(FieldViolation::new("messages", "must contain at least 1 message"));
    }

    let mut messages = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(entry) = item.as_object() else {
            violations.push(FieldViolation::new(format!("messages[{}]", i), "must be an object"));
            continue;
        };

        let role = match entry.get("role").and_then(Value::as_str) {
            Some(name) => Role::parse(name),
            None => None,
        };
        if role.is_none() {
            violations.push(FieldViolation::new(
                format!("messages[{}].role", i),
                "must be one of system, user, assistant",
            ));
        }

        let content = match entry.get("content") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::String(_)) => {
                violations.push(FieldViolation::new(
                    format!("messages[{}].content", i),
                    "must not be empty",
                ));
                None
            }
            _ => {
                violations.push(FieldViolation::new(
                    format!("messages[{}].content", i),
                    "must be a string",
                ));
                None
            }
        };

        if let (Some(role), Some(content)) = (role, content) {
            messages.push(Message::new(role, content));
        }
    }
    messages
}

fn parse_conversation_id(
    object: &Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match present(object, "conversationId") {
        None => None,
        Some(Value::String(id)) if id.is_empty() => None,
        Some(Value::String(id)) => Some(id.clone()),
        Some(_) => {
            violations.push(FieldViolation::new("conversationId", "must be a string"));
            None
        }
    }
}

fn parse_temperature(object: &Map<String, Value>, violations: &mut Vec<FieldViolation>) -> Option<f64> {
    let value = present(object, "temperature")?;
    match value.as_f64() {
        Some(t) if (0.0..=2.0).contains(&t) => Some(t),
        Some(_) => {
            violations.push(FieldViolation::new("temperature", "must be between 0 and 2"));
            None
        }
        None => {
            violations.push(FieldViolation::new("temperature", "must be a number"));
            None
        }
    }
}

fn parse_max_tokens(object: &Map<String, Value>, violations: &mut Vec<FieldViolation>) -> Option<u32> {
    let value = present(object, "max_tokens")?;
    match value.as_f64() {
        Some(n) if !(1.0..=f64::from(MAX_TOKENS_LIMIT)).contains(&n) => {
            violations.push(FieldViolation::new(
                "max_tokens",
                format!("must be between 1 and {}", MAX_TOKENS_LIMIT),
            ));
            None
        }
        Some(n) if n.fract() != 0.0 => {
            violations.push(FieldViolation::new("max_tokens", "must be an integer"));
            None
        }
        Some(n) => Some(n as u32),
        None => {
            violations.push(FieldViolation::new("max_tokens", "must be a number"));
            None
        }
    }
}

//! OpenAPI description served at `GET /api/v1/docs`

use axum::Json;
use serde_json::{json, Value};

use crate::server::validation::MAX_TOKENS_LIMIT;

/// Builds the OpenAPI 3.0.3 document for the HTTP API
pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "ChatRelay API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Chat completions relay with server-side conversation memory"
        },
        "servers": [{ "url": "/api/v1", "description": "v1 base" }],
        "paths": {
            "/health": {
                "get": {
                    "summary": "Health check",
                    "responses": { "200": { "description": "OK" } }
                }
            },
            "/chat": { "post": chat_operation() },
            "/conversations/stats": {
                "get": {
                    "summary": "Conversation store statistics",
                    "responses": { "200": { "description": "Store occupancy" } }
                }
            },
            "/conversations/{id}": conversation_path()
        },
        "components": {}
    })
}

fn chat_request_schema() -> Value {
    let message = json!({
        "type": "object",
        "properties": {
            "role": { "type": "string", "enum": ["system", "user", "assistant"] },
            "content": { "type": "string", "minLength": 1 }
        },
        "required": ["role", "content"]
    });

    json!({
        "type": "object",
        "properties": {
            "messages": { "type": "array", "items": message, "minItems": 1 },
            "conversationId": { "type": "string" },
            "stream": { "type": "boolean", "default": false },
            "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
            "max_tokens": { "type": "integer", "minimum": 1, "maximum": MAX_TOKENS_LIMIT }
        },
        "required": ["messages"]
    })
}

fn chat_operation() -> Value {
    let reply = json!({
        "type": "object",
        "properties": {
            "content": { "type": "string" },
            "conversationId": { "type": "string" },
            "raw": { "type": "object" }
        }
    });

    json!({
        "summary": "Create chat completion",
        "description": "With `stream: true` the response is `text/event-stream`; \
            each event is `data: <json>` carrying `{content}`, then \
            `{type: \"done\", conversationId}` or `{error}`.",
        "requestBody": {
            "required": true,
            "content": { "application/json": { "schema": chat_request_schema() } }
        },
        "responses": {
            "200": {
                "description": "Chat response",
                "content": {
                    "application/json": { "schema": reply },
                    "text/event-stream": { "schema": { "type": "string" } }
                }
            },
            "400": { "description": "Validation failed" },
            "500": { "description": "Server error" }
        }
    })
}

fn conversation_path() -> Value {
    let missing = json!({ "description": "Unknown or expired conversation" });

    json!({
        "parameters": [{
            "name": "id", "in": "path", "required": true, "schema": { "type": "string" }
        }],
        "get": {
            "summary": "Fetch a stored conversation",
            "responses": { "200": { "description": "Conversation record" }, "404": missing.clone() }
        },
        "delete": {
            "summary": "Delete a stored conversation",
            "responses": { "204": { "description": "Deleted" }, "404": missing }
        }
    })
}

/// Handler for `GET /api/v1/docs`
pub async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

//! Conversation inspection routes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::conversation::{ConversationRecord, StoreStats};
use crate::server::error::ApiError;
use crate::server::AppState;

/// Handler for `GET /api/v1/conversations/stats`
pub async fn stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats())
}

/// Handler for `GET /api/v1/conversations/:id`
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationRecord>, ApiError> {
    state.store.get(&id).map(Json).ok_or(ApiError::NotFound)
}

/// Handler for `DELETE /api/v1/conversations/:id`
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.remove(&id) {
        tracing::info!(conversation_id = %id, "Conversation deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

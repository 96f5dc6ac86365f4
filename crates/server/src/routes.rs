//! Chat API routes.
//!
//! - `POST   /api/chat`                    — run one agent turn
//! - `GET    /api/conversations`           — list conversation summaries
//! - `GET    /api/conversations/{id}`      — fetch a full transcript
//! - `DELETE /api/conversations/{id}`      — delete a conversation
//! - `POST   /api/chat/rerun`              — edit a past message and replay

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use saleschat_agent::provider::classify_failure;
use saleschat_agent::runtime::{AgentRuntime, TurnOutcome};
use saleschat_core::conversation::{Conversation, ToolResult};
use saleschat_core::transcripts::TranscriptStore;

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub store: Arc<TranscriptStore>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RerunRequest {
    pub conversation_id: String,
    pub message_index: usize,
    #[serde(default)]
    pub new_message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub message: String,
    pub tool_results: Vec<ToolResult>,
}

type ApiError = (StatusCode, Json<Value>);

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/rerun", post(rerun))
        .route("/api/conversations", get(list_conversations))
        .route("/api/conversations/{id}", get(get_conversation).delete(delete_conversation))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.message.is_empty() {
        return Err(validation_error("Message is required"));
    }

    let mut conversation = match &body.conversation_id {
        Some(id) => state.store.get(id).ok_or_else(|| missing_conversation(true))?,
        None => Conversation::started_by(&body.message),
    };

    info!(
        event_name = "chat.turn.started",
        conversation_id = %conversation.id,
        "chat turn started"
    );

    match state.runtime.run_turn(&mut conversation, &body.message).await {
        Ok(outcome) => finish_turn(&state, conversation, outcome),
        Err(failure) => Err(fail_turn(&state, conversation, &failure.message)),
    }
}

async fn rerun(
    State(state): State<AppState>,
    Json(body): Json<RerunRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.new_message.is_empty() {
        return Err(validation_error("Message is required"));
    }

    let mut conversation =
        state.store.get(&body.conversation_id).ok_or_else(|| missing_conversation(true))?;

    if body.message_index > conversation.message_count() {
        return Err(validation_error("message_index is out of range"));
    }

    info!(
        event_name = "chat.rerun.started",
        conversation_id = %conversation.id,
        message_index = body.message_index,
        "chat rerun started"
    );

    match state.runtime.run_rerun(&mut conversation, body.message_index, &body.new_message).await {
        Ok(outcome) => finish_turn(&state, conversation, outcome),
        Err(failure) => Err(fail_turn(&state, conversation, &failure.message)),
    }
}

async fn list_conversations(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "conversations": state.store.summaries() }))
}

async fn get_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Conversation>, ApiError> {
    state.store.get(&conversation_id).map(Json).ok_or_else(|| missing_conversation(false))
}

async fn delete_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    match state.store.delete(&conversation_id) {
        Ok(true) => {
            info!(
                event_name = "chat.conversation.deleted",
                conversation_id = %conversation_id,
                "conversation deleted"
            );
            Ok(Json(json!({ "success": true })))
        }
        Ok(false) => Err(missing_conversation(false)),
        Err(failure) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": failure.to_string() })),
        )),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn finish_turn(
    state: &AppState,
    conversation: Conversation,
    outcome: TurnOutcome,
) -> Result<Json<ChatResponse>, ApiError> {
    let conversation_id = conversation.id.clone();
    if let Err(failure) = state.store.upsert(&conversation) {
        return Err(fail_turn(state, conversation, &failure.to_string()));
    }

    info!(
        event_name = "chat.turn.completed",
        conversation_id = %conversation_id,
        tool_calls = outcome.tool_results.len(),
        "chat turn completed"
    );

    Ok(Json(ChatResponse {
        conversation_id,
        message: outcome.message,
        tool_results: outcome.tool_results,
    }))
}

/// Classifies the failure, annotates the transcript with an `error` message,
/// and persists best-effort before answering 500. The transcript always
/// reflects what the user saw.
fn fail_turn(state: &AppState, mut conversation: Conversation, failure_message: &str) -> ApiError {
    let disposition = classify_failure(failure_message);
    error!(
        event_name = "chat.turn.failed",
        conversation_id = %conversation.id,
        is_critical = disposition.is_critical,
        error = failure_message,
        "chat turn failed"
    );

    conversation.push_error(disposition.user_message.clone(), disposition.is_critical);
    if let Err(store_failure) = state.store.upsert(&conversation) {
        error!(
            event_name = "chat.transcript.write_failed",
            conversation_id = %conversation.id,
            error = %store_failure,
            "failed to persist error annotation"
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": disposition.user_message,
            "is_critical": disposition.is_critical,
            "conversation_id": conversation.id,
        })),
    )
}

fn validation_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message, "is_critical": false })))
}

fn missing_conversation(include_criticality: bool) -> ApiError {
    let body = if include_criticality {
        json!({ "error": "Conversation missing", "is_critical": false })
    } else {
        json!({ "error": "Conversation missing" })
    };
    (StatusCode::NOT_FOUND, Json(body))
}

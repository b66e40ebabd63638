//! Conversational assistant handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Always answers 200; failures arrive as fixed reply sentences
pub async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<ChatResponse> {
    let reply = state.services.chat.reply(&request.message).await;

    info!(
        grounded_facts = reply.grounded_facts,
        degraded = reply.degraded,
        "Chat reply sent"
    );

    Json(ChatResponse { reply: reply.reply })
}

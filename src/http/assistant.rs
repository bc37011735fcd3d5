//! Personal assistant handlers. Every route here needs a known caller.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::store::now_iso8601;

use super::{ApiJson, AppState, Caller};

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
pub(super) struct HistoryQuery {
    limit: Option<usize>,
}

/// POST /api/assistant/chat
pub(super) async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Response, AppError> {
    let user = caller.require()?;
    let reply = state.assistant.chat(&user.id, &req.message).await?;
    Ok(Json(json!({
        "response": reply.response,
        "provider": reply.provider,
        "timestamp": now_iso8601(),
    }))
    .into_response())
}

/// GET /api/assistant/history?limit=
pub(super) async fn history(
    State(state): State<AppState>,
    caller: Caller,
    Query(q): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let user = caller.require()?;
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state.assistant.history(&user.id, limit).await?;
    Ok(Json(history).into_response())
}

/// DELETE /api/assistant/history
pub(super) async fn clear_history(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Response, AppError> {
    let user = caller.require()?;
    let deleted = state.assistant.clear_history(&user.id).await?;
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

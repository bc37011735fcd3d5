//! Handlers for the learning API, the starter chat and users.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::events::LearningEvent;
use crate::learning::{TeachRequest, blocking};

use super::{ApiJson, ApiPath, AppState, Caller};

const KEEP_ALIVE: Duration = Duration::from_secs(15);

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct MessageRequest {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
pub(super) struct NewUserRequest {
    #[serde(default)]
    username: String,
    name: Option<String>,
}

// ── Learning ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Result<Response, AppError> {
    let stats = state.learner.stats(None).await?;
    let providers = state.assistant.health().await;
    let body = json!({
        "status": "ok",
        "name": state.name,
        "providers": providers,
        "chain": state.assistant.provider_names(),
        "patterns": stats.total_patterns,
        "listeners": state.learner.events().subscriber_count(),
    });
    Ok(Json(body).into_response())
}

/// GET /api/patterns
pub(super) async fn patterns(State(state): State<AppState>, caller: Caller) -> Result<Response, AppError> {
    let patterns = state.learner.list(caller.id()).await?;
    Ok(Json(patterns).into_response())
}

/// POST /api/teach
pub(super) async fn teach(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<TeachRequest>,
) -> Result<Response, AppError> {
    let taught = state.learner.teach(caller.id(), req).await?;
    Ok(Json(taught).into_response())
}

/// POST /api/respond and POST /api/chat
pub(super) async fn respond(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<MessageRequest>,
) -> Result<Response, AppError> {
    let reply = state.learner.respond(caller.id(), &req.message).await?;
    Ok(Json(reply).into_response())
}

/// DELETE /api/patterns/{id}
pub(super) async fn delete_pattern(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> Result<Response, AppError> {
    state.learner.delete(caller.id(), id).await?;
    Ok(Json(json!({ "success": true, "deleted": 1 })).into_response())
}

/// GET /api/stats
pub(super) async fn stats(State(state): State<AppState>, caller: Caller) -> Result<Response, AppError> {
    let stats = state.learner.stats(caller.id()).await?;
    Ok(Json(stats).into_response())
}

/// GET /api/events: Server-Sent Events learning feed.
pub(super) async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.learner.events().subscribe();
    debug!("learning feed subscriber connected");

    let connected = tokio_stream::once(Ok::<_, Infallible>(Event::default().data(LearningEvent::Connected.to_json())));
    let updates = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(event) => Some(Ok::<_, Infallible>(Event::default().data(event.to_json()))),
        Err(e) => {
            warn!(error = %e, "learning feed subscriber lagged");
            None
        }
    });

    Sse::new(connected.chain(updates)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE))
}

/// POST /chat, answered by the built-in starter engine only.
pub(super) async fn starter_chat(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<MessageRequest>,
) -> Result<Response, AppError> {
    let conversation = caller.id().unwrap_or("anonymous").to_string();
    let response = state.learner.starter().respond(&conversation, &req.message)?;
    Ok(Json(json!({ "response": response })).into_response())
}

// ── Users ─────────────────────────────────────────────────────────────────────

/// POST /api/users
pub(super) async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewUserRequest>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let user = blocking(move || store.create_user(&req.username, req.name.as_deref())).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// GET /api/users/{id}
pub(super) async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let user = blocking(move || store.get_user(&id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(user).into_response())
}

/// GET /api/user
pub(super) async fn current_user(caller: Caller) -> Result<Response, AppError> {
    Ok(Json(caller.require()?).into_response())
}

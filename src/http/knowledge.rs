//! Knowledge base handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::knowledge::DEFAULT_SEARCH_LIMIT;
use crate::store::{KnowledgeDoc, KnowledgePatch};

use super::{ApiJson, ApiPath, AppState};

#[derive(Deserialize)]
pub(super) struct ListQuery {
    category: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct SearchQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

/// GET /api/knowledge?category=
pub(super) async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Response, AppError> {
    let category = q.category.as_deref().filter(|c| !c.is_empty());
    let docs = state.knowledge.list(category).await?;
    Ok(Json(docs).into_response())
}

/// GET /api/knowledge/search?q=&limit=
pub(super) async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let limit = q.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let hits = state.knowledge.search(&q.q, limit).await?;
    Ok(Json(hits).into_response())
}

/// GET /api/knowledge/categories
pub(super) async fn categories(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(Json(state.knowledge.categories().await?).into_response())
}

/// GET /api/knowledge/{id}
pub(super) async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, AppError> {
    Ok(Json(state.knowledge.get(&id).await?).into_response())
}

/// POST /api/knowledge
pub(super) async fn add(
    State(state): State<AppState>,
    ApiJson(doc): ApiJson<KnowledgeDoc>,
) -> Result<Response, AppError> {
    let doc = state.knowledge.add(doc).await?;
    Ok((StatusCode::CREATED, Json(doc)).into_response())
}

/// PUT /api/knowledge/{id}
pub(super) async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(patch): ApiJson<KnowledgePatch>,
) -> Result<Response, AppError> {
    Ok(Json(state.knowledge.update(&id, patch).await?).into_response())
}

/// DELETE /api/knowledge/{id}
pub(super) async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, AppError> {
    state.knowledge.delete(&id).await?;
    Ok(Json(json!({ "success": true })).into_response())
}

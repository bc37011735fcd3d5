//! Axum HTTP server: the learning API, the personal assistant, the knowledge
//! base, and an optional static-file fallback.
//!
//! ## URL layout
//!
//! ```text
//! GET    /api/health
//! GET    /api/patterns
//! POST   /api/teach
//! POST   /api/respond            (alias: POST /api/chat)
//! DELETE /api/patterns/{id}
//! GET    /api/stats
//! GET    /api/events             (SSE learning feed)
//! POST   /chat                   (starter engine only)
//! POST   /api/users
//! GET    /api/users/{id}
//! GET    /api/user
//! POST   /api/assistant/chat
//! GET    /api/assistant/history  (DELETE clears it)
//! GET    /api/knowledge          (POST adds)
//! GET    /api/knowledge/search
//! GET    /api/knowledge/categories
//! GET    /api/knowledge/{id}     (PUT updates, DELETE removes)
//! GET    /*                      → static_dir, when configured
//! ```
//!
//! Callers identify themselves with an optional `x-user-id` header.

mod api;
mod assistant;
mod knowledge;

use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{error, info};

use crate::assistant::Assistant;
use crate::config::HttpConfig;
use crate::error::AppError;
use crate::knowledge::KnowledgeBase;
use crate::learning::{Learner, blocking};
use crate::runtime::{Component, ComponentFuture};
use crate::store::{Store, User};

pub const USER_HEADER: &str = "x-user-id";

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub name: String,
    pub store: Store,
    pub learner: Learner,
    pub assistant: Assistant,
    pub knowledge: KnowledgeBase,
}

// ── Errors ────────────────────────────────────────────────────────────────────

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ── Extractors ────────────────────────────────────────────────────────────────

/// `Json<T>` whose rejection is an [`AppError::Invalid`], so a malformed
/// body gets the same JSON error shape as every other 400.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Invalid(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `Path<T>` with the same rejection mapping as [`ApiJson`].
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Invalid(rejection.body_text()))?;
        Ok(Self(value))
    }
}

// ── Caller identity ───────────────────────────────────────────────────────────

/// The user named by the `x-user-id` header, if any.
///
/// A header naming an unknown user is rejected with 401; no header means an
/// anonymous caller.
pub struct Caller(pub Option<User>);

impl Caller {
    pub fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.id.as_str())
    }

    /// The user, or 401 for anonymous callers.
    pub fn require(self) -> Result<User, AppError> {
        self.0
            .ok_or_else(|| AppError::Unauthorized("x-user-id header required".into()))
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(USER_HEADER) else {
            return Ok(Caller(None));
        };
        let id = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("invalid x-user-id header".into()))?
            .trim()
            .to_string();
        if id.is_empty() {
            return Ok(Caller(None));
        }

        let store = state.store.clone();
        let user = blocking(move || store.get_user(&id)).await?;
        match user {
            Some(user) => Ok(Caller(Some(user))),
            None => Err(AppError::Unauthorized("unknown user".into())),
        }
    }
}

// ── HttpServer component ──────────────────────────────────────────────────────

pub struct HttpServer {
    bind_addr: String,
    cors: bool,
    static_dir: Option<PathBuf>,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: &HttpConfig, state: AppState) -> Self {
        Self {
            bind_addr: config.bind.clone(),
            cors: config.cors,
            static_dir: config.static_dir.clone(),
            state,
        }
    }
}

impl Component for HttpServer {
    fn id(&self) -> &str {
        "http"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(serve(*self, shutdown))
    }
}

async fn serve(server: HttpServer, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(server.state, server.cors, server.static_dir.as_deref());

    let listener = TcpListener::bind(&server.bind_addr)
        .await
        .map_err(|e| AppError::Http(format!("bind failed on {}: {e}", server.bind_addr)))?;

    info!(bind_addr = %server.bind_addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Http(format!("server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState, cors: bool, static_dir: Option<&std::path::Path>) -> Router {
    let mut router = Router::new()
        // learning
        .route("/api/health",               get(api::health))
        .route("/api/patterns",             get(api::patterns))
        .route("/api/patterns/{id}",        axum::routing::delete(api::delete_pattern))
        .route("/api/teach",                post(api::teach))
        .route("/api/respond",              post(api::respond))
        .route("/api/chat",                 post(api::respond))
        .route("/api/stats",                get(api::stats))
        .route("/api/events",               get(api::events))
        .route("/chat",                     post(api::starter_chat))
        // users
        .route("/api/users",                post(api::create_user))
        .route("/api/users/{id}",           get(api::get_user))
        .route("/api/user",                 get(api::current_user))
        // assistant
        .route("/api/assistant/chat",       post(assistant::chat))
        .route("/api/assistant/history",    get(assistant::history).delete(assistant::clear_history))
        // knowledge
        .route("/api/knowledge",            get(knowledge::list).post(knowledge::add))
        .route("/api/knowledge/search",     get(knowledge::search))
        .route("/api/knowledge/categories", get(knowledge::categories))
        .route(
            "/api/knowledge/{id}",
            get(knowledge::get).put(knowledge::update).delete(knowledge::delete),
        )
        .with_state(state);

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    if cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn errors_map_to_status_and_json() {
        let cases = [
            (AppError::Invalid("bad".into()), StatusCode::BAD_REQUEST, "invalid_request"),
            (AppError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED, "unauthorized"),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN, "forbidden"),
            (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND, "not_found"),
            (AppError::Store("disk".into()), StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        ];
        for (err, status, code) in cases {
            let resp = err.into_response();
            assert_eq!(resp.status(), status);
            assert_eq!(body_json(resp).await["error"], code);
        }
    }

    #[tokio::test]
    async fn client_error_message_is_bare() {
        let resp = AppError::Invalid("Missing trigger or response".into()).into_response();
        assert_eq!(body_json(resp).await["message"], "Missing trigger or response");
    }
}

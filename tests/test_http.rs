//! HTTP API tests driven through the router with `tower::ServiceExt::oneshot`.
//!
//! No sockets are opened and the assistant runs on the `dummy` provider.
//!
//! Run with:
//!   cargo test --test test_http

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, BodyDataStream, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_stream::StreamExt;
use tower::ServiceExt;

use learnbot::assistant::Assistant;
use learnbot::config::Config;
use learnbot::engine::StarterEngine;
use learnbot::events::EventHub;
use learnbot::http::{AppState, USER_HEADER, build_router};
use learnbot::knowledge::KnowledgeBase;
use learnbot::learning::Learner;
use learnbot::llm::providers::build_chain;
use learnbot::store::Store;

// ── helpers ──────────────────────────────────────────────────────────────────

struct TestApp {
    _tmp: TempDir,
    router: Router,
}

fn app() -> TestApp {
    let tmp = TempDir::new().expect("tempdir");
    let config = Config::test_default(tmp.path());
    let store = Store::open(&config.db_path()).expect("open store");
    store.seed_defaults().expect("seed");

    let events = EventHub::new();
    let starter = Arc::new(StarterEngine::new(config.engine.max_context));
    let learner = Learner::new(store.clone(), starter, events, config.engine.clone());
    let knowledge = KnowledgeBase::new(store.clone());
    let chain = build_chain(&config).expect("chain");
    let assistant = Assistant::new(store.clone(), knowledge.clone(), chain, config.assistant.clone());

    let state = AppState {
        name: config.name.clone(),
        store,
        learner,
        assistant,
        knowledge,
    };
    TestApp {
        _tmp: tmp,
        router: build_router(state, false, None),
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header(USER_HEADER, user);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, user, None).await
    }

    async fn post(&self, uri: &str, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, user, Some(body)).await
    }

    async fn delete(&self, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, user, None).await
    }

    async fn user(&self, username: &str) -> String {
        let (status, body) = self.post("/api/users", None, json!({ "username": username })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

// ── health / learning ────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_chain_and_patterns() {
    let app = app();
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain"], json!(["dummy"]));
    assert_eq!(body["patterns"], 3);
}

#[tokio::test]
async fn teach_then_respond() {
    let app = app();
    let (status, body) = app
        .post("/api/teach", None, json!({ "trigger": "Good Morning", "response": "Morning!", "taughtBy": "sam" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pattern"]["trigger"], "good morning");
    assert_eq!(body["pattern"]["taught_by"], "sam");

    let (status, body) = app.post("/api/respond", None, json!({ "message": "well GOOD MORNING to you" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Morning!");
    assert_eq!(body["matchedPattern"], "good morning");
    assert_eq!(body["taughtBy"], "sam");
    assert_eq!(body["source"], "learned");

    let (_, stats) = app.get("/api/stats", None).await;
    assert_eq!(stats["total_patterns"], 4);
    assert_eq!(stats["total_uses"], 1);
}

#[tokio::test]
async fn chat_alias_uses_seeded_patterns() {
    let app = app();
    let (status, body) = app.post("/api/chat", None, json!({ "message": "hello bot" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "learned");
    assert_eq!(body["matchedPattern"], "hello");
}

#[tokio::test]
async fn miss_falls_back_to_starter_engine() {
    let app = app();
    let (status, body) = app.post("/api/respond", None, json!({ "message": "qwertyuiop" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "builtin");
    assert!(body["matchedPattern"].is_null());
    assert!(!body["response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn bad_requests_are_400() {
    let app = app();
    let (status, body) = app.post("/api/teach", None, json!({ "trigger": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(body["message"], "Missing trigger or response");

    let (status, _) = app.post("/api/respond", None, json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_and_path_get_json_errors() {
    let app = app();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/teach")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_request");
    assert!(!body["message"].as_str().unwrap().is_empty());

    let (status, body) = app.delete("/api/patterns/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn private_patterns_and_delete_permissions() {
    let app = app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let (_, taught) = app
        .post("/api/teach", Some(&alice), json!({ "trigger": "secret", "response": "for alice" }))
        .await;
    let id = taught["id"].as_i64().unwrap();

    let (_, reply) = app.post("/api/respond", Some(&alice), json!({ "message": "secret" })).await;
    assert_eq!(reply["response"], "for alice");
    assert_eq!(reply["isOwnPattern"], true);

    let (_, reply) = app.post("/api/respond", Some(&bob), json!({ "message": "secret" })).await;
    assert_ne!(reply["response"], "for alice");

    let (status, body) = app.delete(&format!("/api/patterns/{id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app.delete(&format!("/api/patterns/{id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.delete(&format!("/api/patterns/{id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pattern_list_is_scoped_to_caller() {
    let app = app();
    let alice = app.user("alice").await;
    app.post("/api/teach", Some(&alice), json!({ "trigger": "mine", "response": "only me" }))
        .await;

    let (_, anon) = app.get("/api/patterns", None).await;
    assert_eq!(anon.as_array().unwrap().len(), 3);
    let (_, own) = app.get("/api/patterns", Some(&alice)).await;
    assert_eq!(own.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn starter_chat_answers() {
    let app = app();
    let (status, body) = app.post("/chat", None, json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn starter_chat_answers_shared_teaching() {
    let app = app();
    let (_, before) = app.post("/chat", None, json!({ "message": "pineapple" })).await;
    assert_ne!(before["response"], "Tropical!");

    app.post("/api/teach", None, json!({ "trigger": "pineapple", "response": "Tropical!" }))
        .await;
    let (status, body) = app.post("/chat", None, json!({ "message": "pineapple" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Tropical!");
}

#[tokio::test]
async fn events_stream_is_sse() {
    let app = app();
    let req = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/event-stream"));
}

/// Read SSE bytes until one whole event is buffered and return its text.
async fn next_event(stream: &mut BodyDataStream, buf: &mut String) -> String {
    loop {
        if let Some(end) = buf.find("\n\n") {
            let event = buf[..end].to_string();
            buf.drain(..end + 2);
            return event;
        }
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream ended")
            .unwrap();
        buf.push_str(std::str::from_utf8(&chunk).unwrap());
    }
}

#[tokio::test]
async fn events_stream_reports_teach_and_delete() {
    let app = app();
    let req = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let mut stream = resp.into_body().into_data_stream();
    let mut buf = String::new();

    assert_eq!(next_event(&mut stream, &mut buf).await, r#"data: {"type":"connected"}"#);

    let (_, taught) = app
        .post("/api/teach", None, json!({ "trigger": "feed me", "response": "events!" }))
        .await;
    let id = taught["id"].as_i64().unwrap();

    let event = next_event(&mut stream, &mut buf).await;
    let payload: Value = serde_json::from_str(event.strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(payload["type"], "new-pattern");
    assert_eq!(payload["pattern"]["trigger"], "feed me");

    let (status, _) = app.delete(&format!("/api/patterns/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let event = next_event(&mut stream, &mut buf).await;
    let payload: Value = serde_json::from_str(event.strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(payload["type"], "pattern-deleted");
    assert_eq!(payload["id"], id);
}

// ── users ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_lifecycle_and_identity() {
    let app = app();
    let (status, created) = app.post("/api/users", None, json!({ "username": "carol", "name": "Carol" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (status, _) = app.post("/api/users", None, json!({ "username": "carol" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, fetched) = app.get(&format!("/api/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["username"], "carol");

    let (status, _) = app.get("/api/users/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, me) = app.get("/api/user", Some(id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["name"], "Carol");

    let (status, _) = app.get("/api/user", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/patterns", Some("ghost")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

// ── assistant ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn assistant_chat_and_history() {
    let app = app();
    let (status, _) = app.post("/api/assistant/chat", None, json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let dana = app.user("dana").await;
    let (status, body) = app
        .post("/api/assistant/chat", Some(&dana), json!({ "message": "what can you do?" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "dummy");
    assert!(body["response"].as_str().unwrap().contains("what can you do?"));
    assert!(body["timestamp"].is_string());

    let (_, history) = app.get("/api/assistant/history?limit=10", Some(&dana)).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[1]["role"], "assistant");

    let (status, body) = app.delete("/api/assistant/history", Some(&dana)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);
}

// ── knowledge ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn knowledge_crud_and_search() {
    let app = app();
    let (_, docs) = app.get("/api/knowledge", None).await;
    assert_eq!(docs.as_array().unwrap().len(), 5);

    let (_, cats) = app.get("/api/knowledge/categories", None).await;
    assert_eq!(cats, json!(["general", "help", "technical"]));

    let (status, added) = app
        .post(
            "/api/knowledge",
            None,
            json!({ "id": "ferris", "title": "Ferris the crab", "content": "Mascot of Rust.", "tags": ["rust"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["category"], "general");

    let (_, hits) = app.get("/api/knowledge/search?q=ferris&limit=3", None).await;
    let hits = hits.as_array().unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0]["id"], "ferris");
    assert!(hits[0]["score"].as_u64().unwrap() > 0);

    let (status, updated) = app
        .send(Method::PUT, "/api/knowledge/ferris", None, Some(json!({ "category": "technical" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["category"], "technical");
    assert_eq!(updated["title"], "Ferris the crab");

    let (_, technical) = app.get("/api/knowledge?category=technical", None).await;
    assert!(technical.as_array().unwrap().iter().any(|d| d["id"] == "ferris"));

    let (status, _) = app.delete("/api/knowledge/ferris", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/api/knowledge/ferris", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

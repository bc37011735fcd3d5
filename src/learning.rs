//! Teach / respond service over the pattern store.
//!
//! Every store call runs inside `spawn_blocking`; the service itself is cheap
//! to clone and shared by the HTTP handlers and the console.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{StarterEngine, first_match};
use crate::error::AppError;
use crate::events::{EventHub, LearningEvent};
use crate::store::{DeleteOutcome, NewPattern, Pattern, PatternStats, Store};

/// Teaching request as accepted by `POST /api/teach`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachRequest {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub response: String,
    pub taught_by: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Taught {
    pub success: bool,
    pub id: i64,
    pub message: String,
    pub pattern: Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Learned,
    Builtin,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub response: String,
    pub matched_pattern: Option<String>,
    pub taught_by: Option<String>,
    pub is_own_pattern: bool,
    pub source: ReplySource,
}

#[derive(Clone)]
pub struct Learner {
    store: Store,
    starter: Arc<StarterEngine>,
    events: EventHub,
    config: EngineConfig,
}

impl Learner {
    pub fn new(store: Store, starter: Arc<StarterEngine>, events: EventHub, config: EngineConfig) -> Self {
        Self {
            store,
            starter,
            events,
            config,
        }
    }

    pub fn starter(&self) -> &StarterEngine {
        &self.starter
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Teach the starter engine every stored shared pattern, oldest first.
    pub async fn prime_starter(&self) -> Result<usize, AppError> {
        let store = self.store.clone();
        let patterns = blocking(move || store.list_patterns(None)).await?;
        let mut count = 0;
        for pattern in patterns.iter().rev().filter(|p| p.owner.is_empty()) {
            self.starter.learn(&pattern.trigger, &pattern.response)?;
            count += 1;
        }
        debug!(count, "starter engine primed with shared patterns");
        Ok(count)
    }

    /// Store a pattern for `viewer` (shared when `None`) and broadcast it.
    pub async fn teach(&self, viewer: Option<&str>, req: TeachRequest) -> Result<Taught, AppError> {
        if req.trigger.trim().is_empty() || req.response.trim().is_empty() {
            return Err(AppError::Invalid("Missing trigger or response".into()));
        }
        let taught_by = req
            .taught_by
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| viewer.map(str::to_string))
            .unwrap_or_else(|| "anonymous".to_string());

        let new = NewPattern {
            owner: viewer.unwrap_or_default().to_string(),
            trigger: req.trigger.clone(),
            response: req.response.clone(),
            taught_by,
            is_public: req.is_public,
        };
        let store = self.store.clone();
        let pattern = blocking(move || store.upsert_pattern(new)).await?;

        info!(id = pattern.id, trigger = %pattern.trigger, taught_by = %pattern.taught_by, "pattern learned");
        if pattern.owner.is_empty() {
            self.starter.learn(&pattern.trigger, &pattern.response)?;
        }
        self.events.publish(LearningEvent::NewPattern {
            pattern: pattern.clone(),
        });

        Ok(Taught {
            success: true,
            id: pattern.id,
            message: format!("Learned: \"{}\" → \"{}\"", req.trigger.trim(), req.response),
            pattern,
        })
    }

    /// Answer `message` from the learned patterns `viewer` can see, falling
    /// back to the starter engine or the fixed reply. Both sides of the
    /// exchange are recorded in chat history.
    pub async fn respond(&self, viewer: Option<&str>, message: &str) -> Result<Reply, AppError> {
        if message.trim().is_empty() {
            return Err(AppError::Invalid("Message is required".into()));
        }

        let store = self.store.clone();
        let owned_viewer = viewer.map(str::to_string);
        let patterns = blocking(move || store.visible_patterns(owned_viewer.as_deref())).await?;

        let reply = match first_match(message, &patterns) {
            Some(p) => {
                let store = self.store.clone();
                let id = p.id;
                blocking(move || store.record_use(id)).await?;
                debug!(id, trigger = %p.trigger, "pattern matched");
                Reply {
                    response: p.response.clone(),
                    matched_pattern: Some(p.trigger.clone()),
                    taught_by: Some(p.taught_by.clone()),
                    is_own_pattern: !p.is_shared() && Some(p.owner.as_str()) == viewer,
                    source: ReplySource::Learned,
                }
            }
            None if self.config.builtin_fallback => Reply {
                response: self.starter.respond(viewer.unwrap_or("anonymous"), message)?,
                matched_pattern: None,
                taught_by: None,
                is_own_pattern: false,
                source: ReplySource::Builtin,
            },
            None => Reply {
                response: self.config.fallback_reply.clone(),
                matched_pattern: None,
                taught_by: None,
                is_own_pattern: false,
                source: ReplySource::Fallback,
            },
        };

        let store = self.store.clone();
        let user_id = viewer.unwrap_or_default().to_string();
        let user_msg = message.to_string();
        let bot_msg = reply.response.clone();
        blocking(move || {
            store.append_message(&user_id, "user", &user_msg)?;
            store.append_message(&user_id, "assistant", &bot_msg)
        })
        .await?;

        Ok(reply)
    }

    pub async fn list(&self, viewer: Option<&str>) -> Result<Vec<Pattern>, AppError> {
        let store = self.store.clone();
        let viewer = viewer.map(str::to_string);
        blocking(move || store.list_patterns(viewer.as_deref())).await
    }

    /// Delete a pattern; shared ones by anyone, owned ones by their owner.
    pub async fn delete(&self, viewer: Option<&str>, id: i64) -> Result<(), AppError> {
        let store = self.store.clone();
        let owned_viewer = viewer.map(str::to_string);
        let outcome = blocking(move || store.delete_pattern(id, owned_viewer.as_deref())).await?;
        match outcome {
            DeleteOutcome::Deleted(pattern) => {
                info!(id, "pattern deleted");
                if pattern.owner.is_empty() {
                    self.starter.forget(&pattern.trigger)?;
                }
                self.events.publish(LearningEvent::PatternDeleted { id });
                Ok(())
            }
            DeleteOutcome::NotFound => Err(AppError::NotFound("Pattern not found".into())),
            DeleteOutcome::Forbidden => Err(AppError::Forbidden(
                "Pattern belongs to another user".into(),
            )),
        }
    }

    pub async fn stats(&self, viewer: Option<&str>) -> Result<PatternStats, AppError> {
        let store = self.store.clone();
        let viewer = viewer.map(str::to_string);
        blocking(move || store.pattern_stats(viewer.as_deref())).await
    }
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Runtime(format!("blocking task failed: {e}")))?
}

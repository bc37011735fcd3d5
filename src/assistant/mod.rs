//! Personal AI assistant.
//!
//! Each chat turn gathers the user's recent history and the best-matching
//! knowledge documents, renders them into the assistant prompt, and walks the
//! provider chain in order. When every provider fails the assistant answers
//! from canned templates (or apologises when those are disabled).

pub mod prompt;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::error::AppError;
use crate::knowledge::{KnowledgeBase, ScoredDoc};
use crate::learning::blocking;
use crate::llm::{CompletionRequest, HistoryMessage, LlmProvider};
use crate::store::{ChatRecord, Store};

use self::prompt::PromptBuilder;

const DEFAULT_SYSTEM: &str =
    "You are a helpful personal AI assistant with access to a knowledge base.";

const DEFAULT_TEMPLATE: &str = "You are a helpful personal AI assistant. You have access to a knowledge base and can help answer questions.

{{context}}

Current message from user: {{message}}

Provide a helpful, conversational response. If you found relevant information in the knowledge base, reference it naturally in your answer.";

const APOLOGY: &str =
    "I'm having trouble connecting to my AI brain. Please try again in a moment.";

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub response: String,
    /// Provider that produced the reply, `fallback`, or `none`.
    pub provider: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub ollama: bool,
    pub openai: bool,
    pub fallback: bool,
}

#[derive(Clone)]
pub struct Assistant {
    store: Store,
    knowledge: KnowledgeBase,
    providers: Arc<Vec<LlmProvider>>,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(
        store: Store,
        knowledge: KnowledgeBase,
        providers: Vec<LlmProvider>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            store,
            knowledge,
            providers: Arc::new(providers),
            config,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(LlmProvider::name).collect()
    }

    /// One chat turn for `user_id`. Both the message and the reply are
    /// appended to the user's history.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<AssistantReply, AppError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Invalid("Message is required".into()));
        }

        let history = self.history(user_id, self.config.history_limit).await?;
        let knowledge = self.knowledge.search(message, self.config.knowledge_limit).await?;
        debug!(user_id, history = history.len(), knowledge = knowledge.len(), "assistant context loaded");

        let recent = tail(&history, self.config.context_messages);
        let context = build_context(&knowledge, recent);
        let req = CompletionRequest {
            system: Some(
                PromptBuilder::new(&self.config.prompts_dir)
                    .layer_or("system.md", DEFAULT_SYSTEM)
                    .build(),
            ),
            history: history
                .iter()
                .map(|r| HistoryMessage::new(r.role.clone(), r.content.clone()))
                .collect(),
            prompt: PromptBuilder::new(&self.config.prompts_dir)
                .layer_or("assistant.md", DEFAULT_TEMPLATE)
                .with_vars([("context", context.as_str()), ("message", message)])
                .build(),
        };

        let mut reply = None;
        for provider in self.providers.iter() {
            match provider.complete(&req).await {
                Ok(resp) => {
                    info!(provider = provider.name(), usage = ?resp.usage, "assistant reply generated");
                    reply = Some(AssistantReply {
                        response: resp.text,
                        provider: provider.name().to_string(),
                    });
                    break;
                }
                Err(e) => warn!(provider = provider.name(), error = %e, "provider failed; trying next"),
            }
        }
        let reply = reply.unwrap_or_else(|| {
            if self.config.fallback {
                AssistantReply {
                    response: fallback_reply(message),
                    provider: "fallback".to_string(),
                }
            } else {
                AssistantReply {
                    response: APOLOGY.to_string(),
                    provider: "none".to_string(),
                }
            }
        });

        let store = self.store.clone();
        let uid = user_id.to_string();
        let user_msg = message.to_string();
        let bot_msg = reply.response.clone();
        blocking(move || {
            store.append_message(&uid, "user", &user_msg)?;
            store.append_message(&uid, "assistant", &bot_msg)
        })
        .await?;

        Ok(reply)
    }

    pub async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatRecord>, AppError> {
        let store = self.store.clone();
        let uid = user_id.to_string();
        blocking(move || store.recent_history(&uid, limit)).await
    }

    pub async fn clear_history(&self, user_id: &str) -> Result<usize, AppError> {
        let store = self.store.clone();
        let uid = user_id.to_string();
        let deleted = blocking(move || store.clear_history(&uid)).await?;
        info!(user_id, deleted, "assistant history cleared");
        Ok(deleted)
    }

    /// Ping each configured backend.
    pub async fn health(&self) -> ProviderHealth {
        let mut health = ProviderHealth {
            ollama: false,
            openai: false,
            fallback: self.config.fallback,
        };
        for provider in self.providers.iter() {
            let up = provider.ping().await.is_ok();
            match provider {
                LlmProvider::Ollama(_) => health.ollama |= up,
                LlmProvider::OpenAiCompatible(_) => health.openai |= up,
                LlmProvider::Dummy(_) => {}
            }
        }
        health
    }
}

fn tail(history: &[ChatRecord], n: usize) -> &[ChatRecord] {
    &history[history.len().saturating_sub(n)..]
}

/// Render knowledge hits and recent turns into the prompt context block.
pub fn build_context(knowledge: &[ScoredDoc], history: &[ChatRecord]) -> String {
    let mut context = String::new();

    if !knowledge.is_empty() {
        context.push_str("Relevant information from knowledge base:\n");
        for hit in knowledge {
            context.push_str(&format!("- {}: {}\n", hit.doc.title, hit.doc.content));
        }
        context.push('\n');
    }

    if !history.is_empty() {
        context.push_str("Recent conversation:\n");
        for msg in history {
            context.push_str(&format!("{}: {}\n", msg.role, msg.content));
        }
    }

    context
}

/// Canned reply used when no provider answered.
pub fn fallback_reply(message: &str) -> String {
    let lower = message.to_lowercase();

    if lower.contains("hello") || lower.contains("hi") {
        return "Hello! I'm your personal AI assistant. I'm currently running in basic mode, \
                but I'm still here to help. What can I do for you?"
            .to_string();
    }
    if lower.contains("help") {
        return "I can help you with various tasks! Try asking me questions, and I'll do my best \
                to assist. I can also search our knowledge base for relevant information."
            .to_string();
    }
    if lower.contains("how are you") {
        return "I'm doing well, thank you for asking! I'm here and ready to help you with \
                whatever you need."
            .to_string();
    }

    format!(
        "I understand you're asking about \"{message}\". While I'm currently in basic mode \
         without full AI capabilities, I'm still here to help. Could you provide more details \
         about what you're looking for?"
    )
}

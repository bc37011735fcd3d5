//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape, deserialized before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub server: RawServer,
    #[serde(default)]
    pub http: RawHttp,
    #[serde(default)]
    pub store: RawStore,
    #[serde(default)]
    pub engine: RawEngine,
    #[serde(default)]
    pub assistant: RawAssistant,
    #[serde(default)]
    pub llm: RawLlm,
}

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_true")]
    pub cors: bool,
    #[serde(default)]
    pub static_dir: Option<String>,
}

// ── Store / engine ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawStore {
    #[serde(default = "default_db_file")]
    pub db_file: String,
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

#[derive(Deserialize)]
pub(super) struct RawEngine {
    #[serde(default = "default_max_context")]
    pub max_context: usize,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    #[serde(default = "default_true")]
    pub builtin_fallback: bool,
}

// ── Assistant ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawAssistant {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_context_messages")]
    pub context_messages: usize,
    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: usize,
    #[serde(default = "default_chain")]
    pub chain: Vec<String>,
    #[serde(default = "default_true")]
    pub fallback: bool,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawLlm {
    #[serde(default)]
    pub ollama: RawOllama,
    #[serde(default)]
    pub openai: RawOpenAi,
}

#[derive(Deserialize)]
pub(super) struct RawOllama {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Deserialize)]
pub(super) struct RawOpenAi {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

// ── Default impls for serde ──────────────────────────────────────────────────

impl Default for RawServer {
    fn default() -> Self {
        Self {
            name: default_name(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_http_bind(),
            cors: true,
            static_dir: None,
        }
    }
}

impl Default for RawStore {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
            seed_defaults: true,
        }
    }
}

impl Default for RawEngine {
    fn default() -> Self {
        Self {
            max_context: default_max_context(),
            fallback_reply: default_fallback_reply(),
            builtin_fallback: true,
        }
    }
}

impl Default for RawAssistant {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            context_messages: default_context_messages(),
            knowledge_limit: default_knowledge_limit(),
            chain: default_chain(),
            fallback: true,
            prompts_dir: default_prompts_dir(),
        }
    }
}

impl Default for RawOllama {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Default functions (used by serde) ────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "learnbot".to_string()
}
fn default_work_dir() -> String {
    "~/.learnbot".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_http_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_db_file() -> String {
    "learnbot.db".to_string()
}

fn default_max_context() -> usize {
    5
}
pub(super) fn default_fallback_reply() -> String {
    "I don't know how to respond to that. Teach me using the teaching panel!".to_string()
}

fn default_history_limit() -> usize {
    10
}
fn default_context_messages() -> usize {
    5
}
fn default_knowledge_limit() -> usize {
    5
}
fn default_chain() -> Vec<String> {
    vec!["ollama".to_string(), "openai".to_string()]
}
fn default_prompts_dir() -> String {
    "config/prompts".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama2".to_string()
}
fn default_openai_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> usize {
    500
}
fn default_timeout_seconds() -> u64 {
    60
}

//! Public configuration types consumed by the rest of the crate.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append log lines here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub engine: EngineConfig,
    pub assistant: AssistantConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Absolute path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        self.work_dir.join(&self.store.db_file)
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub cors: bool,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_file: String,
    /// Insert default patterns and knowledge documents into empty tables.
    pub seed_defaults: bool,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Inputs remembered per conversation by the starter engine.
    pub max_context: usize,
    /// Reply used for unmatched messages when `builtin_fallback` is off.
    pub fallback_reply: String,
    pub builtin_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub history_limit: usize,
    pub context_messages: usize,
    pub knowledge_limit: usize,
    /// Provider names tried in order: `ollama`, `openai`, `dummy`.
    pub chain: Vec<String>,
    /// Use canned template replies when every provider fails.
    pub fallback: bool,
    pub prompts_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    /// From `OPENAI_API_KEY`; never read from TOML.
    pub openai_api_key: Option<String>,
    /// `false` drops Ollama from the provider chain.
    pub prefer_local: bool,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
}

/// Values taken from the environment, applied on top of the TOML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub bind: Option<String>,
    pub port: Option<String>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_model: Option<String>,
    pub prefer_local: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Overrides {
    /// Read every supported variable from the process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            work_dir: var("LEARNBOT_WORK_DIR"),
            log_level: var("LEARNBOT_LOG_LEVEL"),
            bind: var("LEARNBOT_BIND"),
            port: var("PORT"),
            ollama_url: var("OLLAMA_URL"),
            ollama_model: var("OLLAMA_MODEL"),
            openai_model: var("OPENAI_MODEL"),
            prefer_local: var("PREFER_LOCAL"),
            openai_api_key: var("OPENAI_API_KEY"),
        }
    }
}

//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies the environment overrides listed on [`Overrides`].
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `LlmConfig`, …).
//! - **raw**: Raw TOML deserialization types with serde defaults; private.
//! - **load**: `load`, `load_from`, `builtin`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{builtin, expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Offline configuration for tests: dummy provider only, no network.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        let mut cfg = builtin(&Overrides::default());
        cfg.work_dir = work_dir.to_path_buf();
        cfg.http.bind = "127.0.0.1:0".into();
        cfg.assistant.chain = vec!["dummy".into()];
        cfg.assistant.prompts_dir = work_dir.join("prompts");
        cfg.llm.ollama.base_url = "http://127.0.0.1:9".into();
        cfg.llm.ollama.timeout_seconds = 1;
        cfg.llm.openai.api_base_url = "http://127.0.0.1:9/v1/chat/completions".into();
        cfg.llm.openai.timeout_seconds = 1;
        cfg
    }
}

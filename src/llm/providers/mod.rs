//! LLM provider implementations.
//!
//! `build_chain(config)` is the factory, called at startup. Adding a new
//! backend = new module + new match arm.

pub mod dummy;
pub mod ollama;
pub mod openai_compatible;

use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{LlmProvider, ProviderError};

/// Construct one provider by name.
pub fn build(name: &str, config: &Config) -> Result<LlmProvider, ProviderError> {
    match name {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "ollama" => Ok(LlmProvider::Ollama(ollama::OllamaProvider::new(&config.llm.ollama)?)),
        "openai" | "openai-compatible" => {
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                &config.llm.openai,
                config.llm.openai_api_key.clone(),
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

/// Providers in `assistant.chain` order.
///
/// OpenAI is skipped when no API key is configured; Ollama is skipped when
/// `prefer_local` is off. Unknown names are rejected.
pub fn build_chain(config: &Config) -> Result<Vec<LlmProvider>, ProviderError> {
    let mut chain = Vec::new();
    for name in &config.assistant.chain {
        match name.as_str() {
            "openai" | "openai-compatible" if config.llm.openai_api_key.is_none() => {
                warn!("OPENAI_API_KEY not set; openai provider disabled");
                continue;
            }
            "ollama" if !config.llm.prefer_local => {
                info!("PREFER_LOCAL=false; ollama provider disabled");
                continue;
            }
            _ => {}
        }
        chain.push(build(name, config)?);
    }
    info!(
        providers = ?chain.iter().map(LlmProvider::name).collect::<Vec<_>>(),
        "llm provider chain ready"
    );
    Ok(chain)
}

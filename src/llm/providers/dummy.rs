//! Dummy LLM provider: echoes the prompt back prefixed with `[echo]`.
//! Lets the assistant run end to end without a model.

use crate::llm::{CompletionRequest, LlmResponse, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        Ok(LlmResponse {
            text: format!("[echo] {}", req.prompt),
            usage: None,
        })
    }
}

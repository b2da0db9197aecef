pub mod providers;
pub mod retry;
pub mod streaming;

use std::sync::Arc;

use quill_core::config::{AppConfig, ModelConfig};
use quill_core::error::{QuillError, Result};
use quill_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Ok(Box::new(AnthropicClient::new())),
        other => Err(QuillError::UnsupportedProvider(other.to_string())),
    }
}

/// Build the client the chat node talks to: the primary model wrapped with
/// retries and any configured fallback models.
pub fn client_from_config(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let primary = create_client(&config.model)?;
    let retry = config.model.retry.clone().unwrap_or_default();

    let mut fallbacks = Vec::with_capacity(config.fallback_models.len());
    for fb in &config.fallback_models {
        fallbacks.push((fb.clone(), create_client(fb)?));
    }

    Ok(Arc::new(RetryingClient::new(primary, fallbacks, retry)))
}

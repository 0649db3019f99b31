//! Backend implementations and the registry that constructs them by name.

pub mod anthropic;
pub mod chat_completions;
pub mod gemini;
pub mod grok;
pub mod ollama;
pub mod openai;

use crate::error::AskError;
use crate::provider::{Provider, ProviderConfig};

type Constructor = fn(ProviderConfig) -> Box<dyn Provider>;

const REGISTRY: &[(&str, Constructor)] = &[
    (ollama::NAME, ollama::OllamaProvider::boxed),
    (grok::NAME, grok::GrokProvider::boxed),
    (openai::NAME, openai::OpenAiProvider::boxed),
    (anthropic::NAME, anthropic::AnthropicProvider::boxed),
    (gemini::NAME, gemini::GeminiProvider::boxed),
];

/// Names accepted by [`create_provider`].
pub fn provider_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Builds the provider registered as `name`.
pub fn create_provider(name: &str, config: ProviderConfig) -> Result<Box<dyn Provider>, AskError> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, create)| create(config))
        .ok_or_else(|| {
            AskError::Configuration(format!(
                "unknown provider '{name}' (available: {})",
                provider_names().join(", ")
            ))
        })
}

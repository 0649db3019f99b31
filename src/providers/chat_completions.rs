//! OpenAI-style `/chat/completions` backends.
//!
//! xAI and OpenAI speak the same dialect, so one provider type serves both;
//! a [`ChatVendor`] marker supplies the name, endpoint, default model and
//! credential variable.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{AskError, classify_hosted_error};
use crate::http_client::JsonClient;
use crate::provider::{
    ClientState, DEFAULT_SYSTEM_PROMPT, KeyLookup, Provider, ProviderConfig, env_lookup,
    extract_bash_command, hosted_defaults, read_api_key,
};

/// Fixed facts about one OpenAI-compatible vendor.
pub trait ChatVendor {
    /// Registry name.
    const NAME: &'static str;
    /// Label used in log lines and error messages.
    const LABEL: &'static str;
    const BASE_URL: &'static str;
    const DEFAULT_MODEL: &'static str;
    const API_KEY_ENV: &'static str;
}

pub struct ChatCompletionsProvider<V> {
    config: ProviderConfig,
    state: ClientState<JsonClient>,
    key_lookup: KeyLookup,
    vendor: PhantomData<fn() -> V>,
}

impl<V: ChatVendor> ChatCompletionsProvider<V> {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config: hosted_defaults(V::DEFAULT_MODEL, V::API_KEY_ENV).merged_with(&config),
            state: ClientState::Uninitialized,
            key_lookup: env_lookup,
            vendor: PhantomData,
        }
    }

    pub fn boxed(config: ProviderConfig) -> Box<dyn Provider>
    where
        V: 'static,
    {
        Box::new(Self::new(config))
    }

    /// Reads credentials through `lookup` instead of the environment.
    pub fn with_key_lookup(mut self, lookup: KeyLookup) -> Self {
        self.key_lookup = lookup;
        self
    }

    fn model_name(&self) -> String {
        self.config
            .get_str("model_name")
            .unwrap_or_else(|| V::DEFAULT_MODEL.to_string())
    }
}

#[async_trait]
impl<V: ChatVendor> Provider for ChatCompletionsProvider<V> {
    fn name(&self) -> &'static str {
        V::NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn default_config() -> ProviderConfig {
        hosted_defaults(V::DEFAULT_MODEL, V::API_KEY_ENV)
    }

    async fn validate_config(&mut self) -> Result<(), AskError> {
        if self.state.is_validated() {
            return Ok(());
        }

        let api_key = read_api_key(&self.config, self.key_lookup)?;
        let base_url = self
            .config
            .get_str("base_url")
            .unwrap_or_else(|| V::BASE_URL.to_string());
        info!("Using {} at {}", V::LABEL, base_url);

        self.state = ClientState::Validated(JsonClient::new(base_url).with_bearer_auth(&api_key));
        Ok(())
    }

    async fn get_bash_command(&mut self, prompt: &str) -> Result<String, AskError> {
        if !self.state.is_validated() {
            self.validate_config().await?;
        }
        let client = self
            .state
            .client()
            .ok_or_else(|| AskError::Api(format!("{} client is not initialized", V::LABEL)))?;

        complete(client, V::LABEL, &self.config, &self.model_name(), prompt).await
    }
}

/// Builds a request holding exactly one system and one user message.
fn request_body(config: &ProviderConfig, model: &str, prompt: &str) -> Value {
    let system = config
        .get_str("system_prompt")
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert(
        "messages".to_string(),
        json!([
            {"role": "system", "content": system},
            {"role": "user", "content": prompt},
        ]),
    );
    if let Some(max_tokens) = config.get_u64("max_tokens") {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = config.get_f64("temperature") {
        body.insert("temperature".to_string(), json!(temperature));
    }
    Value::Object(body)
}

/// Sends one completion request and returns the extracted command.
async fn complete(
    client: &JsonClient,
    backend: &str,
    config: &ProviderConfig,
    model: &str,
    prompt: &str,
) -> Result<String, AskError> {
    debug!("Requesting {} completion with model {}", backend, model);
    let response = client
        .post_json("/chat/completions", &request_body(config, model, prompt))
        .await
        .map_err(|err| classify_hosted_error(backend, &err.to_string()))?;

    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(extract_bash_command)
        .ok_or_else(|| AskError::Api(format!("{backend}: empty response")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_has_system_then_user() {
        let config = ProviderConfig::new()
            .with("system_prompt", "be terse")
            .with("max_tokens", 64)
            .with("temperature", 0.2);

        let body = request_body(&config, "grok-3-fast", "list files");

        assert_eq!(
            body,
            json!({
                "model": "grok-3-fast",
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "list files"},
                ],
                "max_tokens": 64,
                "temperature": 0.2,
            })
        );
    }

    #[test]
    fn test_request_omits_unset_limits() {
        let body = request_body(&ProviderConfig::new(), "gpt-3.5-turbo", "hi");

        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["content"], DEFAULT_SYSTEM_PROMPT);
    }
}

//! Anthropic messages API backend.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::{AskError, classify_hosted_error};
use crate::http_client::JsonClient;
use crate::provider::{
    ClientState, DEFAULT_SYSTEM_PROMPT, KeyLookup, Provider, ProviderConfig, env_lookup,
    extract_bash_command, hosted_defaults, read_api_key,
};

pub const NAME: &str = "anthropic";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    config: ProviderConfig,
    state: ClientState<JsonClient>,
    key_lookup: KeyLookup,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config: Self::default_config().merged_with(&config),
            state: ClientState::Uninitialized,
            key_lookup: env_lookup,
        }
    }

    pub fn boxed(config: ProviderConfig) -> Box<dyn Provider> {
        Box::new(Self::new(config))
    }

    pub fn with_key_lookup(mut self, lookup: KeyLookup) -> Self {
        self.key_lookup = lookup;
        self
    }

    /// The system prompt travels as a top-level field; the only message is
    /// the user's request.
    fn request_body(&self, prompt: &str) -> Value {
        let model = self
            .config
            .get_str("model_name")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let system = self
            .config
            .get_str("system_prompt")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let mut body = Map::new();
        body.insert("model".to_string(), json!(model));
        body.insert(
            "max_tokens".to_string(),
            json!(self.config.get_u64("max_tokens").unwrap_or(150)),
        );
        body.insert("system".to_string(), json!(system));
        body.insert(
            "messages".to_string(),
            json!([{"role": "user", "content": prompt}]),
        );
        if let Some(temperature) = self.config.get_f64("temperature") {
            body.insert("temperature".to_string(), json!(temperature));
        }
        Value::Object(body)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn default_config() -> ProviderConfig {
        hosted_defaults(DEFAULT_MODEL, "ANTHROPIC_API_KEY")
    }

    async fn validate_config(&mut self) -> Result<(), AskError> {
        if self.state.is_validated() {
            return Ok(());
        }

        let api_key = read_api_key(&self.config, self.key_lookup)?;
        let base_url = self
            .config
            .get_str("base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        info!("Using Anthropic at {}", base_url);

        let client = JsonClient::new(base_url)
            .with_header("x-api-key", api_key)
            .with_header("anthropic-version", API_VERSION);
        self.state = ClientState::Validated(client);
        Ok(())
    }

    async fn get_bash_command(&mut self, prompt: &str) -> Result<String, AskError> {
        if !self.state.is_validated() {
            self.validate_config().await?;
        }
        let client = self
            .state
            .client()
            .ok_or_else(|| AskError::Api("Anthropic client is not initialized".to_string()))?;

        debug!("Requesting Anthropic completion");
        let response = client
            .post_json("/messages", &self.request_body(prompt))
            .await
            .map_err(|err| classify_hosted_error("Anthropic", &err.to_string()))?;

        response
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(extract_bash_command)
            .ok_or_else(|| AskError::Api("Anthropic: empty response".to_string()))
    }
}

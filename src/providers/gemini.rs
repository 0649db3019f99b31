//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{AskError, classify_hosted_error};
use crate::http_client::JsonClient;
use crate::provider::{
    ClientState, DEFAULT_SYSTEM_PROMPT, KeyLookup, Provider, ProviderConfig, env_lookup,
    extract_bash_command, hosted_defaults, read_api_key,
};

pub const NAME: &str = "gemini";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiProvider {
    config: ProviderConfig,
    state: ClientState<JsonClient>,
    key_lookup: KeyLookup,
}

impl GeminiProvider {
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

    fn model_name(&self) -> String {
        self.config
            .get_str("model_name")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    fn request_body(&self, prompt: &str) -> Value {
        let system = self
            .config
            .get_str("system_prompt")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let mut generation = serde_json::Map::new();
        if let Some(temperature) = self.config.get_f64("temperature") {
            generation.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.config.get_u64("max_tokens") {
            generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }

        json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": generation,
        })
    }

    /// The model name is a single path segment, so it is percent-encoded.
    fn endpoint(&self) -> String {
        format!(
            "/models/{}:generateContent",
            urlencoding::encode(&self.model_name())
        )
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn default_config() -> ProviderConfig {
        hosted_defaults(DEFAULT_MODEL, "GEMINI_API_KEY")
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
        info!("Using Gemini at {}", base_url);

        self.state =
            ClientState::Validated(JsonClient::new(base_url).with_header("x-goog-api-key", api_key));
        Ok(())
    }

    async fn get_bash_command(&mut self, prompt: &str) -> Result<String, AskError> {
        if !self.state.is_validated() {
            self.validate_config().await?;
        }
        let client = self
            .state
            .client()
            .ok_or_else(|| AskError::Api("Gemini client is not initialized".to_string()))?;

        let endpoint = self.endpoint();
        debug!("Requesting Gemini completion at {}", endpoint);
        let response = client
            .post_json(&endpoint, &self.request_body(prompt))
            .await
            .map_err(|err| classify_hosted_error("Gemini", &err.to_string()))?;

        response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(extract_bash_command)
            .ok_or_else(|| AskError::Api("Gemini: empty response".to_string()))
    }
}

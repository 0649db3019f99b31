//! Local model server backend.
//!
//! Talks to Ollama's HTTP API: `GET /api/tags` to list installed models and
//! `POST /api/generate` for a single non-streaming completion.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{AskError, ErrorKind, LOCAL_RULES, match_rule};
use crate::http_client::{HttpError, JsonClient};
use crate::provider::{ClientState, DEFAULT_SYSTEM_PROMPT, Provider, ProviderConfig};

pub const NAME: &str = "ollama";

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 11434;

/// Validated connection plus the models installed when it was made.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: JsonClient,
    models: Vec<String>,
}

pub struct OllamaProvider {
    config: ProviderConfig,
    state: ClientState<OllamaClient>,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config: Self::default_config().merged_with(&config),
            state: ClientState::Uninitialized,
        }
    }

    pub fn boxed(config: ProviderConfig) -> Box<dyn Provider> {
        Box::new(Self::new(config))
    }

    fn host(&self) -> String {
        self.config
            .get_str("host")
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    fn port(&self) -> u64 {
        self.config.get_u64("port").unwrap_or(u64::from(DEFAULT_PORT))
    }

    /// `base_url` if configured, else `http://{host}:{port}`.
    pub fn base_url(&self) -> String {
        self.config
            .get_str("base_url")
            .unwrap_or_else(|| format!("http://{}:{}", self.host(), self.port()))
    }

    fn model_name(&self) -> String {
        self.config
            .get_str("model_name")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    fn generate_request(&self, prompt: &str) -> Value {
        let system = self
            .config
            .get_str("system_prompt")
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
        let mut options = serde_json::Map::new();
        if let Some(temperature) = self.config.get_f64("temperature") {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = self.config.get_u64("max_tokens") {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }

        json!({
            "model": self.model_name(),
            "prompt": prompt,
            "system": system,
            "stream": false,
            "options": options,
        })
    }

    fn classify_error(&self, message: &str) -> AskError {
        match match_rule(LOCAL_RULES, message) {
            Some(ErrorKind::Authentication) => AskError::Authentication(format!(
                "cannot connect to Ollama at {}:{}: {message}. Start it with: ollama serve",
                self.host(),
                self.port()
            )),
            Some(kind) => kind.into_error(format!(
                "Ollama: {message}. If the model is missing, run: ollama pull {}",
                self.model_name()
            )),
            None => AskError::Api(format!("Ollama: {message}")),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn default_config() -> ProviderConfig {
        ProviderConfig::new()
            .with("model_name", DEFAULT_MODEL)
            .with("host", DEFAULT_HOST)
            .with("port", i64::from(DEFAULT_PORT))
            .with("system_prompt", DEFAULT_SYSTEM_PROMPT)
            .with("temperature", 0.5)
            .with("max_tokens", 150)
    }

    async fn validate_config(&mut self) -> Result<(), AskError> {
        if self.state.is_validated() {
            return Ok(());
        }

        let http = JsonClient::new(self.base_url());
        let models = list_models(&http).await.map_err(|err| match err {
            HttpError::Decode { .. } => {
                AskError::Api(format!("Ollama sent an unexpected model listing: {err}"))
            }
            _ => AskError::Authentication(format!(
                "cannot connect to Ollama at {}:{} ({err}). Start it with: ollama serve",
                self.host(),
                self.port()
            )),
        })?;
        info!("Connected to Ollama at {}, {} models installed", http.base_url(), models.len());

        self.state = ClientState::Validated(OllamaClient { http, models });
        Ok(())
    }

    async fn get_bash_command(&mut self, prompt: &str) -> Result<String, AskError> {
        if !self.state.is_validated() {
            self.validate_config().await?;
        }
        let client = self
            .state
            .client()
            .ok_or_else(|| AskError::Api("Ollama client is not initialized".to_string()))?;

        let model = self.model_name();
        if !model_available(&model, &client.models) {
            return Err(AskError::Api(format!(
                "model '{model}' is not installed in Ollama. Run: ollama pull {model}"
            )));
        }

        debug!("Generating with Ollama model {}", model);
        let response = client
            .http
            .post_json("/api/generate", &self.generate_request(prompt))
            .await
            .map_err(|err| self.classify_error(&err.to_string()))?;

        response
            .get("response")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AskError::Api("Ollama returned an empty response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    #[serde(alias = "model")]
    name: String,
}

async fn list_models(http: &JsonClient) -> Result<Vec<String>, HttpError> {
    let tags: TagsResponse = http.get("/api/tags").await?;
    Ok(tags.models.into_iter().map(|tag| tag.name).collect())
}

/// Whether an Ollama server answers at `base_url`. A server that answers with
/// an unexpected listing still counts as reachable, so selecting it reports
/// the listing problem.
pub async fn is_reachable(base_url: String) -> bool {
    match list_models(&JsonClient::new(base_url)).await {
        Ok(_) => true,
        Err(HttpError::Decode { .. }) => true,
        Err(err) => {
            debug!("Ollama liveness probe failed: {}", err);
            false
        }
    }
}

/// Matches `requested` against installed model identifiers. An unqualified
/// request (no `:tag`) matches any installed tag of that model, so
/// `llama3.2` is satisfied by `llama3.2:latest` or `llama3.2:7b-extra`.
pub fn model_available(requested: &str, available: &[String]) -> bool {
    if requested.contains(':') {
        return available.iter().any(|model| model == requested);
    }
    available.iter().any(|model| {
        let base = model.split_once(':').map_or(model.as_str(), |(base, _)| base);
        base == requested
    })
}

use std::future::Future;

use tracing::info;

use crate::config::{self, Config, DEFAULT_PROVIDER_ENV, ProviderSpec};
use crate::error::AskError;
use crate::provider::ProviderConfig;
use crate::providers;

/// Routes a prompt to the selected provider and returns its command.
pub struct CommandRouter {
    config: Config,
}

impl CommandRouter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picks the provider: `--model` first, then `default_model`, then the
    /// environment/liveness probe.
    pub async fn select_provider(
        &self,
        model: Option<&str>,
    ) -> Result<(String, ProviderConfig), AskError> {
        self.select_provider_with(model, || config::default_provider(&self.config))
            .await
    }

    /// [`CommandRouter::select_provider`] with an injected fallback probe,
    /// called only when neither a selector nor `default_model` is present.
    pub async fn select_provider_with<P, F>(
        &self,
        model: Option<&str>,
        probe: P,
    ) -> Result<(String, ProviderConfig), AskError>
    where
        P: FnOnce() -> F,
        F: Future<Output = Option<String>>,
    {
        let selector = match model {
            Some(model) => model.to_string(),
            None => match self.config.default_model() {
                Some(default_model) => default_model,
                None => probe().await.ok_or_else(no_provider_error)?,
            },
        };

        let spec = ProviderSpec::parse(&selector)?;
        let (name, mut provider_config) = self.config.resolve_provider(&spec);
        if let Some(model) = &spec.model {
            // A nested [provider.model] section may alias the model; anything
            // else runs the model that was asked for.
            if !self.config.has_model_section(&spec) || !provider_config.contains_key("model_name")
            {
                provider_config.insert("model_name", model.clone());
            }
        }

        info!("Selected provider {} ({})", name, selector);
        Ok((name, provider_config))
    }

    /// Selects, builds and validates a provider, then asks it for a command.
    pub async fn process_prompt(&self, prompt: &str, model: Option<&str>) -> Result<String, AskError> {
        let (name, provider_config) = self.select_provider(model).await?;
        Self::run_provider(&name, provider_config, prompt).await
    }

    pub async fn run_provider(
        name: &str,
        provider_config: ProviderConfig,
        prompt: &str,
    ) -> Result<String, AskError> {
        let mut provider = providers::create_provider(name, provider_config)?;
        provider.validate_config().await?;
        provider.get_bash_command(prompt).await
    }
}

fn no_provider_error() -> AskError {
    let variables: Vec<&str> = DEFAULT_PROVIDER_ENV
        .iter()
        .map(|(variable, _)| *variable)
        .collect();
    AskError::Configuration(format!(
        "no provider available. Set one of {}, start Ollama (ollama serve), \
         or set default_model in the [ask] section of ~/.config/ask/config.toml",
        variables.join(", ")
    ))
}

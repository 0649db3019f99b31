use std::fs;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use toml::{Table, Value};
use tracing::{debug, info, warn};

use crate::error::AskError;
use crate::provider::{ProviderConfig, env_lookup};
use crate::providers::ollama;

/// Reserved top-level section holding global settings.
pub const GLOBAL_SECTION: &str = "ask";

/// Credential variables probed for a default provider, in priority order.
pub const DEFAULT_PROVIDER_ENV: &[(&str, &str)] = &[
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("OPENAI_API_KEY", "openai"),
    ("GEMINI_API_KEY", "gemini"),
    ("XAI_API_KEY", "grok"),
];

/// A `provider[:model]` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub provider: String,
    pub model: Option<String>,
}

impl ProviderSpec {
    /// Splits on the first `:` only, so `p:m:x` names model `m:x`.
    pub fn parse(spec: &str) -> Result<Self, AskError> {
        let (provider, model) = match spec.split_once(':') {
            Some((provider, model)) => (provider.trim(), Some(model.trim())),
            None => (spec.trim(), None),
        };

        if provider.is_empty() {
            return Err(AskError::Configuration(format!(
                "invalid provider spec '{spec}': provider name is empty"
            )));
        }

        Ok(Self {
            provider: provider.to_string(),
            model: model.filter(|model| !model.is_empty()).map(str::to_string),
        })
    }
}

/// Layered configuration loaded once per run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    table: Table,
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the first config file found, or an empty
    /// configuration when there is none.
    pub fn load() -> Result<Self, AskError> {
        match Self::locate_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parses the file at `path`. Any read or parse failure is fatal.
    pub fn load_from(path: &Path) -> Result<Self, AskError> {
        let content = fs::read_to_string(path).map_err(|err| {
            AskError::Configuration(format!(
                "failed to read config file '{}': {err}",
                path.display()
            ))
        })?;
        let table: Table = toml::from_str(&content).map_err(|err| {
            AskError::Configuration(format!(
                "failed to parse config file '{}': {err}",
                path.display()
            ))
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(Self {
            table,
            path: Some(path.to_path_buf()),
        })
    }

    /// First existing config file for the current environment.
    pub fn locate_path() -> Option<PathBuf> {
        let xdg = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
        Self::candidate_paths(xdg, home_dir())
            .into_iter()
            .find(|path| path.exists())
    }

    /// Config file candidates in lookup order: the XDG location (or its
    /// `~/.config` default), then the legacy `~/.ask` location.
    pub fn candidate_paths(xdg_config_home: Option<PathBuf>, home: Option<PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        let config_home = xdg_config_home
            .filter(|dir| !dir.as_os_str().is_empty())
            .or_else(|| home.as_ref().map(|home| home.join(".config")));
        if let Some(dir) = config_home {
            paths.push(dir.join("ask").join("config.toml"));
        }
        if let Some(home) = home {
            paths.push(home.join(".ask").join("config.toml"));
        }
        paths
    }

    /// Where this configuration was read from, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `default_model` from the global section.
    pub fn default_model(&self) -> Option<String> {
        self.table
            .get(GLOBAL_SECTION)
            .and_then(Value::as_table)
            .and_then(|global| global.get("default_model"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
    }

    /// Merges global settings with the settings for `spec`; provider or
    /// model keys win. A model without its own nested section falls back to
    /// the whole provider section.
    pub fn resolve_provider(&self, spec: &ProviderSpec) -> (String, ProviderConfig) {
        let provider_section = self
            .table
            .get(&spec.provider)
            .and_then(Value::as_table);

        let specific = match (&spec.model, provider_section) {
            (Some(model), Some(section)) => match section.get(model).and_then(Value::as_table) {
                Some(model_section) => model_section.clone(),
                None => {
                    warn!(
                        "No [{}.{}] section in config, using [{}] settings",
                        spec.provider, model, spec.provider
                    );
                    section.clone()
                }
            },
            (Some(model), None) => {
                warn!(
                    "No [{}.{}] section in config, using [{}] settings",
                    spec.provider, model, spec.provider
                );
                Table::new()
            }
            (None, Some(section)) => section.clone(),
            (None, None) => Table::new(),
        };

        let mut merged = self.global_settings();
        merged.merge(&ProviderConfig::from(specific));
        debug!("Resolved config for {}: {:?}", spec.provider, merged);
        (spec.provider.clone(), merged)
    }

    /// Whether a nested `[provider.model]` section exists for `spec`.
    pub fn has_model_section(&self, spec: &ProviderSpec) -> bool {
        let Some(model) = &spec.model else {
            return false;
        };
        self.table
            .get(&spec.provider)
            .and_then(Value::as_table)
            .and_then(|section| section.get(model))
            .is_some_and(Value::is_table)
    }

    /// Address of the local Ollama server as configured in `[ollama]`.
    pub fn ollama_base_url(&self) -> String {
        let spec = ProviderSpec {
            provider: ollama::NAME.to_string(),
            model: None,
        };
        let (_, settings) = self.resolve_provider(&spec);
        ollama::OllamaProvider::new(settings).base_url()
    }

    fn global_settings(&self) -> ProviderConfig {
        self.table
            .get(GLOBAL_SECTION)
            .and_then(Value::as_table)
            .cloned()
            .map(ProviderConfig::from)
            .unwrap_or_default()
    }

    /// Human-readable summary for `--show-config`.
    pub fn describe(&self, detected_provider: Option<&str>) -> String {
        let mut lines = Vec::new();
        match self.path() {
            Some(path) => lines.push(format!("Configuration file: {}", path.display())),
            None => lines.push("Configuration file: not found (using defaults)".to_string()),
        }
        lines.push(format!(
            "Default model: {}",
            self.default_model().as_deref().unwrap_or("not set")
        ));
        lines.push(format!(
            "Detected provider: {}",
            detected_provider.unwrap_or("none")
        ));
        lines.push(String::new());
        lines.push("To choose a provider, set one of:".to_string());
        for (variable, provider) in DEFAULT_PROVIDER_ENV {
            lines.push(format!("  export {variable}=<your-key>    # {provider}"));
        }
        lines.push("or add to the config file:".to_string());
        lines.push(format!("  [{GLOBAL_SECTION}]"));
        lines.push("  default_model = \"ollama:llama3.2\"".to_string());
        lines.join("\n")
    }
}

impl From<Table> for Config {
    fn from(table: Table) -> Self {
        Self { table, path: None }
    }
}

/// Picks a provider when neither `--model` nor `default_model` is set: the
/// first credential variable present wins, then a reachable local Ollama at
/// the address `config` gives it.
pub async fn default_provider(config: &Config) -> Option<String> {
    let base_url = config.ollama_base_url();
    default_provider_with(env_lookup, || ollama::is_reachable(base_url)).await
}

/// [`default_provider`] with injected environment lookup and liveness probe.
pub async fn default_provider_with<L, P, F>(lookup: L, probe: P) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
    P: FnOnce() -> F,
    F: std::future::Future<Output = bool>,
{
    for &(variable, provider) in DEFAULT_PROVIDER_ENV {
        if lookup(variable).is_some_and(|value| !value.trim().is_empty()) {
            info!("Found {}, defaulting to {}", variable, provider);
            return Some(provider.to_string());
        }
    }

    if probe().await {
        info!("Local Ollama is reachable, defaulting to ollama");
        return Some(ollama::NAME.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn config(text: &str) -> Config {
        Config::from(toml::from_str::<Table>(text).unwrap())
    }

    #[test]
    fn test_parse_provider_only() {
        let spec = ProviderSpec::parse("ollama").unwrap();
        assert_eq!(spec.provider, "ollama");
        assert_eq!(spec.model, None);
    }

    #[test]
    fn test_parse_provider_and_model() {
        let spec = ProviderSpec::parse("p:m").unwrap();
        assert_eq!(spec.provider, "p");
        assert_eq!(spec.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let spec = ProviderSpec::parse("p:m:x").unwrap();
        assert_eq!(spec.provider, "p");
        assert_eq!(spec.model.as_deref(), Some("m:x"));

        let spec = ProviderSpec::parse("ollama:llama3.2:latest").unwrap();
        assert_eq!(spec.model.as_deref(), Some("llama3.2:latest"));
    }

    #[test]
    fn test_parse_rejects_empty_provider() {
        assert!(matches!(
            ProviderSpec::parse(":model"),
            Err(AskError::Configuration(_))
        ));
        assert!(matches!(ProviderSpec::parse(""), Err(AskError::Configuration(_))));
    }

    #[test]
    fn test_parse_trailing_colon_has_no_model() {
        let spec = ProviderSpec::parse("grok:").unwrap();
        assert_eq!(spec.model, None);
    }

    #[test]
    fn test_provider_settings_override_global() {
        let config = config(
            r#"
            [ask]
            temperature = 0.1

            [p]
            model_name = "a"
            temperature = 0.9
            "#,
        );

        let (name, resolved) = config.resolve_provider(&ProviderSpec::parse("p").unwrap());
        assert_eq!(name, "p");
        assert_eq!(resolved.get_f64("temperature"), Some(0.9));
        assert_eq!(resolved.get_str("model_name").as_deref(), Some("a"));
    }

    #[test]
    fn test_nested_model_section_is_used() {
        let config = config(
            r#"
            [openai]
            temperature = 0.2

            [openai.gpt-4o]
            model_name = "gpt-4o"
            max_tokens = 300
            "#,
        );

        let (_, resolved) = config.resolve_provider(&ProviderSpec::parse("openai:gpt-4o").unwrap());
        assert_eq!(resolved.get_str("model_name").as_deref(), Some("gpt-4o"));
        assert_eq!(resolved.get_u64("max_tokens"), Some(300));
        assert!(!resolved.contains_key("temperature"));
    }

    #[test]
    fn test_missing_model_section_falls_back_to_provider() {
        let config = config("[p]\nk = 1\n");

        let (name, resolved) = config.resolve_provider(&ProviderSpec::parse("p:m").unwrap());
        assert_eq!(name, "p");
        assert_eq!(resolved, ProviderConfig::new().with("k", 1));
    }

    #[test]
    fn test_unknown_provider_resolves_to_globals_only() {
        let config = config("[ask]\ndefault_model = \"grok\"\n");

        let (name, resolved) = config.resolve_provider(&ProviderSpec::parse("nobody").unwrap());
        assert_eq!(name, "nobody");
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("default_model"));
    }

    #[test]
    fn test_default_model() {
        assert_eq!(
            config("[ask]\ndefault_model = \"ollama:llama3.2\"\n")
                .default_model()
                .as_deref(),
            Some("ollama:llama3.2")
        );
        assert_eq!(config("").default_model(), None);
        assert_eq!(config("[ask]\ndefault_model = \"\"\n").default_model(), None);
    }

    #[test]
    fn test_candidate_paths_prefer_xdg() {
        let paths = Config::candidate_paths(
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/xdg/ask/config.toml"),
                PathBuf::from("/home/u/.ask/config.toml"),
            ]
        );
    }

    #[test]
    fn test_candidate_paths_default_to_dot_config() {
        let paths = Config::candidate_paths(Some(PathBuf::new()), Some(PathBuf::from("/home/u")));
        assert_eq!(paths[0], PathBuf::from("/home/u/.config/ask/config.toml"));

        assert!(Config::candidate_paths(None, None).is_empty());
    }

    #[test]
    fn test_load_from_reads_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ask]\ndefault_model = \"grok\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_model().as_deref(), Some("grok"));
        assert_eq!(config.path(), Some(path.as_path()));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ask\ndefault_model = ").unwrap();

        match Config::load_from(&path) {
            Err(AskError::Configuration(message)) => {
                assert!(message.contains(&path.display().to_string()));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_directory_at_config_path_is_located_and_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ask").join("config.toml");
        fs::create_dir_all(&path).unwrap();

        assert!(path.exists());
        assert!(matches!(
            Config::load_from(&path),
            Err(AskError::Configuration(_))
        ));
    }

    #[test]
    fn test_ollama_base_url_follows_config() {
        assert_eq!(Config::default().ollama_base_url(), "http://localhost:11434");
        assert_eq!(
            config("[ollama]\nhost = \"10.0.0.5\"\nport = 8081\n").ollama_base_url(),
            "http://10.0.0.5:8081"
        );
        assert_eq!(
            config("[ask]\ntemperature = 0.2\n[ollama]\nbase_url = \"http://gpu:11434\"\n")
                .ollama_base_url(),
            "http://gpu:11434"
        );
    }

    #[test]
    fn test_has_model_section() {
        let config = config("[openai]\nmodel_name = \"x\"\n\n[openai.smart]\nmodel_name = \"gpt-4o\"\n");

        assert!(config.has_model_section(&ProviderSpec::parse("openai:smart").unwrap()));
        assert!(!config.has_model_section(&ProviderSpec::parse("openai:model_name").unwrap()));
        assert!(!config.has_model_section(&ProviderSpec::parse("openai").unwrap()));
    }

    #[test]
    fn test_describe_without_file() {
        let text = Config::default().describe(Some("grok"));

        assert!(text.contains("Configuration file: not found"));
        assert!(text.contains("Default model: not set"));
        assert!(text.contains("Detected provider: grok"));
        assert!(text.contains("export XAI_API_KEY=<your-key>"));
    }

    #[tokio::test]
    async fn test_default_provider_env_priority() {
        let probed = Cell::new(false);
        let provider = default_provider_with(
            |name| matches!(name, "OPENAI_API_KEY" | "XAI_API_KEY").then(|| "key".to_string()),
            || {
                probed.set(true);
                async { true }
            },
        )
        .await;
        assert_eq!(provider.as_deref(), Some("openai"));
        assert!(!probed.get());
    }

    #[tokio::test]
    async fn test_default_provider_ignores_empty_keys() {
        let provider = default_provider_with(
            |name| {
                let value = if name == "XAI_API_KEY" { "xai" } else { "" };
                Some(value.to_string())
            },
            || async { false },
        )
        .await;
        assert_eq!(provider.as_deref(), Some("grok"));
    }

    #[tokio::test]
    async fn test_default_provider_falls_back_to_ollama() {
        let provider = default_provider_with(|_| None, || async { true }).await;
        assert_eq!(provider.as_deref(), Some("ollama"));

        let provider = default_provider_with(|_| None, || async { false }).await;
        assert_eq!(provider, None);
    }
}

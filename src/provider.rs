//! The contract every backend implements, and the pieces they share.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use toml::{Table, Value};

use crate::error::AskError;

/// System prompt used by every backend unless configured otherwise.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a bash command generator. Given a user request, \
respond with ONLY the bash command that accomplishes the task. \
Do not include explanations, comments, or any other text. \
Just the command.";

/// A backend able to turn a natural-language request into a shell command.
///
/// Implementations hold a [`ClientState`] and create their client on the
/// first call to [`Provider::validate_config`]. Calling
/// [`Provider::get_bash_command`] on an unvalidated provider validates it
/// first; calling it on a validated one reuses the stored client.
#[async_trait]
pub trait Provider: Send {
    /// Registry name of the backend.
    fn name(&self) -> &'static str;

    /// The merged configuration this instance runs with.
    fn config(&self) -> &ProviderConfig;

    /// Built-in defaults, used as the base under any user configuration.
    fn default_config() -> ProviderConfig
    where
        Self: Sized;

    /// Establishes the backend client and stores it for reuse.
    async fn validate_config(&mut self) -> Result<(), AskError>;

    /// Returns exactly one shell command for `prompt`.
    async fn get_bash_command(&mut self, prompt: &str) -> Result<String, AskError>;
}

/// Lazily created client handle.
#[derive(Debug, Clone, Default)]
pub enum ClientState<C> {
    #[default]
    Uninitialized,
    Validated(C),
}

impl<C> ClientState<C> {
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated(_))
    }

    pub fn client(&self) -> Option<&C> {
        match self {
            Self::Validated(client) => Some(client),
            Self::Uninitialized => None,
        }
    }
}

/// Flat, string-keyed settings for one provider instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig(Table);

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`ProviderConfig::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// String value of `key`; numbers and booleans are rendered as text.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Integer(value) => Some(value.to_string()),
            Value::Float(value) => Some(value.to_string()),
            Value::Boolean(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Float value of `key`, accepting integers and numeric strings.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Float(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            Value::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Non-negative integer value of `key`, accepting numeric strings.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Integer(value) => u64::try_from(*value).ok(),
            Value::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflict.
    pub fn merge(&mut self, other: &ProviderConfig) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Returns `self` with `other` merged on top.
    pub fn merged_with(mut self, other: &ProviderConfig) -> Self {
        self.merge(other);
        self
    }
}

impl From<Table> for ProviderConfig {
    fn from(table: Table) -> Self {
        Self(table)
    }
}

/// Looks up a credential by environment variable name.
pub type KeyLookup = fn(&str) -> Option<String>;

/// [`KeyLookup`] backed by the process environment.
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Builds the base config shared by the hosted backends.
pub(crate) fn hosted_defaults(model_name: &str, api_key_env: &str) -> ProviderConfig {
    ProviderConfig::new()
        .with("model_name", model_name)
        .with("max_tokens", 150)
        .with("api_key_env", api_key_env)
        .with("temperature", 0.5)
        .with("system_prompt", DEFAULT_SYSTEM_PROMPT)
}

/// Reads the credential named by the `api_key_env` setting.
pub(crate) fn read_api_key(config: &ProviderConfig, lookup: KeyLookup) -> Result<String, AskError> {
    let key_env = config
        .get_str("api_key_env")
        .ok_or_else(|| AskError::Configuration("api_key_env is not configured".to_string()))?;
    lookup(&key_env)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            AskError::Authentication(format!("{key_env} environment variable is not set"))
        })
}

static BASH_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```[ \t]*(?:bash|sh|shell)[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
        .expect("fence pattern is valid")
});

/// Returns the body of the first ```` ```bash ```` block in `raw`, dropping
/// any prose around it; without such a block, returns `raw` trimmed.
pub fn extract_bash_command(raw: &str) -> String {
    match BASH_FENCE.captures(raw).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => raw.trim().to_string(),
    }
}

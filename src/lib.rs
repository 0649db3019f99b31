//! Ask - natural language to shell command translation.
//!
//! This library turns a request such as "list files by size" into a single
//! shell command by delegating to a pluggable AI backend:
//!
//! - **Local models** via an Ollama server
//! - **Hosted APIs**: xAI Grok, OpenAI, Anthropic and Google Gemini
//!
//! # Architecture
//!
//! - [`config`] - Layered configuration and `provider[:model]` resolution
//! - [`provider`] - The contract every backend implements
//! - [`providers`] - Backend implementations and the name registry
//! - [`command_router`] - Selects, validates and runs one provider
//! - [`error`] - Error taxonomy and vendor error classification
//! - [`http_client`] - JSON over HTTP shared by the backends
//!
//! # Example
//!
//! ```ignore
//! use ask::command_router::CommandRouter;
//! use ask::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = CommandRouter::new(Config::load()?);
//!     let command = router.process_prompt("list files", Some("ollama:llama3.2")).await?;
//!     println!("{command}");
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Settings live in `$XDG_CONFIG_HOME/ask/config.toml` (default
//! `~/.config/ask/config.toml`, legacy `~/.ask/config.toml`):
//!
//! ```toml
//! [ask]
//! default_model = "ollama:llama3.2"
//! temperature = 0.2
//!
//! [ollama]
//! host = "localhost"
//! port = 11434
//!
//! [openai.smart]
//! model_name = "gpt-4o"
//! max_tokens = 300
//! ```

pub mod command_router;
pub mod config;
pub mod error;
pub mod http_client;
pub mod provider;
pub mod providers;

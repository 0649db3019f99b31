//! xAI Grok backend, reached through its OpenAI-compatible chat API.

use crate::providers::chat_completions::{ChatCompletionsProvider, ChatVendor};

pub const NAME: &str = "grok";

pub struct Xai;

impl ChatVendor for Xai {
    const NAME: &'static str = NAME;
    const LABEL: &'static str = "xAI";
    const BASE_URL: &'static str = "https://api.x.ai/v1";
    const DEFAULT_MODEL: &'static str = "grok-3-fast";
    const API_KEY_ENV: &'static str = "XAI_API_KEY";
}

pub type GrokProvider = ChatCompletionsProvider<Xai>;

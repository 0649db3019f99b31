//! OpenAI chat completions backend.

use crate::providers::chat_completions::{ChatCompletionsProvider, ChatVendor};

pub const NAME: &str = "openai";

pub struct OpenAi;

impl ChatVendor for OpenAi {
    const NAME: &'static str = NAME;
    const LABEL: &'static str = "OpenAI";
    const BASE_URL: &'static str = "https://api.openai.com/v1";
    const DEFAULT_MODEL: &'static str = "gpt-3.5-turbo";
    const API_KEY_ENV: &'static str = "OPENAI_API_KEY";
}

pub type OpenAiProvider = ChatCompletionsProvider<OpenAi>;

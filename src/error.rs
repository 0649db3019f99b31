//! Error taxonomy and vendor error classification.
//!
//! Backends report failures as free-form text. The classifier maps that text
//! onto an [`ErrorKind`] by walking an ordered list of lower-cased substring
//! rules, first match wins. Substring matching on vendor messages is
//! approximate: a vendor rewording its errors silently moves them into the
//! generic [`ErrorKind::Api`] bucket.

use thiserror::Error;

/// Every failure the core can report to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// Bad or unreadable config file, unknown provider, nothing to select.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or rejected credential, or an unreachable local service.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The backend refused the request because of rate or quota limits.
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Any other upstream failure, including empty responses.
    #[error("API error: {0}")]
    Api(String),
}

impl AskError {
    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(message)
            | Self::Authentication(message)
            | Self::RateLimit(message)
            | Self::Api(message) => message,
        }
    }
}

/// Classification outcome for a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    RateLimit,
    Api,
}

impl ErrorKind {
    pub fn into_error(self, message: impl Into<String>) -> AskError {
        let message = message.into();
        match self {
            Self::Authentication => AskError::Authentication(message),
            Self::RateLimit => AskError::RateLimit(message),
            Self::Api => AskError::Api(message),
        }
    }
}

/// Rules shared by the hosted API providers.
pub const HOSTED_RULES: &[(&str, ErrorKind)] = &[
    ("authentication", ErrorKind::Authentication),
    ("unauthorized", ErrorKind::Authentication),
    ("invalid api key", ErrorKind::Authentication),
    ("rate limit", ErrorKind::RateLimit),
    ("quota", ErrorKind::RateLimit),
    ("too many requests", ErrorKind::RateLimit),
];

/// Narrower rules for the local model server.
pub const LOCAL_RULES: &[(&str, ErrorKind)] = &[
    ("connection", ErrorKind::Authentication),
    ("refused", ErrorKind::Authentication),
    ("not found", ErrorKind::Api),
    ("model", ErrorKind::Api),
];

/// Returns the kind of the first rule whose substring occurs in `message`,
/// compared case-insensitively. `None` means no rule matched.
pub fn match_rule(rules: &[(&str, ErrorKind)], message: &str) -> Option<ErrorKind> {
    let lowered = message.to_lowercase();
    rules
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, kind)| *kind)
}

/// Classifies `message` against `rules`, falling back to [`ErrorKind::Api`].
pub fn classify(rules: &[(&str, ErrorKind)], message: &str) -> ErrorKind {
    match_rule(rules, message).unwrap_or(ErrorKind::Api)
}

/// Turns a hosted backend failure into an [`AskError`], keeping the original
/// text and naming the backend it came from.
pub fn classify_hosted_error(backend: &str, message: &str) -> AskError {
    classify(HOSTED_RULES, message).into_error(format!("{backend}: {message}"))
}

//! HTTP client abstraction for backend communication.
//!
//! Every backend speaks JSON over HTTP. [`JsonClient`] binds a base URL and a
//! set of headers once, then sends requests relative to that base. Failures
//! are reported as [`HttpError`] whose text is what the error classifier
//! inspects, so the status line and response body are kept verbatim.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Transport-level failure talking to a backend.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request never produced a response (DNS, refused connection, ...).
    #[error("connection to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The response body was not valid JSON, or not the expected shape.
    #[error("invalid JSON in response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// JSON client bound to one backend.
///
/// # Example
///
/// ```ignore
/// use ask::http_client::JsonClient;
///
/// let client = JsonClient::new("https://api.x.ai/v1").with_bearer_auth("xai-...");
/// let body = client
///     .post_json("/chat/completions", &serde_json::json!({"model": "grok-3-fast"}))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl JsonClient {
    /// Creates a client for `base_url`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds an `Authorization: Bearer` header.
    pub fn with_bearer_auth(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a GET request to `path` and decodes the JSON response.
    pub async fn get_json(&self, path: &str) -> Result<Value, HttpError> {
        self.get(path).await
    }

    /// Sends a GET request to `path` and decodes the response into `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let url = self.url(path);
        debug!("GET {}", url);
        let request = self.apply_headers(self.client.get(&url));
        Self::read_json(url, request).await
    }

    /// Sends `body` as JSON in a POST request to `path` and decodes the JSON
    /// response.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, HttpError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let request = self.apply_headers(self.client.post(&url)).json(body);
        Self::read_json(url, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn read_json<T: DeserializeOwned>(
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<T, HttpError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(HttpError::Request { url, source }),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|source| HttpError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = JsonClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.url("/api/tags"), "http://localhost:11434/api/tags");
    }

    #[tokio::test]
    async fn test_post_json_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/echo"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_json(json!({"hello": "world"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = JsonClient::new(format!("{}/v1", server.uri())).with_bearer_auth("secret");
        let body = client
            .post_json("/echo", &json!({"hello": "world"}))
            .await
            .unwrap();

        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_status_keeps_status_line_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = JsonClient::new(server.uri())
            .get_json("/limited")
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Status { .. }));
        assert_eq!(err.to_string(), "429 Too Many Requests: slow down");
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/text"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = JsonClient::new(server.uri())
            .get_json("/text")
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_typed_get_rejects_wrong_shape() {
        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/named"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "x"})))
            .mount(&server)
            .await;

        let err = JsonClient::new(server.uri())
            .get::<Named>("/named")
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_request_error() {
        // Nothing listens on the discard port.
        let err = JsonClient::new("http://127.0.0.1:9")
            .get_json("/api/tags")
            .await
            .unwrap_err();

        assert!(matches!(err, HttpError::Request { .. }));
        assert!(err.to_string().starts_with("connection to http://127.0.0.1:9/api/tags failed"));
    }
}

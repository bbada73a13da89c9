//! HTTP client for the fitcms admin API, exercise media surface.
//!
//! [`ApiClient`] is the transport: configurable auth (Bearer token or
//! X-API-Key), JSON and multipart helpers, and mapping of non-2xx responses to
//! [`MediaError`]. [`MediaClient`] composes it with the request gate, the
//! rate-limit retrier and the response cache. The CLI and the state
//! controller use `MediaClient` directly.

pub mod cache;
pub mod gate;
pub mod media;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use fitcms_core::{ClientConfig, MediaError, MediaResult, UploadForm};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub use cache::{CacheEntry, ResponseCache};
pub use gate::RequestGate;
pub use media::{MediaClient, UploadHandle};
pub use retry::{with_retry, RetryPolicy};
pub use transport::{ProgressReporter, Transport};

/// Upload bodies are streamed in chunks of this size so progress can be reported.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

/// Pull the server message out of an error body.
///
/// The API answers `{"error": {"message": ...}}`; `{"message": ...}`,
/// `{"error": "..."}` and plain text bodies are accepted too.
pub fn extract_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .pointer("/error/message")
            .or_else(|| json.get("message"))
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .and_then(|m| m.as_str())
            .map(|m| m.to_string()),
        Err(_) => Some(body.to_string()),
    }
}

/// HTTP client for the admin API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_prefix: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(
        base_url: String,
        api_prefix: String,
        auth: Auth,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_prefix: format!("/{}", api_prefix.trim_matches('/')),
            auth,
        })
    }

    /// Bearer token wins over the API key when both are configured.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let auth = match (&config.api_token, &config.api_key) {
            (Some(token), _) => Auth::Bearer(token.clone()),
            (None, Some(key)) => Auth::XApiKey(key.clone()),
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "Missing credentials. Set FITCMS_API_TOKEN or FITCMS_API_KEY"
                ))
            }
        };

        Self::new(
            config.api_url.clone(),
            config.api_prefix.clone(),
            auth,
            config.request_timeout(),
        )
    }

    /// Create client from environment (see [`ClientConfig::from_env`]).
    pub fn from_env() -> anyhow::Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        if self.api_prefix == "/" {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}{}", self.base_url, self.api_prefix, path)
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
        }
    }

    /// Send the request and decode the JSON body; empty bodies decode to `Value::Null`.
    async fn execute(&self, request: reqwest::RequestBuilder) -> MediaResult<Value> {
        let request = self.apply_auth(request);

        let response = request
            .send()
            .await
            .map_err(|e| MediaError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MediaError::Network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let err = MediaError::from_status(status.as_u16(), extract_error_message(&text));
            tracing::debug!(status = status.as_u16(), error = %err, "API request failed");
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| MediaError::Decode(format!("Failed to parse response as JSON: {}", e)))
    }

    /// Multipart body whose file part reports progress as chunks are handed to the connection.
    fn upload_form(
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<reqwest::multipart::Form> {
        let total = form.file.len() as u64;
        let chunks: Vec<Bytes> = form
            .file
            .bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(Bytes::copy_from_slice)
            .collect();

        let mut sent = 0u64;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress.report(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let mut file_part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            total,
        )
        .file_name(form.file.file_name.clone());
        if let Some(content_type) = form.file.content_type.as_deref() {
            file_part = file_part
                .mime_str(content_type)
                .map_err(|e| MediaError::Validation(format!("Invalid content type: {}", e)))?;
        }

        let mut multipart = reqwest::multipart::Form::new()
            .text("exerciseId", form.exercise_id.clone())
            .text("viewAngle", form.view_angle.as_wire())
            .text("mediaType", form.media_type.as_wire());
        if let Some(title) = form.title.clone() {
            multipart = multipart.text("title", title);
        }
        Ok(multipart.part("file", file_part))
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn get(&self, path: &str) -> MediaResult<Value> {
        self.execute(self.client.get(self.build_url(path))).await
    }

    async fn put_json(&self, path: &str, body: Value) -> MediaResult<Value> {
        self.execute(self.client.put(self.build_url(path)).json(&body))
            .await
    }

    async fn delete(&self, path: &str) -> MediaResult<Value> {
        self.execute(self.client.delete(self.build_url(path))).await
    }

    async fn post_multipart(
        &self,
        path: &str,
        form: &UploadForm,
        progress: ProgressReporter,
    ) -> MediaResult<Value> {
        let multipart = Self::upload_form(form, progress)?;
        self.execute(self.client.post(self.build_url(path)).multipart(multipart))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Media not found"}}"#).as_deref(),
            Some("Media not found")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"Too many requests"}"#).as_deref(),
            Some("Too many requests")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"Bad angle"}"#).as_deref(),
            Some("Bad angle")
        );
        assert_eq!(extract_error_message(r#"{"error":{}}"#), None);
        assert_eq!(extract_error_message("  "), None);
        assert_eq!(
            extract_error_message("Gateway Timeout").as_deref(),
            Some("Gateway Timeout")
        );
    }

    #[test]
    fn test_build_url_joins_prefix() {
        let client = ApiClient::new(
            "http://localhost:3000/".to_string(),
            "api/".to_string(),
            Auth::XApiKey("key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.build_url("/exercises/ex1/media"),
            "http://localhost:3000/api/exercises/ex1/media"
        );

        let bare = ApiClient::new(
            "http://localhost:3000".to_string(),
            "/".to_string(),
            Auth::XApiKey("key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(bare.build_url("/exercises"), "http://localhost:3000/exercises");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        assert!(ApiClient::from_config(&ClientConfig::default()).is_err());

        let config = ClientConfig {
            api_token: Some("token".to_string()),
            ..ClientConfig::default()
        };
        assert!(ApiClient::from_config(&config).is_ok());
    }
}

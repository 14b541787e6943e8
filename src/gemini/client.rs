//! Gemini API client struct and builder.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{ApiKey, ModelConfig};
use crate::error::RelayError;
use crate::gemini::sse::fragment_stream;
use crate::gemini::types::GenerateContentRequest;
use crate::relay::model::{FragmentStream, GenerativeModel, Prompt};

/// Client for the Gemini `streamGenerateContent` endpoint.
///
/// ```no_run
/// use gemini_relay::config::{ApiKey, ModelConfig};
/// use gemini_relay::gemini::GeminiClient;
///
/// let key = ApiKey::new("AIza...").unwrap();
/// let client = GeminiClient::new(key, &ModelConfig::default())
///     .unwrap()
///     .model("gemini-2.5-pro");
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client from the model configuration.
    pub fn new(api_key: ApiKey, config: &ModelConfig) -> Result<Self, RelayError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }

        Ok(Self {
            api_key,
            model: config.name.clone(),
            base_url: config.base_url.clone(),
            client: builder.build()?,
        })
    }

    /// Override the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream_generate(&self, prompt: &Prompt) -> Result<FragmentStream, RelayError> {
        let body = GenerateContentRequest::from(prompt);

        debug!(model = %self.model, parts = body.contents[0].parts.len(), "Opening generation stream");

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RelayError::from_status(status.as_u16(), &text));
        }

        Ok(fragment_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_trims_trailing_slash() {
        let client = GeminiClient::new(ApiKey::new("k").unwrap(), &ModelConfig::default())
            .unwrap()
            .base_url("http://localhost:1234/")
            .model("gemini-test");
        assert_eq!(
            client.stream_url(),
            "http://localhost:1234/v1beta/models/gemini-test:streamGenerateContent?alt=sse"
        );
        assert_eq!(client.name(), "gemini-test");
    }

    #[test]
    fn debug_does_not_leak_key() {
        let client =
            GeminiClient::new(ApiKey::new("AIzaSecret").unwrap(), &ModelConfig::default()).unwrap();
        assert!(!format!("{client:?}").contains("AIzaSecret"));
    }
}

//! OpenAI-compatible provider implementation

use std::time::Duration;

use async_trait::async_trait;
use axon_config::{DEFAULT_BASE_URL, ProviderConfig};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{EventStream, Provider};
use crate::convert::openai::openai_chunk_to_events;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_BASE_URL).map_err(|e| LlmError::Internal(e.into()))?,
        };

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| LlmError::Internal(e.into()))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Build the chat completions URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Prepare an authenticated POST for the given wire request
    fn post(&self, wire_request: &OpenAiRequest) -> RequestBuilder {
        let builder = self.client.post(self.completions_url()).json(wire_request);

        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, wire_request: &OpenAiRequest) -> Result<reqwest::Response, LlmError> {
        let response = self.post(wire_request).send().await.map_err(|e| {
            tracing::error!(base_url = %self.base_url, error = %e, "upstream request failed");
            LlmError::Upstream(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "upstream returned error");
            return Err(LlmError::Upstream(format!("provider returned {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut wire_request = OpenAiRequest::from(request);
        wire_request.stream = None;
        wire_request.stream_options = None;

        let wire_response: OpenAiResponse = self
            .send(&wire_request)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Upstream(format!("failed to parse response: {e}")))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<EventStream, LlmError> {
        let mut wire_request = OpenAiRequest::from(request);
        wire_request.stream = Some(true);
        wire_request.stream_options = Some(OpenAiStreamOptions { include_usage: true });

        let response = self.send(&wire_request).await?;

        let mapped = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }

                    match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => openai_chunk_to_events(chunk).into_iter().map(Ok).collect(),
                        Err(e) => {
                            tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(LlmError::Streaming(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(mapped))
    }
}

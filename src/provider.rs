//! Upstream chat completion client.
//!
//! [`ChatProvider`] is the port the relay talks to; [`OpenAiProvider`] speaks
//! the `OpenAI` Chat Completions API over HTTP. Retries and timeouts live
//! here, not in the relay.

use crate::config::ProviderSettings;
use crate::error::{RelayError, Result};
use crate::translate::openai_types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatErrorResponse,
    ProviderMessage,
};
use crate::translate::request::build_completion_request;
use crate::translate::response::{chunk_text, completion_text, describe_provider_error, truncate};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::Stream;
use futures::StreamExt;
use reqwest::StatusCode;
use std::pin::Pin;
use std::time::Duration;

/// A finite, non-restartable sequence of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Wait for the full completion and return its text.
    async fn invoke(&self, messages: &[ProviderMessage]) -> Result<String>;

    /// Open a fresh fragment stream for one completion.
    async fn stream(&self, messages: &[ProviderMessage]) -> Result<FragmentStream>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    settings: ProviderSettings,
    endpoint: String,
    client: reqwest::Client,
    retry_base: Duration,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.timeout())
            .build()?;
        Self::with_client(settings, client)
    }

    pub fn with_client(settings: ProviderSettings, client: reqwest::Client) -> Result<Self> {
        let endpoint = format!("{}/chat/completions", settings.effective_base_url()?);
        Ok(Self {
            settings,
            endpoint,
            client,
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Base delay of the exponential retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the request, retrying connection failures, timeouts, 429 and 5xx
    /// up to `max_retries` times. Returns only successful responses.
    async fn send(
        &self,
        body: &ChatCompletionRequest,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let max_retries = self.settings.max_retries;
        let mut attempt = 0;

        loop {
            let err = match self.send_once(body, streaming).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if is_retryable_status(status) && attempt < max_retries {
                        RelayError::provider(format!("status {}", status.as_u16()))
                    } else {
                        let text = match response.text().await {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to read provider error body");
                                format!("failed to read body: {e}")
                            }
                        };
                        tracing::warn!(
                            status = status.as_u16(),
                            body = truncate(&text, 300),
                            "Provider rejected request"
                        );
                        return Err(RelayError::provider(describe_provider_error(
                            status.as_u16(),
                            &text,
                        )));
                    }
                }
                Err(e) if e.is_retryable() && attempt < max_retries => e,
                Err(e) => return Err(e),
            };

            let delay = self.backoff(attempt);
            attempt += 1;
            tracing::warn!(
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(
        &self,
        body: &ChatCompletionRequest,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let timeout = self.settings.timeout();
        let mut request = self.client.post(&self.endpoint).json(body);

        if !self.settings.api_key.is_empty() {
            request = request.bearer_auth(&self.settings.api_key);
        }
        // A streamed body may legitimately outlive the timeout; its fragments
        // are bounded one at a time instead.
        if !streaming {
            request = request.timeout(timeout);
        }

        match tokio::time::timeout(timeout, request.send()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RelayError::Timeout(timeout)),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_RETRY_DELAY)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn invoke(&self, messages: &[ProviderMessage]) -> Result<String> {
        let body = build_completion_request(messages, &self.settings, false);
        tracing::debug!(endpoint = %self.endpoint, model = %body.model, "POST (single-shot)");

        let response = self.send(&body, false).await?;
        let text = response.text().await?;
        let completion: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            RelayError::provider(format!(
                "Failed to parse provider response: {}. Body: {}",
                e,
                truncate(&text, 300)
            ))
        })?;

        Ok(completion_text(&completion))
    }

    async fn stream(&self, messages: &[ProviderMessage]) -> Result<FragmentStream> {
        let body = build_completion_request(messages, &self.settings, true);
        tracing::debug!(endpoint = %self.endpoint, model = %body.model, "POST (streaming)");

        let response = self.send(&body, true).await?;
        Ok(Box::pin(sse_fragments(
            response.bytes_stream(),
            self.settings.timeout(),
        )))
    }
}

/// Parse an `OpenAI` SSE byte stream into text fragments. Every wait for the
/// next event is bounded by `idle_timeout`.
fn sse_fragments<S>(
    byte_stream: S,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::stream! {
        let events = byte_stream.eventsource();
        tokio::pin!(events);

        loop {
            let next = match tokio::time::timeout(idle_timeout, events.next()).await {
                Ok(next) => next,
                Err(_) => {
                    yield Err(RelayError::Timeout(idle_timeout));
                    break;
                }
            };

            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    yield Err(RelayError::provider(format!("Stream interrupted: {e}")));
                    break;
                }
                None => break,
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                break;
            }

            // Chunk fields all default, so the error envelope must be tried first.
            if let Ok(err) = serde_json::from_str::<ChatErrorResponse>(data) {
                yield Err(RelayError::provider(err.error.message));
                break;
            }

            match serde_json::from_str::<ChatCompletionChunk>(data) {
                Ok(chunk) => {
                    if let Some(text) = chunk_text(&chunk) {
                        yield Ok(text.to_string());
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Skipping unparseable chunk"),
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

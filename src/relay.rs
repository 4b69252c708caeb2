//! Completion relay: drives a [`ChatProvider`] in single-shot or streaming
//! mode and adapts its output to the client wire format.
//!
//! Provider failures never escape as errors. They become `"Error: ..."`
//! content in the normal payload, so a relayed call always ends in a
//! well-formed response.

use crate::logging::RequestLogger;
use crate::provider::ChatProvider;
use crate::translate::chat_types::{ChatResponse, StreamChunk};
use crate::translate::openai_types::ProviderMessage;
use crate::translate::streaming::{StreamFramer, ERROR_PREFIX};

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

/// Single-shot completion. Always yields exactly one assistant response.
pub async fn complete(
    provider: &dyn ChatProvider,
    messages: &[ProviderMessage],
    log: &RequestLogger,
) -> ChatResponse {
    let start = Instant::now();

    match provider.invoke(messages).await {
        Ok(content) => {
            log.info(
                "relay",
                format!(
                    "Completed model={} chars={} elapsed_ms={}",
                    provider.model(),
                    content.len(),
                    start.elapsed().as_millis()
                ),
            );
            ChatResponse::assistant(content)
        }
        Err(e) => {
            log.warn("relay", format!("Completion failed: {e}"));
            ChatResponse::assistant(format!("{ERROR_PREFIX}{}", e.detail()))
        }
    }
}

/// Streaming completion as a sequence of chunks.
///
/// Fragments are forwarded in provider order as they arrive; the sequence
/// always ends with one `done: true` chunk. The provider stream is pulled only
/// when the consumer asks for the next chunk, and dropping the returned stream
/// drops the provider stream with it.
pub fn relay_stream(
    provider: Arc<dyn ChatProvider>,
    messages: Vec<ProviderMessage>,
    log: RequestLogger,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let mut guard = DisconnectGuard::new(log.clone());
        let mut framer = StreamFramer::new();
        let start = Instant::now();

        match provider.stream(&messages).await {
            Ok(mut fragments) => {
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(text) => {
                            if let Some(chunk) = framer.fragment(&text) {
                                yield chunk;
                            }
                        }
                        Err(e) => {
                            log.warn(
                                "relay",
                                format!("Stream failed after {} fragments: {e}", framer.fragments()),
                            );
                            if let Some(chunk) = framer.error(e.detail()) {
                                yield chunk;
                            }
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                log.warn("relay", format!("Stream could not start: {e}"));
                if let Some(chunk) = framer.error(e.detail()) {
                    yield chunk;
                }
            }
        }

        if let Some(done) = framer.finish() {
            guard.finished = true;
            log.info(
                "relay",
                format!(
                    "Stream completed model={} fragments={} elapsed_ms={}",
                    provider.model(),
                    framer.fragments(),
                    start.elapsed().as_millis()
                ),
            );
            yield done;
        }
    }
}

/// Encode chunks as an NDJSON byte stream for an HTTP body.
pub fn ndjson_body(
    chunks: impl Stream<Item = StreamChunk> + Send + 'static,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    chunks.map(|chunk| Ok(Bytes::from(chunk.to_ndjson_line())))
}

/// Notes a client that went away before the terminal chunk.
struct DisconnectGuard {
    log: RequestLogger,
    finished: bool,
}

impl DisconnectGuard {
    fn new(log: RequestLogger) -> Self {
        Self {
            log,
            finished: false,
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.log
                .warn("relay", "Client disconnected before stream completed");
        }
    }
}

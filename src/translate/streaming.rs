//! State machine framing provider fragments as NDJSON stream chunks.
//!
//! The [`StreamFramer`] turns each provider fragment into a [`StreamChunk`] and
//! guarantees the stream ends with exactly one terminal `done: true` record.

use super::chat_types::StreamChunk;

/// Prefix of content-level error reports.
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    Streaming,
    Done,
}

/// Usage:
///   let mut framer = StreamFramer::new();
///   for fragment in fragments {
///       if let Some(chunk) = framer.fragment(&fragment) { /* send */ }
///   }
///   let last = framer.finish();
#[derive(Debug)]
pub struct StreamFramer {
    state: StreamState,
    fragments: usize,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            state: StreamState::NotStarted,
            fragments: 0,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of chunks emitted before the terminal record.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Frame one provider fragment. Empty fragments produce nothing.
    pub fn fragment(&mut self, text: &str) -> Option<StreamChunk> {
        if self.state == StreamState::Done {
            return None;
        }
        self.state = StreamState::Streaming;

        if text.is_empty() {
            return None;
        }
        self.fragments += 1;
        Some(StreamChunk::fragment(text))
    }

    /// Frame a provider failure as a content-level error fragment.
    pub fn error(&mut self, message: impl std::fmt::Display) -> Option<StreamChunk> {
        if self.state == StreamState::Done {
            return None;
        }
        self.state = StreamState::Streaming;
        self.fragments += 1;
        Some(StreamChunk::fragment(format!("{ERROR_PREFIX}{message}")))
    }

    /// Close the stream. Returns the terminal record the first time only.
    pub fn finish(&mut self) -> Option<StreamChunk> {
        if self.state == StreamState::Done {
            return None;
        }
        self.state = StreamState::Done;
        Some(StreamChunk::done())
    }
}

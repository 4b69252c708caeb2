//! Translation between the client chat format and the `OpenAI` format.
//!
//! Converts requests into provider messages, pulls text out of provider
//! responses, and frames streamed fragments as NDJSON. All functions here are
//! pure (no I/O).

pub mod chat_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;

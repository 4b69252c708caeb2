use super::openai_types::{ChatCompletionChunk, ChatCompletionResponse, ChatErrorResponse};

const ERROR_BODY_LIMIT: usize = 500;

/// Text of the first choice of a completion. A missing choice or null content
/// reads as an empty reply.
pub fn completion_text(resp: &ChatCompletionResponse) -> String {
    resp.choices
        .first()
        .and_then(|c| c.message.content.clone())
        .unwrap_or_default()
}

/// Text fragment carried by a streaming chunk, if any.
pub fn chunk_text(chunk: &ChatCompletionChunk) -> Option<&str> {
    chunk
        .choices
        .first()
        .and_then(|c| c.delta.content.as_deref())
        .filter(|s| !s.is_empty())
}

/// Human-readable description of a failed provider call.
pub fn describe_provider_error(status: u16, body: &str) -> String {
    if let Ok(err) = serde_json::from_str::<ChatErrorResponse>(body) {
        return format!("status {}: {}", status, err.error.message);
    }

    let body = body.trim();
    if body.is_empty() {
        format!("status {status}")
    } else {
        format!("status {}: {}", status, truncate(body, ERROR_BODY_LIMIT))
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

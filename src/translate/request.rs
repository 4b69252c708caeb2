//! Translate client chat requests into `OpenAI` Chat Completions requests.

use crate::config::ProviderSettings;

use super::chat_types::{ChatMessage, Role};
use super::openai_types::{ChatCompletionRequest, ProviderMessage};

/// Map the client's messages into the provider's message sequence.
///
/// A non-empty `system_prompt` always becomes the first message, even when
/// `messages` already carries system entries. The rest keep their order.
pub fn to_provider_messages(
    messages: &[ChatMessage],
    system_prompt: Option<&str>,
) -> Vec<ProviderMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);

    if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
        out.push(ProviderMessage::System {
            content: prompt.to_string(),
        });
    }

    out.extend(messages.iter().map(translate_message));
    out
}

fn translate_message(msg: &ChatMessage) -> ProviderMessage {
    let content = msg.content.clone();
    match msg.role {
        Role::User => ProviderMessage::User { content },
        Role::Assistant => ProviderMessage::Assistant { content },
        Role::System => ProviderMessage::System { content },
    }
}

/// Wrap translated messages with the configured model parameters.
pub fn build_completion_request(
    messages: &[ProviderMessage],
    settings: &ProviderSettings,
    stream: bool,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: settings.model.clone(),
        messages: messages.to_vec(),
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        top_p: settings.top_p,
        frequency_penalty: settings.frequency_penalty,
        presence_penalty: settings.presence_penalty,
        stream: stream.then_some(true),
    }
}

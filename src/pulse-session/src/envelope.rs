//! Request envelope construction.

use pulse_client::{ChatMessage, ChatRequest};
use pulse_storage::Message;

use crate::config::ChatConfig;

/// Build the request for the current conversation.
///
/// The system prompt comes first, followed by the full history in order.
pub fn build_request(config: &ChatConfig, history: &[Message]) -> ChatRequest {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(config.system_prompt.as_str()));
    messages.extend(history.iter().map(|m| {
        if m.is_user() {
            ChatMessage::user(m.content())
        } else {
            ChatMessage::assistant(m.content())
        }
    }));
    ChatRequest::new(config.model.as_str(), messages).with_stream(config.stream)
}

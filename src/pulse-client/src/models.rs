//! Wire types for the chat-completion API.

use serde::{Deserialize, Serialize};

/// Author of a message sent to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message for completions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author (system, user, assistant)
    pub role: Role,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Outbound request body.
///
/// Always serializes `stream`, since the endpoint defaults to a single
/// payload when the field is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use for completion
    pub model: String,
    /// Whether to stream the response
    pub stream: bool,
    /// Messages in the conversation, system prompt first
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Create a new non-streaming chat request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            messages,
        }
    }

    /// Enable or disable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Role/content pair carried by a choice.
///
/// Both fields are optional: the first streamed delta usually carries only
/// the role, later ones only content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PayloadDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One entry of `choices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadChoice {
    /// Present on streamed chunks.
    #[serde(default)]
    pub delta: Option<PayloadDelta>,
    /// Present on single-payload responses.
    #[serde(default)]
    pub message: Option<PayloadDelta>,
}

impl PayloadChoice {
    /// The fragment carried by this choice, whichever key holds it.
    pub fn fragment(&self) -> Option<&PayloadDelta> {
        self.delta.as_ref().or(self.message.as_ref())
    }
}

/// Decoded response record: a streamed chunk or the complete response.
///
/// Only `choices` is read; other top-level keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionPayload {
    pub choices: Vec<PayloadChoice>,
}

impl CompletionPayload {
    /// First choice's fragment, if any.
    pub fn first_fragment(&self) -> Option<&PayloadDelta> {
        self.choices.first().and_then(PayloadChoice::fragment)
    }

    /// First choice's content, if any.
    pub fn content(&self) -> Option<&str> {
        self.first_fragment().and_then(|d| d.content.as_deref())
    }
}

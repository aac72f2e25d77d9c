//! Chat-completion client for Pulse.
//!
//! This crate talks to an OpenAI-compatible `chat/completions` endpoint and
//! turns its response body, streamed or not, into a growing reply text:
//!
//! - [`ChatClient`] opens requests and forwards raw body chunks
//! - [`FrameDecoder`] cuts those chunks into [`StreamFrame`]s
//! - [`DeltaAccumulator`] folds frames into the reply text

mod accumulator;
mod client;
mod error;
mod frame;
pub mod http;
mod models;

pub use accumulator::DeltaAccumulator;
pub use client::{ChatClient, ClientOptions, Transport, TransportEvent, TransportHandle};
pub use error::{ClientError, DecodeError, Result};
pub use frame::{DATA_PREFIX, DONE_SENTINEL, DecodeMode, FrameDecoder, StreamFrame};
pub use http::{HttpSettings, TrustPolicy};
pub use models::{ChatMessage, ChatRequest, CompletionPayload, PayloadChoice, PayloadDelta, Role};

/// Default chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// System prompt placed at the head of every request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

//! Conversation log and its persistence.
//!
//! - [`types`] - Message and identifier types
//! - [`store`] - The ordered, persisted log

mod store;
mod types;

pub use store::{ConversationStore, DEFAULT_CONVERSATION_KEY, decode, encode};
pub use types::{Message, MessageId};

//! Pulse Session - the chat session controller.
//!
//! Ties the client and storage crates together: [`ChatConfig`] resolves
//! settings, [`build_request`] turns the conversation into a request, and
//! [`ChatSession`] runs the idle / awaiting-response state machine that
//! writes each reply snapshot into the [`ConversationStore`].
//!
//! [`ConversationStore`]: pulse_storage::ConversationStore

pub mod config;
mod envelope;
mod error;
mod session;

pub use config::{ChatConfig, INVALID_ENDPOINT, MISSING_API_KEY};
pub use envelope::build_request;
pub use error::{Result, SessionError};
pub use session::{ChatSession, SessionState, SessionUpdate, Submission};

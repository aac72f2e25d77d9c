//! Pulse Storage - conversation persistence.
//!
//! - OS-aware data and config directories ([`PulsePaths`])
//! - Byte-blob persistence behind [`KeyValueStore`] ([`FileStore`], [`MemoryStore`])
//! - The ordered conversation log ([`ConversationStore`])
//!
//! # Usage
//!
//! ```rust,no_run
//! use pulse_storage::{ConversationStore, FileStore, PulsePaths, DEFAULT_CONVERSATION_KEY};
//!
//! fn main() -> pulse_storage::Result<()> {
//!     let paths = PulsePaths::new()?;
//!     paths.ensure_dirs()?;
//!
//!     let kv = FileStore::from_paths(&paths);
//!     let mut store = ConversationStore::load(Box::new(kv), DEFAULT_CONVERSATION_KEY);
//!     store.append_user_message("Hello!");
//!     println!("{} messages", store.len());
//!     Ok(())
//! }
//! ```

pub mod conversation;
pub mod error;
pub mod kv;
pub mod paths;

pub use conversation::{ConversationStore, DEFAULT_CONVERSATION_KEY, Message, MessageId};
pub use error::{Result, StorageError};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use paths::{PulsePaths, default_config_path, pulse_config_dir, pulse_data_dir};

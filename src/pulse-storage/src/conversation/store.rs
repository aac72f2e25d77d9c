//! The ordered conversation log.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::kv::{KeyValueStore, MemoryStore};

use super::types::{Message, MessageId};

/// Key under which the conversation is persisted.
pub const DEFAULT_CONVERSATION_KEY: &str = "conversation";

/// Ordered, persisted conversation.
///
/// Insertion order is display order. At most one assistant message is open
/// for appending at a time; every other message is immutable. Each
/// successful mutation writes the full sequence to the backing
/// [`KeyValueStore`] and publishes it to subscribers. Persistence failures are
/// logged and never propagate.
pub struct ConversationStore {
    kv: Box<dyn KeyValueStore>,
    key: String,
    messages: Vec<Message>,
    open: Option<MessageId>,
    observers: watch::Sender<Vec<Message>>,
}

impl ConversationStore {
    /// Restore the conversation stored under `key`, or start empty.
    pub fn load(kv: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let messages = match kv.get(&key) {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(messages) => {
                    info!(key = %key, count = messages.len(), "Restored conversation");
                    messages
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Stored conversation is unreadable, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!(key = %key, "No stored conversation");
                Vec::new()
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to load conversation, starting empty");
                Vec::new()
            }
        };

        let (observers, _) = watch::channel(messages.clone());
        Self {
            kv,
            key,
            messages,
            open: None,
            observers,
        }
    }

    /// Empty conversation backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStore::new()), DEFAULT_CONVERSATION_KEY)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    /// The assistant message currently receiving content.
    pub fn open_message(&self) -> Option<MessageId> {
        self.open
    }

    /// Receive the full sequence after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.observers.subscribe()
    }

    /// Append an immutable user message.
    pub fn append_user_message(&mut self, text: impl Into<String>) -> MessageId {
        let message = Message::user(text);
        let id = message.id();
        self.messages.push(message);
        debug!(message_id = %id, "Appended user message");
        self.commit();
        id
    }

    /// Append an empty assistant message and open it for appending.
    pub fn append_assistant_placeholder(&mut self) -> Result<MessageId> {
        if let Some(open) = self.open {
            return Err(StorageError::MessageStillOpen(open));
        }
        let message = Message::assistant("");
        let id = message.id();
        self.messages.push(message);
        self.open = Some(id);
        debug!(message_id = %id, "Opened assistant placeholder");
        self.commit();
        Ok(id)
    }

    /// Overwrite the content of the open assistant message.
    ///
    /// Any other identifier leaves the store untouched.
    pub fn update_content(&mut self, id: MessageId, text: impl Into<String>) -> Result<()> {
        if self.open != Some(id) {
            let err = if self.get(id).is_some() {
                StorageError::MessageNotOpen(id)
            } else {
                StorageError::MessageNotFound(id)
            };
            warn!(message_id = %id, error = %err, "Ignoring content update");
            return Err(err);
        }

        let text = text.into();
        let Some(message) = self.messages.iter_mut().find(|m| m.id() == id) else {
            return Err(StorageError::MessageNotFound(id));
        };
        if message.content() == text {
            return Ok(());
        }
        message.set_content(text);
        self.commit();
        Ok(())
    }

    /// Freeze the open assistant message, if any.
    pub fn close_open_message(&mut self) -> Option<MessageId> {
        let closed = self.open.take();
        if let Some(id) = closed {
            debug!(message_id = %id, "Closed assistant message");
        }
        closed
    }

    /// Remove every message.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(open) = self.open {
            return Err(StorageError::MessageStillOpen(open));
        }
        self.messages.clear();
        info!(key = %self.key, "Cleared conversation");
        self.commit();
        Ok(())
    }

    fn commit(&mut self) {
        self.observers.send_replace(self.messages.clone());
        self.persist();
    }

    fn persist(&self) {
        let result = encode(&self.messages).and_then(|bytes| self.kv.set(&self.key, &bytes));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to persist conversation");
        }
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("key", &self.key)
            .field("messages", &self.messages.len())
            .field("open", &self.open)
            .finish()
    }
}

/// Serialize a message sequence to its persisted form.
pub fn encode(messages: &[Message]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(messages)?)
}

/// Parse a persisted message sequence.
pub fn decode(bytes: &[u8]) -> Result<Vec<Message>> {
    Ok(serde_json::from_slice(bytes)?)
}

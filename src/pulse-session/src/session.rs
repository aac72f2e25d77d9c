//! The chat session state machine.
//!
//! A session is either idle or awaiting one response. Submitting a message
//! records it, opens a request for the whole conversation and appends an empty
//! assistant reply. Transport events then flow through the frame decoder and
//! the delta accumulator, and every accumulated snapshot overwrites the reply
//! in the store. A terminal frame, end of body or failure returns the session
//! to idle.

use std::sync::Arc;

use pulse_client::{
    ChatClient, ClientError, DecodeMode, DeltaAccumulator, FrameDecoder, StreamFrame, Transport,
    TransportEvent, TransportHandle,
};
use pulse_storage::{ConversationStore, Message, MessageId};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::envelope::build_request;
use crate::error::{Result, SessionError};

/// Where the session is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingResponse,
}

/// Outcome of [`ChatSession::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Request opened; `reply` will receive the response.
    Accepted { user: MessageId, reply: MessageId },
    /// No request was sent; `reply` holds the diagnostic.
    Failed {
        user: MessageId,
        reply: MessageId,
        diagnostic: String,
    },
    /// Blank input, nothing recorded.
    Ignored,
}

/// Change to the in-flight reply produced by a transport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Reply content is now `text`.
    Snapshot { id: MessageId, text: String },
    /// Reply complete.
    Finished { id: MessageId },
    /// Request failed; the reply now holds `diagnostic`.
    Failed { id: MessageId, diagnostic: String },
}

/// State of the one request in flight.
struct Turn {
    reply: MessageId,
    handle: TransportHandle,
    decoder: FrameDecoder,
    accumulator: DeltaAccumulator,
}

enum Outcome {
    Pending,
    Finished,
    Failed(String),
}

/// Drives one conversation against a [`Transport`].
pub struct ChatSession {
    config: ChatConfig,
    /// `Err` holds the diagnostic for a client that could not be built.
    transport: std::result::Result<Arc<dyn Transport>, String>,
    store: ConversationStore,
    turn: Option<Turn>,
}

impl ChatSession {
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>, store: ConversationStore) -> Self {
        Self {
            config,
            transport: Ok(transport),
            store,
            turn: None,
        }
    }

    /// Session talking to the configured endpoint over HTTP.
    ///
    /// Never fails: a client that cannot be built turns every submission
    /// into a diagnostic reply.
    pub fn from_config(config: ChatConfig, store: ConversationStore) -> Self {
        let transport = match ChatClient::new(config.client_options()) {
            Ok(client) => Ok(Arc::new(client) as Arc<dyn Transport>),
            Err(e) => {
                warn!(error = %e, "HTTP client unavailable");
                Err(e.diagnostic())
            }
        };
        Self {
            config,
            transport,
            store,
            turn: None,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.turn.is_some() {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.turn.is_some()
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Receive the full conversation after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.store.subscribe()
    }

    /// Submit user input.
    ///
    /// Rejected while a response is pending. Blank input is ignored. When the
    /// configuration cannot produce a request the user message is still
    /// recorded and the reply carries the diagnostic.
    pub fn submit(&mut self, text: &str) -> Result<Submission> {
        if self.is_busy() {
            warn!("Submission rejected, a request is already in flight");
            return Err(SessionError::RequestInFlight);
        }
        if text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return Ok(Submission::Ignored);
        }

        let user = self.store.append_user_message(text);

        let ready = self
            .config
            .validate()
            .map_err(str::to_string)
            .and_then(|()| self.transport.clone());
        let transport = match ready {
            Ok(transport) => transport,
            Err(diagnostic) => return self.fail_submission(user, diagnostic),
        };

        let request = build_request(&self.config, self.store.messages());
        let mode = if request.stream {
            DecodeMode::Stream
        } else {
            DecodeMode::Whole
        };
        info!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.stream,
            "Submitting conversation"
        );
        let handle = transport.open(request);
        let reply = self.store.append_assistant_placeholder()?;

        self.turn = Some(Turn {
            reply,
            handle,
            decoder: FrameDecoder::new(mode),
            accumulator: DeltaAccumulator::new(),
        });
        Ok(Submission::Accepted { user, reply })
    }

    /// Record `diagnostic` as the reply to `user` without sending anything.
    fn fail_submission(&mut self, user: MessageId, diagnostic: String) -> Result<Submission> {
        warn!(diagnostic = %diagnostic, "Request not sent");
        let reply = self.store.append_assistant_placeholder()?;
        self.store.update_content(reply, &diagnostic)?;
        self.store.close_open_message();
        Ok(Submission::Failed {
            user,
            reply,
            diagnostic,
        })
    }

    /// Feed one transport event into the pending reply.
    ///
    /// Events arriving while idle are ignored.
    pub fn apply(&mut self, event: TransportEvent) -> Vec<SessionUpdate> {
        let Some(mut turn) = self.turn.take() else {
            debug!("Ignoring transport event while idle");
            return Vec::new();
        };

        let mut updates = Vec::new();
        let outcome = match event {
            TransportEvent::Chunk(bytes) => {
                turn.decoder.feed(&bytes);
                let frames: Vec<StreamFrame> = turn.decoder.by_ref().collect();
                if self.fold_frames(&mut turn, &frames, &mut updates) {
                    Outcome::Finished
                } else {
                    Outcome::Pending
                }
            }
            TransportEvent::Completed => match turn.decoder.finish() {
                Ok(frames) => {
                    self.fold_frames(&mut turn, &frames, &mut updates);
                    Outcome::Finished
                }
                Err(e) => Outcome::Failed(ClientError::from(e).diagnostic()),
            },
            TransportEvent::Failed(e) => Outcome::Failed(e.diagnostic()),
        };

        match outcome {
            Outcome::Pending => self.turn = Some(turn),
            Outcome::Finished => {
                self.store.close_open_message();
                info!(
                    message_id = %turn.reply,
                    chars = turn.accumulator.text().chars().count(),
                    dropped_lines = turn.decoder.dropped_lines(),
                    "Response complete"
                );
                updates.push(SessionUpdate::Finished { id: turn.reply });
            }
            Outcome::Failed(diagnostic) => {
                warn!(message_id = %turn.reply, diagnostic = %diagnostic, "Response failed");
                if let Err(e) = self.store.update_content(turn.reply, diagnostic.as_str()) {
                    warn!(error = %e, "Could not record diagnostic");
                }
                self.store.close_open_message();
                updates.push(SessionUpdate::Failed {
                    id: turn.reply,
                    diagnostic,
                });
            }
        }
        updates
    }

    /// Wait for the next transport event and apply it.
    ///
    /// Returns `None` when idle.
    pub async fn step(&mut self) -> Option<Vec<SessionUpdate>> {
        let turn = self.turn.as_mut()?;
        let event = match turn.handle.recv().await {
            Some(event) => event,
            None => TransportEvent::Failed(ClientError::Stream(
                "connection closed before the response ended".to_string(),
            )),
        };
        Some(self.apply(event))
    }

    /// Drive the pending request to completion.
    pub async fn wait_idle(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(step) = self.step().await {
            updates.extend(step);
        }
        updates
    }

    /// Abandon the pending request, keeping whatever the reply holds.
    pub fn cancel(&mut self) -> Option<MessageId> {
        let mut turn = self.turn.take()?;
        turn.handle.close();
        self.store.close_open_message();
        info!(message_id = %turn.reply, "Response cancelled");
        Some(turn.reply)
    }

    /// Remove every message. Rejected while a response is pending.
    pub fn clear(&mut self) -> Result<()> {
        if self.is_busy() {
            return Err(SessionError::RequestInFlight);
        }
        self.store.clear()?;
        Ok(())
    }

    /// Returns whether a terminal frame was seen.
    fn fold_frames(
        &mut self,
        turn: &mut Turn,
        frames: &[StreamFrame],
        updates: &mut Vec<SessionUpdate>,
    ) -> bool {
        for frame in frames {
            if frame.terminal {
                turn.accumulator.fold(frame);
                return true;
            }
            let Some(text) = turn.accumulator.fold(frame) else {
                continue;
            };
            let text = text.to_string();
            match self.store.update_content(turn.reply, text.as_str()) {
                Ok(()) => updates.push(SessionUpdate::Snapshot {
                    id: turn.reply,
                    text,
                }),
                Err(e) => warn!(error = %e, "Dropping snapshot"),
            }
        }
        false
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("state", &self.state())
            .finish()
    }
}

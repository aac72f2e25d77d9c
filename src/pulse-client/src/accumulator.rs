//! Folding of streamed fragments into one growing reply.

use tracing::trace;

use crate::frame::StreamFrame;

/// Accumulates content fragments in arrival order.
///
/// Fragments are appended verbatim and never removed. Every non-empty fragment
/// yields a snapshot of the full text so far; frames without content, or with
/// an empty fragment, yield nothing.
/// After a terminal frame the accumulator is closed and ignores further input.
#[derive(Debug, Default, Clone)]
pub struct DeltaAccumulator {
    buffer: String,
    role: Option<String>,
    closed: bool,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame in. Returns the updated full text when it changed.
    pub fn fold(&mut self, frame: &StreamFrame) -> Option<&str> {
        if self.closed {
            trace!("Ignoring frame after accumulation closed");
            return None;
        }
        if frame.terminal {
            self.closed = true;
            return None;
        }
        if self.role.is_none() {
            self.role = frame.role.clone();
        }

        let fragment = frame.content.as_deref().filter(|f| !f.is_empty())?;
        self.buffer.push_str(fragment);
        Some(&self.buffer)
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Role announced by the first frame that carried one.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn into_text(self) -> String {
        self.buffer
    }
}

//! Frame decoding for chat-completion response bodies.
//!
//! Bytes arrive in chunks whose boundaries carry no meaning. The decoder
//! buffers them, cuts complete lines off the front of the buffer and turns
//! each line into at most one [`StreamFrame`]. Nothing is decoded until a
//! line terminator has been seen, so input may be split anywhere, down to a
//! single byte per chunk.
//!
//! Line classification (stream mode):
//! - blank line: skipped
//! - `data: [DONE]`: terminal frame, decoder stops
//! - anything else: the `data:` marker is removed if present and the rest is
//!   decoded as a [`CompletionPayload`]; a line that does not decode is
//!   dropped and logged, never fatal
//!
//! In whole mode the body is a single JSON document (possibly spread over
//! several lines) and is only decoded by [`FrameDecoder::finish`].

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::models::CompletionPayload;

/// Event-stream field marker preceding each payload line.
pub const DATA_PREFIX: &str = "data:";

/// Payload of the final event of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded unit of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    pub role: Option<String>,
    pub content: Option<String>,
    pub terminal: bool,
}

impl StreamFrame {
    /// End-of-stream marker. Carries no content.
    pub fn terminal() -> Self {
        Self {
            role: None,
            content: None,
            terminal: true,
        }
    }

    /// Frame carrying a content fragment.
    pub fn fragment(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
            terminal: false,
        }
    }

    fn from_payload(payload: &CompletionPayload) -> Self {
        let fragment = payload.first_fragment();
        Self {
            role: fragment.and_then(|d| d.role.clone()),
            content: fragment.and_then(|d| d.content.clone()),
            terminal: false,
        }
    }
}

/// How the response body is framed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Server-sent events, one payload per `data:` line.
    #[default]
    Stream,
    /// One JSON document holding the complete reply.
    Whole,
}

/// Incremental, resumable decoder from byte chunks to frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    mode: DecodeMode,
    buffer: BytesMut,
    finished: bool,
    dropped: usize,
}

impl FrameDecoder {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            buffer: BytesMut::new(),
            finished: false,
            dropped: 0,
        }
    }

    /// Whether a terminal frame has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of lines discarded because they did not decode.
    pub fn dropped_lines(&self) -> usize {
        self.dropped
    }

    /// Append a chunk. Frames become available through the iterator.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.finished {
            trace!(len = chunk.len(), "Ignoring bytes after end of stream");
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Signal end of input and return whatever frames remain.
    ///
    /// Stream mode flushes an unterminated last line and appends a terminal
    /// frame if `[DONE]` never arrived. Whole mode decodes the buffered body.
    pub fn finish(&mut self) -> Result<Vec<StreamFrame>, DecodeError> {
        match self.mode {
            DecodeMode::Stream => {
                let mut frames: Vec<StreamFrame> = self.by_ref().collect();
                if !self.finished && !self.buffer.is_empty() {
                    let rest = self.buffer.split();
                    if let Some(frame) = self.classify(&rest) {
                        frames.push(frame);
                    }
                }
                if !self.finished {
                    self.finished = true;
                    frames.push(StreamFrame::terminal());
                }
                Ok(frames)
            }
            DecodeMode::Whole => {
                if self.finished {
                    return Ok(Vec::new());
                }
                self.finished = true;
                let body = self.buffer.split();
                if body.iter().all(u8::is_ascii_whitespace) {
                    return Err(DecodeError::EmptyBody);
                }
                let payload: CompletionPayload = serde_json::from_slice(&body)?;
                let content = payload.content().ok_or(DecodeError::MissingContent)?;
                let frame = StreamFrame {
                    role: payload.first_fragment().and_then(|d| d.role.clone()),
                    content: Some(content.to_string()),
                    terminal: false,
                };
                Ok(vec![frame, StreamFrame::terminal()])
            }
        }
    }

    fn next_line(&mut self) -> Option<BytesMut> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        Some(line)
    }

    fn classify(&mut self, line: &[u8]) -> Option<StreamFrame> {
        let Ok(text) = std::str::from_utf8(line) else {
            debug!(len = line.len(), "Dropping stream line with invalid UTF-8");
            self.dropped += 1;
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let payload = strip_data_prefix(text);
        if payload == DONE_SENTINEL {
            self.finished = true;
            return Some(StreamFrame::terminal());
        }

        match serde_json::from_str::<CompletionPayload>(payload) {
            Ok(decoded) => Some(StreamFrame::from_payload(&decoded)),
            Err(e) => {
                debug!(error = %e, line = %payload, "Dropping undecodable stream line");
                self.dropped += 1;
                None
            }
        }
    }
}

impl Iterator for FrameDecoder {
    type Item = StreamFrame;

    fn next(&mut self) -> Option<StreamFrame> {
        if self.mode == DecodeMode::Whole || self.finished {
            return None;
        }
        while let Some(line) = self.next_line() {
            if let Some(frame) = self.classify(&line) {
                return Some(frame);
            }
        }
        None
    }
}

fn strip_data_prefix(line: &str) -> &str {
    match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

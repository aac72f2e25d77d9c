//! Chat-completion transport.
//!
//! [`ChatClient::open`] spawns one task per request. The task sends the
//! request and forwards raw body chunks over a bounded channel, ending with
//! exactly one `Completed` or `Failed` event. The consumer decides how to
//! decode the bytes; the transport never interprets them.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::accumulator::DeltaAccumulator;
use crate::error::{ClientError, Result};
use crate::frame::{DecodeMode, FrameDecoder};
use crate::http::{HttpSettings, create_client};
use crate::models::ChatRequest;

/// Capacity of the per-request event channel.
const EVENT_BUFFER: usize = 100;

/// Longest error body kept for logs and error values.
const BODY_PREVIEW_CHARS: usize = 200;

/// Something that happened on an open request.
#[derive(Debug)]
pub enum TransportEvent {
    /// Raw body bytes, in arrival order.
    Chunk(Bytes),
    /// Body fully received.
    Completed,
    /// Request or body read failed. No further events follow.
    Failed(ClientError),
}

/// Receiving end of an open request.
///
/// Dropping or closing the handle cancels the request task; no event is
/// observed afterwards.
#[derive(Debug)]
pub struct TransportHandle {
    rx: mpsc::Receiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl TransportHandle {
    pub fn new(rx: mpsc::Receiver<TransportEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { rx, task }
    }

    /// Wait for the next event. `None` once the request is over.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Cancel the request and stop accepting events.
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens chat-completion requests.
pub trait Transport: Send + Sync {
    fn open(&self, request: ChatRequest) -> TransportHandle;
}

/// Connection options for [`ChatClient`].
#[derive(Debug)]
pub struct ClientOptions {
    pub endpoint: String,
    /// Bearer token (protected in memory).
    pub api_key: SecretString,
    pub http: HttpSettings,
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: Url,
    api_key: Arc<SecretString>,
}

impl ChatClient {
    /// Create a client. Fails on an unparsable endpoint or TLS setup error.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let endpoint = Url::parse(&options.endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {e}", options.endpoint)))?;
        let client = create_client(&options.http)?;
        Ok(Self {
            client,
            endpoint,
            api_key: Arc::new(options.api_key),
        })
    }

    /// Send a non-streaming request and return the reply text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let request = request.clone().with_stream(false);
        let resp = self.send(&request).await?;
        let body = resp.bytes().await?;

        let mut decoder = FrameDecoder::new(DecodeMode::Whole);
        decoder.feed(&body);
        let mut accumulator = DeltaAccumulator::new();
        for frame in decoder.finish()? {
            accumulator.fold(&frame);
        }
        Ok(accumulator.into_text())
    }

    async fn send(&self, request: &ChatRequest) -> Result<Response> {
        let body = serde_json::to_vec(request)?;

        info!(
            endpoint = %self.endpoint,
            model = %request.model,
            stream = request.stream,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(self.api_key.expose_secret());
        if request.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let resp = builder.body(body).send().await.map_err(|e| {
            error!(error = %e, endpoint = %self.endpoint, "Failed to send request");
            ClientError::from(e)
        })?;

        debug!(status = %resp.status(), "Response received");
        check_status(resp).await
    }

    async fn forward_body(
        &self,
        request: &ChatRequest,
        tx: &mpsc::Sender<TransportEvent>,
    ) -> Result<()> {
        let resp = self.send(request).await?;
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout
                } else {
                    ClientError::Stream(e.to_string())
                }
            })?;
            if tx.send(TransportEvent::Chunk(chunk)).await.is_err() {
                debug!("Transport receiver dropped, abandoning response body");
                return Ok(());
            }
        }
        Ok(())
    }
}

impl Transport for ChatClient {
    fn open(&self, request: ChatRequest) -> TransportHandle {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = self.clone();

        let task = tokio::spawn(async move {
            let last = match client.forward_body(&request, &tx).await {
                Ok(()) => TransportEvent::Completed,
                Err(e) => {
                    warn!(error = %e, "Chat completion request failed");
                    TransportEvent::Failed(e)
                }
            };
            let _ = tx.send(last).await;
        });

        TransportHandle::new(rx, Some(task))
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let body_preview = if body.chars().count() > BODY_PREVIEW_CHARS {
        let head: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        body
    };

    error!(status = %status, body = %body_preview, "Chat completion endpoint returned an error");
    Err(ClientError::Status {
        status,
        body_preview,
    })
}

//! Backend event stream to chat-completion chunks
//!
//! A forwarder task reads the backend stream and pushes translated events
//! into a bounded channel; the client response drains the other end. Either
//! side going away ends the pair.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, EventStream};
use crate::error::GatewayError;
use crate::protocol::chat::{ChatCompletionChunk, ChunkChoice, ChunkDelta, completion_id, unix_now};
use crate::protocol::completion::CompletionChunk;
use crate::tokens;

/// Terminal payload of both the backend and the client stream
pub const DONE: &str = "[DONE]";

/// Event handed to the client side of a stream
#[derive(Debug)]
pub enum StreamEvent {
    Chunk(ChatCompletionChunk),
    /// Normal end of stream
    Done,
    /// Backend failed mid-stream; nothing follows
    Error(GatewayError),
}

/// Outcome of translating one backend record
#[derive(Debug)]
pub enum Translated {
    Chunk(ChatCompletionChunk),
    Skip,
    Done,
}

/// Per-stream envelope state
///
/// The id is generated once and stamped on every chunk of the stream.
#[derive(Debug, Clone)]
pub struct StreamTranslator {
    id: String,
    model: String,
    created: u64,
}

impl StreamTranslator {
    pub fn new(model: String) -> Self {
        Self {
            id: completion_id(),
            model,
            created: unix_now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Translate one backend `data:` payload
    ///
    /// Unparsable payloads and bare turn markers are skipped.
    pub fn translate(&self, data: &str) -> Translated {
        let data = data.trim();

        if data == DONE {
            return Translated::Done;
        }

        let chunk: CompletionChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable backend chunk");
                return Translated::Skip;
            }
        };

        let text = chunk.text().unwrap_or_default();

        if tokens::is_turn_marker(text) {
            tracing::trace!(token = text, "dropping reserved token event");
            return Translated::Skip;
        }

        Translated::Chunk(self.envelope(text.to_owned()))
    }

    fn envelope(&self, content: String) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta { content },
                finish_reason: None,
            }],
        }
    }
}

/// Start forwarding `events` and return the client side of the stream
///
/// The forwarder runs as a task tracked by `backend`, so shutdown can stop
/// and await it.
pub fn translate_stream(
    backend: &BackendClient,
    events: EventStream,
    translator: StreamTranslator,
) -> ReceiverStream<StreamEvent> {
    let (tx, rx) = mpsc::channel(backend.stream_buffer());

    backend.spawn(forward(events, translator, tx, backend.shutdown_token()));

    ReceiverStream::new(rx)
}

async fn forward(
    mut events: EventStream,
    translator: StreamTranslator,
    tx: mpsc::Sender<StreamEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = tx.closed() => {
                tracing::debug!(id = translator.id(), "client disconnected, closing backend stream");
                return;
            }
            () = shutdown.cancelled() => {
                tracing::debug!(id = translator.id(), "shutting down, closing backend stream");
                return;
            }
            next = events.next() => next,
        };

        let event = match next {
            Some(Ok(data)) => match translator.translate(&data) {
                Translated::Chunk(chunk) => StreamEvent::Chunk(chunk),
                Translated::Skip => continue,
                Translated::Done => StreamEvent::Done,
            },
            Some(Err(error)) => {
                tracing::error!(id = translator.id(), error = %error, "backend stream failed");
                StreamEvent::Error(error)
            }
            // Backend closed without a terminal record
            None => StreamEvent::Done,
        };

        let terminal = !matches!(event, StreamEvent::Chunk(_));

        if tx.send(event).await.is_err() {
            tracing::debug!(id = translator.id(), "client disconnected, closing backend stream");
            return;
        }

        if terminal {
            return;
        }
    }
}

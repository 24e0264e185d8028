//! Drives one client-facing stream: pulls fragments from the active producer,
//! frames them for the wire, keeps the full text, and hands it to the cache
//! once the producer is exhausted.

use std::{fmt, sync::Arc};

use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use summary_datastore::DataStore;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::{PersistKey, SummaryCache},
    error::Error,
    types::FragmentStream,
};

pub type FrameStream = BoxStream<'static, Result<WireFrame, Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `text/event-stream`, one `{"text": ...}` event per fragment and a
    /// final `[DONE]` event
    EventStream,
    /// Bare text chunks
    Raw,
}

impl Encoding {
    pub fn from_sse_flag(use_sse: bool) -> Self {
        if use_sse {
            Encoding::EventStream
        } else {
            Encoding::Raw
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    /// JSON encoded `{"text": ...}` event payload
    Event(String),
    Done,
}

impl WireFrame {
    pub const DONE_SENTINEL: &str = "[DONE]";

    fn encode(fragment: String, encoding: Encoding) -> Self {
        match encoding {
            Encoding::Raw => WireFrame::Text(fragment),
            Encoding::EventStream => {
                WireFrame::Event(serde_json::json!({ "text": fragment }).to_string())
            }
        }
    }

    /// The bytes written to the client for this frame
    pub fn into_payload(self) -> String {
        match self {
            WireFrame::Text(text) | WireFrame::Event(text) => text,
            WireFrame::Done => Self::DONE_SENTINEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Started,
    Streaming,
    Completed,
    Disconnected,
    Failed,
}

impl RunPhase {
    fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Completed | RunPhase::Disconnected | RunPhase::Failed
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            RunPhase::Started => "started",
            RunPhase::Streaming => "streaming",
            RunPhase::Completed => "completed",
            RunPhase::Disconnected => "disconnected",
            RunPhase::Failed => "failed",
        };
        f.write_str(phase)
    }
}

/// State of a single request/response exchange
pub struct StreamRun<D> {
    upstream: FragmentStream,
    encoding: Encoding,
    disconnect: CancellationToken,
    persist: Option<(Arc<SummaryCache<D>>, PersistKey)>,
    buffer: String,
    phase: RunPhase,
}

impl<D> StreamRun<D>
where
    D: DataStore + Send + Sync + 'static,
{
    pub fn new(upstream: FragmentStream, encoding: Encoding, disconnect: CancellationToken) -> Self {
        Self {
            upstream,
            encoding,
            disconnect,
            persist: None,
            buffer: String::new(),
            phase: RunPhase::Started,
        }
    }

    /// Saves the accumulated text under `key` once the upstream completes
    pub fn persist_to(mut self, cache: Arc<SummaryCache<D>>, key: PersistKey) -> Self {
        self.persist = Some((cache, key));
        self
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<WireFrame, Error>> + Send + 'static {
        stream::unfold(self, |mut run| async move {
            let frame = run.next_frame().await?;
            Some((frame, run))
        })
    }

    async fn next_frame(&mut self) -> Option<Result<WireFrame, Error>> {
        loop {
            match self.phase {
                RunPhase::Started => self.phase = RunPhase::Streaming,
                RunPhase::Streaming => {}
                _ => return None,
            }

            if self.disconnect.is_cancelled() {
                tracing::info!(
                    emitted_bytes = self.buffer.len(),
                    "Client disconnected, abandoning stream"
                );
                self.finish(RunPhase::Disconnected);
                return None;
            }

            match self.upstream.next().await {
                Some(Ok(fragment)) if fragment.is_empty() => continue,
                Some(Ok(fragment)) => {
                    self.buffer.push_str(&fragment);
                    return Some(Ok(WireFrame::encode(fragment, self.encoding)));
                }
                Some(Err(Error::Cancelled)) => {
                    tracing::info!("Streaming cancelled");
                    self.finish(RunPhase::Failed);
                    return Some(Err(Error::Cancelled));
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Upstream failed, terminating stream");
                    self.finish(RunPhase::Failed);
                    return Some(Err(e));
                }
                None => {
                    self.complete();
                    return match self.encoding {
                        Encoding::EventStream => Some(Ok(WireFrame::Done)),
                        Encoding::Raw => None,
                    };
                }
            }
        }
    }

    fn complete(&mut self) {
        let markdown = std::mem::take(&mut self.buffer);
        if let Some((cache, key)) = self.persist.take() {
            tracing::info!(video_id = %key.video_id, "Stream completed, saving summary");
            // detached: the response never waits on persistence
            drop(cache.spawn_write(key, markdown));
        }
        self.phase = RunPhase::Completed;
        tracing::debug!(phase = %self.phase, "Stream run finished");
    }

    /// Ends the run without persistence and releases the upstream producer
    fn finish(&mut self, phase: RunPhase) {
        self.upstream = stream::empty().boxed();
        self.persist = None;
        self.buffer.clear();
        self.phase = phase;
        tracing::debug!(phase = %self.phase, "Stream run finished");
    }
}

/// A run dropped before reaching a terminal phase was abandoned by its
/// consumer; flags the disconnect token so everything sharing it sees it.
impl<D> Drop for StreamRun<D> {
    fn drop(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::info!(
            phase = %self.phase,
            emitted_bytes = self.buffer.len(),
            "Client disconnected, abandoning stream"
        );
        self.phase = RunPhase::Disconnected;
        self.disconnect.cancel();
    }
}

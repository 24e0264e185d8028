pub mod builder;

use std::sync::Arc;

use futures::StreamExt;
use summary_datastore::DataStore;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::{PersistKey, SummaryCache},
    coordinator::{Encoding, FrameStream, StreamRun},
    error::Error,
    grouper::group_phrases,
    llm::{completion::CompletionClient, summarizer::Summarizer},
    types::{Credential, ShortenRequest, SummaryRequest},
    video_id::VideoId,
    yt::{TranscriptMode, TranscriptSource},
};

/// The video summary pipeline: url validation, cache lookup, transcript
/// retrieval, grouping, summarization and streaming with write-back.
pub struct Pipeline<T, C, D>
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    transcriber: T,
    summarizer: Summarizer<C>,
    cache: Arc<SummaryCache<D>>,
    segment_max_length: usize,
}

impl<T, C, D> Pipeline<T, C, D>
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    /// Streams the timestamped summary of the requested video.
    ///
    /// Url validation, the cache lookup and the transcript retrieval happen
    /// before the stream is returned, so their failures surface as errors
    /// here; summarization failures terminate the returned stream instead.
    #[tracing::instrument(skip_all, fields(url = %request.url))]
    pub async fn summary_stream(
        &self,
        request: SummaryRequest,
        credential: Option<Credential>,
        disconnect: CancellationToken,
    ) -> Result<FrameStream, Error> {
        let video_id = VideoId::extract(&request.url)?;
        let encoding = Encoding::from_sse_flag(request.use_sse);

        if request.use_cache {
            if let Some(cached) = self.cache.read(&video_id).await {
                tracing::info!(%video_id, "Returning cached summary");
                return Ok(StreamRun::<D>::new(cached, encoding, disconnect)
                    .into_stream()
                    .boxed());
            }
        }

        let mode = TranscriptMode::from_whisper_flag(request.use_whisper);
        let phrases = self
            .transcriber
            .fetch_phrases(&video_id, mode)
            .await
            .map_err(|e| Error::Transcript(e.to_string()))
            .inspect_err(|e| tracing::error!(error = %e, %video_id, "Failed to fetch transcript"))?;

        let segments = group_phrases(phrases, self.segment_max_length);
        tracing::info!(%video_id, segments = segments.len(), "Summarizing transcript");

        let fragments = self
            .summarizer
            .summarize_segments(segments, credential, &video_id);
        let key = PersistKey {
            video_id,
            source_url: request.url,
        };

        Ok(StreamRun::new(fragments, encoding, disconnect)
            .persist_to(Arc::clone(&self.cache), key)
            .into_stream()
            .boxed())
    }

    /// Streams a shortened rewrite of the given markdown. Never cached.
    #[tracing::instrument(skip_all, fields(content_len = request.content.len()))]
    pub async fn shorten_stream(
        &self,
        request: ShortenRequest,
        credential: Option<Credential>,
        disconnect: CancellationToken,
    ) -> Result<FrameStream, Error> {
        let encoding = Encoding::from_sse_flag(request.use_sse);
        let fragments = self.summarizer.shorten(request.content, credential);

        Ok(StreamRun::<D>::new(fragments, encoding, disconnect)
            .into_stream()
            .boxed())
    }
}

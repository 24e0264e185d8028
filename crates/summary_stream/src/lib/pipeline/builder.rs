use std::sync::Arc;

use summary_datastore::DataStore;
use tokio::sync::Semaphore;

use crate::{
    cache::SummaryCache, grouper::DEFAULT_MAX_SEGMENT_LENGTH,
    llm::summarizer::Summarizer, yt::TranscriptSource, CompletionClient, Pipeline,
};

pub struct PipelineBuilder<T = (), C = (), D = ()> {
    transcriber: T,
    completion_client: C,
    store: D,
    segment_max_length: usize,
    max_concurrent_completions: Option<usize>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            transcriber: (),
            completion_client: (),
            store: (),
            segment_max_length: DEFAULT_MAX_SEGMENT_LENGTH,
            max_concurrent_completions: None,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, D> PipelineBuilder<T, C, D> {
    pub fn transcriber<T2: TranscriptSource + Send + Sync + 'static>(
        self,
        transcriber: T2,
    ) -> PipelineBuilder<T2, C, D> {
        PipelineBuilder {
            transcriber,
            completion_client: self.completion_client,
            store: self.store,
            segment_max_length: self.segment_max_length,
            max_concurrent_completions: self.max_concurrent_completions,
        }
    }

    pub fn completion_client<C2: CompletionClient + Send + Sync + 'static>(
        self,
        completion_client: C2,
    ) -> PipelineBuilder<T, C2, D> {
        PipelineBuilder {
            transcriber: self.transcriber,
            completion_client,
            store: self.store,
            segment_max_length: self.segment_max_length,
            max_concurrent_completions: self.max_concurrent_completions,
        }
    }

    pub fn store<D2: DataStore + Send + Sync + 'static>(
        self,
        store: D2,
    ) -> PipelineBuilder<T, C, D2> {
        PipelineBuilder {
            transcriber: self.transcriber,
            completion_client: self.completion_client,
            store,
            segment_max_length: self.segment_max_length,
            max_concurrent_completions: self.max_concurrent_completions,
        }
    }

    pub fn segment_max_length(mut self, segment_max_length: usize) -> Self {
        self.segment_max_length = segment_max_length;
        self
    }

    pub fn max_concurrent_completions(mut self, permits: usize) -> Self {
        self.max_concurrent_completions = Some(permits);
        self
    }
}

impl<T, C, D> PipelineBuilder<T, C, D>
where
    T: TranscriptSource + Send + Sync + 'static,
    C: CompletionClient + Send + Sync + 'static,
    D: DataStore + Send + Sync + 'static,
{
    pub fn build(self) -> Pipeline<T, C, D> {
        let mut summarizer = Summarizer::new(self.completion_client);
        if let Some(permits) = self.max_concurrent_completions {
            summarizer = summarizer.with_permits(Arc::new(Semaphore::new(permits.max(1))));
        }

        Pipeline {
            transcriber: self.transcriber,
            summarizer,
            cache: Arc::new(SummaryCache::new(self.store)),
            segment_max_length: self.segment_max_length,
        }
    }
}

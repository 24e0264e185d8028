use std::sync::Arc;

use futures::{stream, StreamExt};
use summary_datastore::{DataStore, InsertOutcome, NewSummary};
use tokio::task::JoinHandle;

use crate::{types::FragmentStream, video_id::VideoId};

/// Identifies where a completed summary is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistKey {
    pub video_id: VideoId,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// A summary was already stored, or there was nothing to store
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheWriteError {
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Read-through store of completed summaries, keyed by video id
pub struct SummaryCache<D> {
    store: D,
}

impl<D> SummaryCache<D>
where
    D: DataStore + Send + Sync + 'static,
{
    pub fn new(store: D) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Streams the stored markdown line by line, keeping line terminators.
    ///
    /// Missing records, empty markdown and store failures all count as a miss.
    #[tracing::instrument(skip(self))]
    pub async fn read(&self, video_id: &VideoId) -> Option<FragmentStream> {
        let record = match self.store.get_summary(video_id.as_str()).await {
            Ok(record) => record?,
            Err(e) => {
                tracing::warn!(error = ?e, "Failed to read cached summary, treating as a miss");
                return None;
            }
        };

        if !record.has_markdown() {
            return None;
        }
        tracing::info!("Cache hit");

        let lines = record
            .summary_markdown
            .split_inclusive('\n')
            .map(|line| Ok(line.to_string()))
            .collect::<Vec<_>>();

        Some(stream::iter(lines).boxed())
    }

    /// Stores `markdown` unless a non-empty summary already exists for the key
    #[tracing::instrument(skip(self, markdown), fields(video_id = %key.video_id))]
    pub async fn write(
        &self,
        key: &PersistKey,
        markdown: &str,
    ) -> Result<WriteOutcome, CacheWriteError> {
        if markdown.is_empty() {
            tracing::info!("Nothing to save for an empty summary");
            return Ok(WriteOutcome::Skipped);
        }

        if let Some(existing) = self.store.get_summary(key.video_id.as_str()).await? {
            if existing.has_markdown() {
                tracing::info!(url = %key.source_url, "Summary already exists - skipping save");
                return Ok(WriteOutcome::Skipped);
            }
        }

        let summary = NewSummary {
            video_id: key.video_id.to_string(),
            source_url: key.source_url.clone(),
            summary_markdown: markdown.to_string(),
        };

        match self.store.insert_summary(&summary).await? {
            InsertOutcome::Inserted => {
                tracing::info!(url = %key.source_url, "Saved summary");
                Ok(WriteOutcome::Inserted)
            }
            InsertOutcome::Exists => {
                tracing::info!(url = %key.source_url, "Summary saved concurrently - skipping save");
                Ok(WriteOutcome::Skipped)
            }
        }
    }

    /// Persists in the background. Failures are logged and never reach the
    /// caller.
    pub fn spawn_write(self: &Arc<Self>, key: PersistKey, markdown: String) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            if let Err(e) = cache.write(&key, &markdown).await {
                tracing::error!(
                    error = ?e,
                    video_id = %key.video_id,
                    url = %key.source_url,
                    "Failed to save summary"
                );
            }
        })
    }
}

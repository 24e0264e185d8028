use std::future::Future;

use crate::{NewSummary, SummaryRecord};

pub mod postgres;

pub trait DataStore {
    fn get_summary(
        &self,
        video_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<SummaryRecord>>> + Send;

    /// Inserts the summary unless a row with non-empty markdown already exists
    /// for the same video id.
    fn insert_summary(
        &self,
        summary: &NewSummary,
    ) -> impl Future<Output = anyhow::Result<InsertOutcome>> + Send;
}

impl<T: DataStore + Send + Sync> DataStore for &T {
    async fn get_summary(&self, video_id: &str) -> anyhow::Result<Option<SummaryRecord>> {
        (**self).get_summary(video_id).await
    }

    async fn insert_summary(&self, summary: &NewSummary) -> anyhow::Result<InsertOutcome> {
        (**self).insert_summary(summary).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A non-empty summary was already stored; nothing was written
    Exists,
}

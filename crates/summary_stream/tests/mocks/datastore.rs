use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use summary_datastore::{DataStore, InsertOutcome, NewSummary, SummaryRecord};

#[derive(Clone, Default)]
pub struct MockDataStore {
    pub records: Arc<Mutex<HashMap<String, SummaryRecord>>>,
    pub reads: Arc<AtomicUsize>,
    pub insert_calls: Arc<AtomicUsize>,
    pub fail_reads_with: Option<String>,
    pub fail_inserts_with: Option<String>,
}

impl MockDataStore {
    pub fn with_record(video_id: &str, source_url: &str, summary_markdown: &str) -> Self {
        let store = Self::default();
        store.records.lock().unwrap().insert(
            video_id.to_string(),
            SummaryRecord {
                video_id: video_id.to_string(),
                source_url: source_url.to_string(),
                summary_markdown: summary_markdown.to_string(),
                created_at: chrono::Utc::now(),
            },
        );
        store
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_reads_with: Some(msg.to_string()),
            fail_inserts_with: Some(msg.to_string()),
            ..Default::default()
        }
    }

    pub fn markdown(&self, video_id: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(video_id)
            .map(|r| r.summary_markdown.clone())
    }

    pub fn insert_count(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Polls until the background write landed or the attempts run out
    pub async fn wait_for_markdown(&self, video_id: &str) -> Option<String> {
        for _ in 0..100 {
            if let Some(markdown) = self.markdown(video_id).filter(|m| !m.is_empty()) {
                return Some(markdown);
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        None
    }

    /// Gives spawned writes time to run
    pub async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

impl DataStore for MockDataStore {
    async fn get_summary(&self, video_id: &str) -> anyhow::Result<Option<SummaryRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(ref msg) = self.fail_reads_with {
            return Err(anyhow::anyhow!("{}", msg));
        }
        Ok(self.records.lock().unwrap().get(video_id).cloned())
    }

    async fn insert_summary(&self, summary: &NewSummary) -> anyhow::Result<InsertOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref msg) = self.fail_inserts_with {
            return Err(anyhow::anyhow!("{}", msg));
        }

        let mut records = self.records.lock().unwrap();
        if records
            .get(&summary.video_id)
            .is_some_and(|r| r.has_markdown())
        {
            return Ok(InsertOutcome::Exists);
        }
        records.insert(
            summary.video_id.clone(),
            SummaryRecord {
                video_id: summary.video_id.clone(),
                source_url: summary.source_url.clone(),
                summary_markdown: summary.summary_markdown.clone(),
                created_at: chrono::Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }
}

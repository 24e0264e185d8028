use chrono::{DateTime, Utc};

/// A persisted summary row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SummaryRecord {
    pub video_id: String,
    pub source_url: String,
    pub summary_markdown: String,
    pub created_at: DateTime<Utc>,
}

impl SummaryRecord {
    /// Rows with empty markdown are placeholders and never count as cached
    pub fn has_markdown(&self) -> bool {
        !self.summary_markdown.is_empty()
    }
}

/// Insert payload for a freshly generated summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSummary {
    pub video_id: String,
    pub source_url: String,
    pub summary_markdown: String,
}

use anyhow::Context;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::{datastore::DataStore, InsertOutcome, NewSummary, SummaryRecord};

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone)]
pub struct PgDataStore {
    pub pool: PgPool,
}

impl PgDataStore {
    /// Establish connection to database and create the summaries table
    /// if not exists
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .inspect_err(
                |e| tracing::error!(error = ?e, "Failed to establish connection to database"),
            )
            .context("Failed to connect to postgres database")?;

        MIGRATOR
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to run database migrations"))
            .context("Failed to run database migrations")?;

        Ok(PgDataStore { pool })
    }
}

impl DataStore for PgDataStore {
    async fn get_summary(&self, video_id: &str) -> anyhow::Result<Option<SummaryRecord>> {
        sqlx::query_as::<_, SummaryRecord>(
            r#"
            SELECT video_id, source_url, summary_markdown, created_at
            FROM summaries
            WHERE video_id = $1
            "#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, %video_id, "Failed to fetch summary");
        })
        .context("Failed to fetch summary")
    }

    async fn insert_summary(&self, summary: &NewSummary) -> anyhow::Result<InsertOutcome> {
        // an existing row only gets overwritten while its markdown is still empty
        let result = sqlx::query(
            r#"
            INSERT INTO summaries (video_id, source_url, summary_markdown)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_id) DO UPDATE
                SET source_url = EXCLUDED.source_url,
                    summary_markdown = EXCLUDED.summary_markdown
                WHERE summaries.summary_markdown = ''
            "#,
        )
        .bind(&summary.video_id)
        .bind(&summary.source_url)
        .bind(&summary.summary_markdown)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(
                error = ?err,
                video_id = %summary.video_id,
                "Failed to insert summary"
            )
        })
        .context("Failed to insert summary")?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Exists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}

//! Collaborator contracts consumed by the core. The execution-history
//! source, pipeline registry, and the three durable stores are external
//! systems; the core depends only on these seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{
    AlertHistoryEntry, AlertPreferences, ExecutionDetail, ExecutionStatus, ExecutionSummary,
    Pipeline, SlaConfig,
};

/// One page of execution summaries, ordered newest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPage {
    pub executions: Vec<ExecutionSummary>,
    pub next_page_token: Option<String>,
}

/// Source of execution summaries and per-execution detail for a job.
#[async_trait]
pub trait ExecutionHistory: Send + Sync {
    /// List executions of `job_ref`, newest first.
    async fn list(
        &self,
        job_ref: &str,
        status_filter: Option<ExecutionStatus>,
        max_results: usize,
        page_token: Option<&str>,
    ) -> anyhow::Result<ExecutionPage>;

    /// Fetch full detail for one execution. Expensive relative to `list`.
    async fn detail(&self, execution_ref: &str) -> anyhow::Result<ExecutionDetail>;
}

/// Registry of static pipeline metadata.
#[async_trait]
pub trait PipelineRegistry: Send + Sync {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<Pipeline>>;
    async fn list(&self) -> anyhow::Result<Vec<Pipeline>>;
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<AlertPreferences>>;
    async fn put(&self, prefs: AlertPreferences) -> anyhow::Result<()>;
}

/// Append-only store of alert delivery attempts.
#[async_trait]
pub trait AlertHistoryStore: Send + Sync {
    async fn put(&self, entry: AlertHistoryEntry) -> anyhow::Result<()>;

    /// Entries for a pipeline, newest first.
    async fn query_recent(
        &self,
        pipeline_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<AlertHistoryEntry>>;

    /// Sent-at time of the most recent entry across any channel, used for
    /// the pipeline-wide cooldown.
    async fn last_sent_at(&self, pipeline_id: &str) -> anyhow::Result<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait SlaStore: Send + Sync {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<SlaConfig>>;
    async fn put(&self, config: SlaConfig) -> anyhow::Result<()>;
}

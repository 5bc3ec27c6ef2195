//! In-memory reference implementations of the collaborator contracts, used
//! by tests and by the standalone daemon. Durable backends live outside
//! this crate.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{
    AlertHistoryEntry, AlertPreferences, ExecutionDetail, ExecutionStatus, ExecutionSummary,
    Pipeline, SlaConfig,
};

use crate::stores::{
    AlertHistoryStore, ExecutionHistory, ExecutionPage, PipelineRegistry, PreferencesStore,
    SlaStore,
};

/// All five stores behind one in-process map per table.
#[derive(Debug, Default)]
pub struct MemoryStores {
    pipelines: Mutex<BTreeMap<String, Pipeline>>,
    preferences: Mutex<BTreeMap<String, AlertPreferences>>,
    // Alert history entries per pipeline, newest first.
    history: Mutex<BTreeMap<String, Vec<AlertHistoryEntry>>>,
    sla: Mutex<BTreeMap<String, SlaConfig>>,
    // Execution summaries per job_ref, newest first.
    executions: Mutex<BTreeMap<String, Vec<ExecutionSummary>>>,
    details: Mutex<BTreeMap<String, ExecutionDetail>>,
}

impl MemoryStores {
    pub fn insert_pipeline(&self, pipeline: Pipeline) {
        self.pipelines
            .lock()
            .unwrap()
            .insert(pipeline.pipeline_id.clone(), pipeline);
    }

    /// Seed the execution listing for a job. `executions` must already be
    /// ordered newest-first, as the history source would return them.
    pub fn insert_executions(&self, job_ref: &str, executions: Vec<ExecutionSummary>) {
        self.executions
            .lock()
            .unwrap()
            .insert(job_ref.to_string(), executions);
    }

    pub fn insert_detail(&self, detail: ExecutionDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(detail.execution_ref.clone(), detail);
    }
}

#[async_trait]
impl PipelineRegistry for MemoryStores {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<Pipeline>> {
        Ok(self.pipelines.lock().unwrap().get(pipeline_id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Pipeline>> {
        Ok(self.pipelines.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl PreferencesStore for MemoryStores {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<AlertPreferences>> {
        Ok(self.preferences.lock().unwrap().get(pipeline_id).cloned())
    }

    async fn put(&self, prefs: AlertPreferences) -> anyhow::Result<()> {
        self.preferences
            .lock()
            .unwrap()
            .insert(prefs.pipeline_id.clone(), prefs);
        Ok(())
    }
}

#[async_trait]
impl AlertHistoryStore for MemoryStores {
    async fn put(&self, entry: AlertHistoryEntry) -> anyhow::Result<()> {
        let mut history = self.history.lock().unwrap();
        let entries = history.entry(entry.pipeline_id.clone()).or_default();
        entries.push(entry);
        entries.sort_by(|l, r| r.sent_at.cmp(&l.sent_at));
        Ok(())
    }

    async fn query_recent(
        &self,
        pipeline_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<AlertHistoryEntry>> {
        let history = self.history.lock().unwrap();
        Ok(history
            .get(pipeline_id)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn last_sent_at(&self, pipeline_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let history = self.history.lock().unwrap();
        Ok(history
            .get(pipeline_id)
            .and_then(|entries| entries.first())
            .map(|entry| entry.sent_at))
    }
}

#[async_trait]
impl SlaStore for MemoryStores {
    async fn get(&self, pipeline_id: &str) -> anyhow::Result<Option<SlaConfig>> {
        Ok(self.sla.lock().unwrap().get(pipeline_id).cloned())
    }

    async fn put(&self, config: SlaConfig) -> anyhow::Result<()> {
        self.sla
            .lock()
            .unwrap()
            .insert(config.pipeline_id.clone(), config);
        Ok(())
    }
}

#[async_trait]
impl ExecutionHistory for MemoryStores {
    async fn list(
        &self,
        job_ref: &str,
        status_filter: Option<ExecutionStatus>,
        max_results: usize,
        page_token: Option<&str>,
    ) -> anyhow::Result<ExecutionPage> {
        let executions = self.executions.lock().unwrap();
        let all: Vec<ExecutionSummary> = executions
            .get(job_ref)
            .map(|list| {
                list.iter()
                    .filter(|e| status_filter.map_or(true, |s| e.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Page tokens are plain offsets into the filtered listing.
        let offset: usize = match page_token {
            Some(token) => token.parse().map_err(|_| anyhow::anyhow!("invalid page token"))?,
            None => 0,
        };
        let page: Vec<ExecutionSummary> =
            all.iter().skip(offset).take(max_results).cloned().collect();
        let next = offset + page.len();
        let next_page_token = (next < all.len()).then(|| next.to_string());

        Ok(ExecutionPage {
            executions: page,
            next_page_token,
        })
    }

    async fn detail(&self, execution_ref: &str) -> anyhow::Result<ExecutionDetail> {
        self.details
            .lock()
            .unwrap()
            .get(execution_ref)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("execution {execution_ref} not found"))
    }
}

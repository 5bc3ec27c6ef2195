//! Per-pipeline and fleet-wide analytics, computed on demand from the
//! execution-history source. Nothing here is persisted; every request
//! re-derives its numbers from the raw execution listing.

mod freshness;

pub use freshness::freshness_percent;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use models::{
    AnalyticsPeriod, ExecutionSummary, FleetPipeline, FleetSummary, FleetTotals, Pipeline,
    PipelineAnalytics, SlaSnapshot,
};

use crate::schedule::parse_interval_minutes;
use crate::stats::{percentile, round2};
use crate::stores::{ExecutionHistory, SlaStore};

/// Executions fetched per history page.
const PAGE_SIZE: usize = 100;
/// Concurrent detail fetches per enrichment batch.
const DETAIL_BATCH: usize = 20;

pub struct AnalyticsComputer {
    history: Arc<dyn ExecutionHistory>,
    sla: Arc<dyn SlaStore>,
}

impl AnalyticsComputer {
    pub fn new(history: Arc<dyn ExecutionHistory>, sla: Arc<dyn SlaStore>) -> AnalyticsComputer {
        AnalyticsComputer { history, sla }
    }

    pub async fn compute(
        &self,
        pipeline: &Pipeline,
        period: AnalyticsPeriod,
    ) -> anyhow::Result<PipelineAnalytics> {
        self.compute_at(pipeline, period, Utc::now()).await
    }

    #[tracing::instrument(skip_all, fields(pipeline_id = %pipeline.pipeline_id, period = %period))]
    pub async fn compute_at(
        &self,
        pipeline: &Pipeline,
        period: AnalyticsPeriod,
        now: DateTime<Utc>,
    ) -> anyhow::Result<PipelineAnalytics> {
        let period_start = now - period.duration();
        let executions = self.collect_since(&pipeline.job_ref, period_start).await?;
        let sla_config = self
            .sla
            .get(&pipeline.pipeline_id)
            .await
            .context("fetching SLA configuration")?;

        let completed: Vec<&ExecutionSummary> = executions
            .iter()
            .filter(|e| e.status.is_completed())
            .collect();
        let succeeded: Vec<&ExecutionSummary> = completed
            .iter()
            .filter(|e| !e.status.is_failure())
            .copied()
            .collect();
        let failed_count = (completed.len() - succeeded.len()) as u64;

        let uptime_percent = if completed.is_empty() {
            100.0
        } else {
            round2(succeeded.len() as f64 / completed.len() as f64 * 100.0)
        };

        let durations: Vec<f64> = completed
            .iter()
            .filter_map(|e| {
                e.stopped_at
                    .map(|stop| (stop - e.started_at).num_milliseconds() as f64 / 1000.0)
            })
            .collect();
        let avg_duration_seconds = if durations.is_empty() {
            0.0
        } else {
            round2(durations.iter().sum::<f64>() / durations.len() as f64)
        };
        let p95_duration_seconds = round2(percentile(&durations, 95));

        let executions_over_duration_sla = match &sla_config {
            Some(config) => {
                let max = config.max_execution_duration_seconds as f64;
                durations.iter().filter(|d| **d > max).count() as u64
            }
            None => 0,
        };

        let total_records_synced = self.sum_record_counts(&succeeded).await;
        let avg_records_per_sync = if succeeded.is_empty() {
            0
        } else {
            (total_records_synced as f64 / succeeded.len() as f64).round() as i64
        };

        let freshness = parse_interval_minutes(&pipeline.schedule_expression).and_then(|interval| {
            let succeeded_stops: Vec<DateTime<Utc>> =
                succeeded.iter().filter_map(|e| e.stopped_at).collect();
            if succeeded_stops.is_empty() {
                return None;
            }
            let window = sla_config
                .as_ref()
                .map(|config| config.freshness_window_minutes)
                .unwrap_or(interval * 2);
            Some(freshness_percent(
                &succeeded_stops,
                interval,
                window,
                period_start,
                now,
            ))
        });

        Ok(PipelineAnalytics {
            pipeline_id: pipeline.pipeline_id.clone(),
            period,
            uptime_percent,
            // Execution counts cover completed executions only; in-flight
            // ones are invisible to the analytics.
            total_executions: completed.len() as u64,
            succeeded_count: succeeded.len() as u64,
            failed_count,
            total_records_synced,
            avg_records_per_sync,
            avg_duration_seconds,
            p95_duration_seconds,
            freshness_percent: freshness,
            executions_over_duration_sla,
            sla_config: sla_config.as_ref().map(SlaSnapshot::from),
        })
    }

    /// Page through the history listing until an execution started before
    /// `cutoff` is reached. The listing is newest-first, so everything after
    /// that execution is older still.
    async fn collect_since(
        &self,
        job_ref: &str,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ExecutionSummary>> {
        let mut collected = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .history
                .list(job_ref, None, PAGE_SIZE, page_token.as_deref())
                .await
                .context("listing executions")?;

            for execution in page.executions {
                if execution.started_at < cutoff {
                    return Ok(collected);
                }
                collected.push(execution);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(collected),
            }
        }
    }

    /// Total record count across successful executions, read from each
    /// execution's output payload. Details are fetched in bounded concurrent
    /// batches; an execution whose detail fetch fails or whose output
    /// carries no count contributes zero.
    async fn sum_record_counts(&self, succeeded: &[&ExecutionSummary]) -> i64 {
        let mut total = 0.0;
        for batch in succeeded.chunks(DETAIL_BATCH) {
            let details = join_all(
                batch
                    .iter()
                    .map(|execution| self.history.detail(&execution.execution_ref)),
            )
            .await;

            for (execution, result) in batch.iter().zip(details) {
                match result {
                    Ok(detail) => {
                        if let Some(count) =
                            detail.output.as_deref().and_then(extract_record_count)
                        {
                            total += count;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            execution_ref = %execution.execution_ref,
                            %error,
                            "failed to fetch execution detail, skipping its record count"
                        );
                    }
                }
            }
        }
        total.round() as i64
    }

    /// Fleet-wide rollup across the given pipelines. Pipelines whose
    /// analytics fail to compute are logged and dropped from the summary
    /// rather than failing the whole rollup.
    #[tracing::instrument(skip_all, fields(pipelines = pipelines.len(), period = %period))]
    pub async fn fleet_summary_at(
        &self,
        pipelines: &[Pipeline],
        period: AnalyticsPeriod,
        now: DateTime<Utc>,
    ) -> FleetSummary {
        let results = join_all(
            pipelines
                .iter()
                .map(|pipeline| self.compute_at(pipeline, period, now)),
        )
        .await;

        let mut rows = Vec::new();
        for (pipeline, result) in pipelines.iter().zip(results) {
            let analytics = match result {
                Ok(analytics) => analytics,
                Err(error) => {
                    tracing::error!(
                        pipeline_id = %pipeline.pipeline_id,
                        error = ?error,
                        "failed to compute pipeline analytics for fleet summary"
                    );
                    continue;
                }
            };
            rows.push(FleetPipeline {
                pipeline_id: analytics.pipeline_id.clone(),
                client_name: pipeline.client_name.clone(),
                uptime_percent: analytics.uptime_percent,
                freshness_percent: analytics.freshness_percent,
                total_records_synced: analytics.total_records_synced,
                total_executions: analytics.total_executions,
                sla_compliant: sla_compliant(&analytics),
            });
        }

        let overall_uptime_percent = if rows.is_empty() {
            100.0
        } else {
            round2(rows.iter().map(|r| r.uptime_percent).sum::<f64>() / rows.len() as f64)
        };
        let totals = FleetTotals {
            total_pipelines: rows.len() as u64,
            sla_compliant_count: rows.iter().filter(|r| r.sla_compliant).count() as u64,
            overall_uptime_percent,
            total_records_synced: rows.iter().map(|r| r.total_records_synced).sum(),
            total_executions: rows.iter().map(|r| r.total_executions).sum(),
        };

        FleetSummary {
            pipelines: rows,
            totals,
        }
    }

    pub async fn fleet_summary(
        &self,
        pipelines: &[Pipeline],
        period: AnalyticsPeriod,
    ) -> FleetSummary {
        self.fleet_summary_at(pipelines, period, Utc::now()).await
    }
}

/// A pipeline without an enabled SLA is compliant by definition. With one,
/// it must meet its uptime target and, where freshness is measurable, have
/// satisfied every schedule checkpoint.
fn sla_compliant(analytics: &PipelineAnalytics) -> bool {
    match &analytics.sla_config {
        Some(config) if config.enabled => {
            analytics.uptime_percent >= config.uptime_target_percent
                && analytics.freshness_percent.map_or(true, |f| f >= 100.0)
        }
        _ => true,
    }
}

/// Pull a numeric `recordCount` out of a serialized output payload. Any
/// JSON number is accepted; fractional counts are summed before rounding.
fn extract_record_count(output: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(output).ok()?;
    value.get("recordCount")?.as_f64()
}

use chrono::Duration;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::SlaConfig;

/// Time window over which analytics are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AnalyticsPeriod {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl AnalyticsPeriod {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsPeriod::SevenDays => "7d",
            AnalyticsPeriod::ThirtyDays => "30d",
            AnalyticsPeriod::NinetyDays => "90d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            AnalyticsPeriod::SevenDays => Duration::days(7),
            AnalyticsPeriod::ThirtyDays => Duration::days(30),
            AnalyticsPeriod::NinetyDays => Duration::days(90),
        }
    }
}

impl Default for AnalyticsPeriod {
    fn default() -> Self {
        AnalyticsPeriod::ThirtyDays
    }
}

impl std::fmt::Display for AnalyticsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The SLA configuration snapshot embedded in analytics results, without
/// audit fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaSnapshot {
    pub enabled: bool,
    pub uptime_target_percent: f64,
    pub max_execution_duration_seconds: u32,
    pub freshness_window_minutes: u32,
}

impl From<&SlaConfig> for SlaSnapshot {
    fn from(config: &SlaConfig) -> Self {
        SlaSnapshot {
            enabled: config.enabled,
            uptime_target_percent: config.uptime_target_percent,
            max_execution_duration_seconds: config.max_execution_duration_seconds,
            freshness_window_minutes: config.freshness_window_minutes,
        }
    }
}

/// Derived statistics for one pipeline over one period. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineAnalytics {
    pub pipeline_id: String,
    pub period: AnalyticsPeriod,
    /// succeeded / completed, in [0, 100]; 100 when nothing completed.
    pub uptime_percent: f64,
    pub total_executions: u64,
    pub succeeded_count: u64,
    pub failed_count: u64,
    pub total_records_synced: i64,
    pub avg_records_per_sync: i64,
    pub avg_duration_seconds: f64,
    pub p95_duration_seconds: f64,
    /// Null exactly when the schedule interval is unparseable or no
    /// successful execution exists in the period.
    pub freshness_percent: Option<f64>,
    /// Completed executions whose duration exceeded the configured
    /// max-duration threshold; 0 when no SLA config is stored.
    pub executions_over_duration_sla: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_config: Option<SlaSnapshot>,
}

/// One pipeline's row in the fleet summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetPipeline {
    pub pipeline_id: String,
    pub client_name: String,
    pub uptime_percent: f64,
    pub freshness_percent: Option<f64>,
    pub total_records_synced: i64,
    pub total_executions: u64,
    /// True whenever no SLA config is enabled (default-compliant policy).
    pub sla_compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetTotals {
    pub total_pipelines: u64,
    pub sla_compliant_count: u64,
    pub overall_uptime_percent: f64,
    pub total_records_synced: i64,
    pub total_executions: u64,
}

/// Fleet-wide analytics summary across all visible pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub pipelines: Vec<FleetPipeline>,
    pub totals: FleetTotals,
}

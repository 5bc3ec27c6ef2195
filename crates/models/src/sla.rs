use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-pipeline service-level objectives. Overwritten wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaConfig {
    pub pipeline_id: String,
    pub enabled: bool,
    /// Target uptime over the evaluation window, in [0, 100].
    pub uptime_target_percent: f64,
    pub max_execution_duration_seconds: u32,
    /// How late a scheduled sync may complete and still count as fresh.
    pub freshness_window_minutes: u32,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

mod alerts;
mod analytics;
mod pipeline;
mod sla;

pub use alerts::{
    AlertChannel, AlertChannels, AlertHistoryEntry, AlertPreferences, AlertTriggers, AlertType,
    ConsecutiveFailureTrigger, EmailChannel, ExecutionCompleted, SlaBreachTrigger, WebhookChannel,
    mask_webhook_url,
};
pub use analytics::{
    AnalyticsPeriod, FleetPipeline, FleetSummary, FleetTotals, PipelineAnalytics, SlaSnapshot,
};
pub use pipeline::{ExecutionDetail, ExecutionStatus, ExecutionSummary, Pipeline};
pub use sla::SlaConfig;

//! Classification of a completed execution into zero or more alert types.
//!
//! Signal gathering (history probes, SLA probes) is separated from the
//! classification rules themselves, which are a pure function of the event,
//! the gathered signals, and the pipeline's trigger configuration.

use std::sync::Arc;

use anyhow::Context;
use models::{AlertTriggers, AlertType, ExecutionCompleted, ExecutionStatus};

use crate::stats::round2;
use crate::stores::{ExecutionHistory, SlaStore};

/// Executions probed when counting a consecutive-failure streak.
const CONSECUTIVE_LOOKBACK: usize = 10;
/// Executions probed when deciding whether a success is a recovery.
const RECOVERY_LOOKBACK: usize = 5;
/// Executions probed for the trailing uptime used by SLA breach checks.
const SLA_UPTIME_LOOKBACK: usize = 20;

/// Facts about a pipeline's recent history, gathered once per event and
/// consumed by the classification rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSignals {
    /// Length of the failure streak ending at the most recent completed
    /// execution, bounded by the lookback.
    pub consecutive_failures: u32,
    /// Whether the completed execution immediately before the current one
    /// was a failure.
    pub predecessor_failed: bool,
    /// Whether the current execution breached an enabled SLA, either by
    /// running too long or by dragging trailing uptime below target.
    pub sla_breached: bool,
}

struct Rule {
    alert_type: AlertType,
    /// Alert types this rule silences when it fires itself.
    suppresses: &'static [AlertType],
    applies: fn(ExecutionStatus, &TriggerSignals, &AlertTriggers) -> bool,
}

fn failure_applies(status: ExecutionStatus, _: &TriggerSignals, triggers: &AlertTriggers) -> bool {
    status.is_failure() && triggers.on_failure
}

fn consecutive_applies(
    status: ExecutionStatus,
    signals: &TriggerSignals,
    triggers: &AlertTriggers,
) -> bool {
    status.is_failure()
        && triggers.on_consecutive_failures.enabled
        && signals.consecutive_failures >= triggers.on_consecutive_failures.threshold
}

fn recovery_applies(
    status: ExecutionStatus,
    signals: &TriggerSignals,
    triggers: &AlertTriggers,
) -> bool {
    status == ExecutionStatus::Succeeded && triggers.on_recovery && signals.predecessor_failed
}

fn sla_breach_applies(
    _: ExecutionStatus,
    signals: &TriggerSignals,
    triggers: &AlertTriggers,
) -> bool {
    triggers.sla_breach_enabled() && signals.sla_breached
}

// An escalated consecutive-failures alert replaces the plain failure alert
// for the same execution rather than stacking on top of it.
const RULES: &[Rule] = &[
    Rule {
        alert_type: AlertType::Failure,
        suppresses: &[],
        applies: failure_applies,
    },
    Rule {
        alert_type: AlertType::ConsecutiveFailures,
        suppresses: &[AlertType::Failure],
        applies: consecutive_applies,
    },
    Rule {
        alert_type: AlertType::Recovery,
        suppresses: &[],
        applies: recovery_applies,
    },
    Rule {
        alert_type: AlertType::SlaBreach,
        suppresses: &[],
        applies: sla_breach_applies,
    },
];

/// Pure classification of one event against the rule table.
pub fn select_alert_types(
    status: ExecutionStatus,
    signals: &TriggerSignals,
    triggers: &AlertTriggers,
) -> Vec<AlertType> {
    let fired: Vec<&Rule> = RULES
        .iter()
        .filter(|rule| (rule.applies)(status, signals, triggers))
        .collect();

    fired
        .iter()
        .filter(|rule| {
            !fired
                .iter()
                .any(|other| other.suppresses.contains(&rule.alert_type))
        })
        .map(|rule| rule.alert_type)
        .collect()
}

pub struct AlertClassifier {
    history: Arc<dyn ExecutionHistory>,
    sla: Arc<dyn SlaStore>,
}

impl AlertClassifier {
    pub fn new(history: Arc<dyn ExecutionHistory>, sla: Arc<dyn SlaStore>) -> AlertClassifier {
        AlertClassifier { history, sla }
    }

    /// Classify a completed execution under the given trigger configuration.
    #[tracing::instrument(skip_all, fields(
        pipeline_id = %event.pipeline_id,
        execution_status = %event.execution_status,
    ))]
    pub async fn classify(
        &self,
        event: &ExecutionCompleted,
        triggers: &AlertTriggers,
    ) -> anyhow::Result<Vec<AlertType>> {
        let signals = self.gather_signals(event, triggers).await?;
        Ok(select_alert_types(event.execution_status, &signals, triggers))
    }

    /// Gather only the signals the trigger configuration can act on, to
    /// avoid paying for history probes no rule will read.
    async fn gather_signals(
        &self,
        event: &ExecutionCompleted,
        triggers: &AlertTriggers,
    ) -> anyhow::Result<TriggerSignals> {
        let mut signals = TriggerSignals::default();

        if triggers.on_consecutive_failures.enabled && event.execution_status.is_failure() {
            signals.consecutive_failures = self.count_consecutive_failures(&event.job_ref).await?;
        }
        if triggers.on_recovery && event.execution_status == ExecutionStatus::Succeeded {
            signals.predecessor_failed = self.predecessor_failed(&event.job_ref).await?;
        }
        if triggers.sla_breach_enabled() {
            // SLA probes fail open: a broken probe must not swallow the
            // failure or recovery alert riding the same event.
            signals.sla_breached = match self.sla_breached(event).await {
                Ok(breached) => breached,
                Err(error) => {
                    tracing::error!(
                        pipeline_id = %event.pipeline_id,
                        error = ?error,
                        "SLA breach probe failed, continuing without it"
                    );
                    false
                }
            };
        }
        Ok(signals)
    }

    /// Walk the most recent executions newest-first, skipping in-flight
    /// ones, and count failures until the first completed non-failure.
    async fn count_consecutive_failures(&self, job_ref: &str) -> anyhow::Result<u32> {
        let page = self
            .history
            .list(job_ref, None, CONSECUTIVE_LOOKBACK, None)
            .await
            .context("listing executions for failure streak")?;

        let mut streak = 0;
        for execution in &page.executions {
            if !execution.status.is_completed() {
                continue;
            }
            if execution.status.is_failure() {
                streak += 1;
            } else {
                break;
            }
        }
        Ok(streak)
    }

    /// Whether the completed execution preceding the current one failed.
    /// Requires at least two completed executions in the lookback.
    async fn predecessor_failed(&self, job_ref: &str) -> anyhow::Result<bool> {
        let page = self
            .history
            .list(job_ref, None, RECOVERY_LOOKBACK, None)
            .await
            .context("listing executions for recovery check")?;

        let completed: Vec<_> = page
            .executions
            .iter()
            .filter(|e| e.status.is_completed())
            .collect();
        Ok(completed.len() >= 2 && completed[1].status.is_failure())
    }

    /// Breach check against the stored SLA configuration: the current
    /// execution overran the duration ceiling, or trailing uptime fell
    /// below target.
    async fn sla_breached(&self, event: &ExecutionCompleted) -> anyhow::Result<bool> {
        let Some(config) = self
            .sla
            .get(&event.pipeline_id)
            .await
            .context("fetching SLA configuration")?
        else {
            return Ok(false);
        };
        if !config.enabled {
            return Ok(false);
        }

        let detail = self
            .history
            .detail(&event.execution_ref)
            .await
            .context("fetching execution detail for SLA check")?;
        if let Some(stopped_at) = detail.stopped_at {
            let duration = (stopped_at - detail.started_at).num_milliseconds() as f64 / 1000.0;
            if duration > config.max_execution_duration_seconds as f64 {
                return Ok(true);
            }
        }

        let page = self
            .history
            .list(&event.job_ref, None, SLA_UPTIME_LOOKBACK, None)
            .await
            .context("listing executions for trailing uptime")?;
        let completed: Vec<_> = page
            .executions
            .iter()
            .filter(|e| e.status.is_completed())
            .collect();
        if completed.is_empty() {
            return Ok(false);
        }
        let succeeded = completed.iter().filter(|e| !e.status.is_failure()).count();
        let uptime = round2(succeeded as f64 / completed.len() as f64 * 100.0);
        Ok(uptime < config.uptime_target_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStores;
    use crate::testutil;
    use chrono::{Duration, TimeZone, Utc};
    use models::{ConsecutiveFailureTrigger, ExecutionSummary, SlaBreachTrigger, SlaConfig};
    use pretty_assertions::assert_eq;

    fn all_triggers(threshold: u32) -> AlertTriggers {
        AlertTriggers {
            on_failure: true,
            on_consecutive_failures: ConsecutiveFailureTrigger {
                enabled: true,
                threshold,
            },
            on_recovery: true,
            on_sla_breach: Some(SlaBreachTrigger { enabled: true }),
        }
    }

    #[test]
    fn test_consecutive_failures_suppresses_plain_failure() {
        let triggers = all_triggers(3);
        let below = TriggerSignals {
            consecutive_failures: 2,
            ..Default::default()
        };
        assert_eq!(
            select_alert_types(ExecutionStatus::Failed, &below, &triggers),
            vec![AlertType::Failure]
        );

        let at = TriggerSignals {
            consecutive_failures: 3,
            ..Default::default()
        };
        assert_eq!(
            select_alert_types(ExecutionStatus::Failed, &at, &triggers),
            vec![AlertType::ConsecutiveFailures]
        );
    }

    #[test]
    fn test_disabled_triggers_fire_nothing() {
        let triggers = AlertTriggers {
            on_failure: false,
            on_consecutive_failures: ConsecutiveFailureTrigger {
                enabled: false,
                threshold: 3,
            },
            on_recovery: false,
            on_sla_breach: None,
        };
        let signals = TriggerSignals {
            consecutive_failures: 5,
            predecessor_failed: true,
            sla_breached: true,
        };
        assert!(select_alert_types(ExecutionStatus::Failed, &signals, &triggers).is_empty());
        assert!(select_alert_types(ExecutionStatus::Succeeded, &signals, &triggers).is_empty());
    }

    #[test]
    fn test_recovery_requires_failed_predecessor() {
        let triggers = all_triggers(3);
        let signals = TriggerSignals::default();
        assert!(select_alert_types(ExecutionStatus::Succeeded, &signals, &triggers).is_empty());

        let recovered = TriggerSignals {
            predecessor_failed: true,
            ..Default::default()
        };
        assert_eq!(
            select_alert_types(ExecutionStatus::Succeeded, &recovered, &triggers),
            vec![AlertType::Recovery]
        );
        // A failed execution after a failed predecessor is not a recovery.
        assert_eq!(
            select_alert_types(ExecutionStatus::Failed, &recovered, &triggers),
            vec![AlertType::Failure]
        );
    }

    #[test]
    fn test_sla_breach_stacks_with_other_alerts() {
        let triggers = all_triggers(3);
        let signals = TriggerSignals {
            consecutive_failures: 0,
            predecessor_failed: false,
            sla_breached: true,
        };
        assert_eq!(
            select_alert_types(ExecutionStatus::Failed, &signals, &triggers),
            vec![AlertType::Failure, AlertType::SlaBreach]
        );
        assert_eq!(
            select_alert_types(ExecutionStatus::Succeeded, &signals, &triggers),
            vec![AlertType::SlaBreach]
        );
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    fn seed(statuses: &[ExecutionStatus]) -> Arc<MemoryStores> {
        let stores = Arc::new(MemoryStores::default());
        let executions: Vec<ExecutionSummary> = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let start = now() - Duration::hours(i as i64);
                let stopped = status
                    .is_completed()
                    .then(|| start + Duration::seconds(30));
                testutil::execution(&format!("e-{i}"), *status, start, stopped)
            })
            .collect();
        stores.insert_executions("jobs/orders", executions);
        stores
    }

    fn classifier(stores: &Arc<MemoryStores>) -> AlertClassifier {
        AlertClassifier::new(
            stores.clone() as Arc<dyn ExecutionHistory>,
            stores.clone() as Arc<dyn SlaStore>,
        )
    }

    fn event(status: ExecutionStatus) -> ExecutionCompleted {
        ExecutionCompleted {
            pipeline_id: "orders".to_string(),
            execution_ref: "e-0".to_string(),
            execution_status: status,
            job_ref: "jobs/orders".to_string(),
        }
    }

    #[tokio::test]
    async fn test_streak_skips_running_and_stops_at_success() {
        use ExecutionStatus::*;
        // Newest first: two failures with an in-flight execution between
        // them, then a success that ends the streak, then older failures.
        let stores = seed(&[Failed, Running, TimedOut, Succeeded, Failed, Failed]);

        let types = classifier(&stores)
            .classify(&event(Failed), &all_triggers(2))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::ConsecutiveFailures]);

        // Threshold 3 is not met: only two failures before the success.
        let types = classifier(&stores)
            .classify(&event(Failed), &all_triggers(3))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::Failure]);
    }

    #[tokio::test]
    async fn test_recovery_after_failure_streak() {
        use ExecutionStatus::*;
        let stores = seed(&[Succeeded, Failed, Failed, Succeeded]);

        let types = classifier(&stores)
            .classify(&event(Succeeded), &all_triggers(3))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::Recovery]);
    }

    #[tokio::test]
    async fn test_recovery_needs_two_completed_executions() {
        use ExecutionStatus::*;
        let stores = seed(&[Succeeded, Running]);

        let types = classifier(&stores)
            .classify(&event(Succeeded), &all_triggers(3))
            .await
            .unwrap();
        assert!(types.is_empty());
    }

    #[tokio::test]
    async fn test_sla_breach_on_overlong_execution() {
        use ExecutionStatus::*;
        let stores = seed(&[Succeeded, Succeeded]);
        stores
            .put(SlaConfig {
                pipeline_id: "orders".to_string(),
                enabled: true,
                uptime_target_percent: 50.0,
                max_execution_duration_seconds: 600,
                freshness_window_minutes: 120,
                updated_at: now(),
                updated_by: "tests".to_string(),
            })
            .await
            .unwrap();
        // The current execution ran for 20 minutes against a 10 minute cap.
        stores.insert_detail(models::ExecutionDetail {
            execution_ref: "e-0".to_string(),
            status: Succeeded,
            started_at: now() - Duration::minutes(20),
            stopped_at: Some(now()),
            input: None,
            output: None,
            error: None,
            cause: None,
        });

        let types = classifier(&stores)
            .classify(&event(Succeeded), &all_triggers(3))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::SlaBreach]);
    }

    #[tokio::test]
    async fn test_sla_probe_failure_is_not_fatal() {
        use ExecutionStatus::*;
        let stores = seed(&[Failed, Succeeded]);
        stores
            .put(SlaConfig {
                pipeline_id: "orders".to_string(),
                enabled: true,
                uptime_target_percent: 99.0,
                max_execution_duration_seconds: 600,
                freshness_window_minutes: 120,
                updated_at: now(),
                updated_by: "tests".to_string(),
            })
            .await
            .unwrap();
        // No detail stored for "e-0": the duration probe errors out, and
        // the failure alert still fires.
        let types = classifier(&stores)
            .classify(&event(Failed), &all_triggers(3))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::Failure]);
    }

    #[tokio::test]
    async fn test_sla_breach_on_trailing_uptime() {
        use ExecutionStatus::*;
        let stores = seed(&[Failed, Succeeded, Failed, Failed]);
        stores
            .put(SlaConfig {
                pipeline_id: "orders".to_string(),
                enabled: true,
                uptime_target_percent: 90.0,
                max_execution_duration_seconds: 600,
                freshness_window_minutes: 120,
                updated_at: now(),
                updated_by: "tests".to_string(),
            })
            .await
            .unwrap();
        // Fast execution, but trailing uptime is 25% against a 90% target.
        stores.insert_detail(models::ExecutionDetail {
            execution_ref: "e-0".to_string(),
            status: Failed,
            started_at: now() - Duration::seconds(30),
            stopped_at: Some(now()),
            input: None,
            output: None,
            error: None,
            cause: None,
        });

        let types = classifier(&stores)
            .classify(&event(Failed), &all_triggers(3))
            .await
            .unwrap();
        assert_eq!(types, vec![AlertType::Failure, AlertType::SlaBreach]);
    }
}

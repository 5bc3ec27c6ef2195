//! Alert message rendering. Subjects and bodies are handlebars templates
//! registered per alert type at startup, so a template error surfaces when
//! the process boots rather than when the first alert fires.

use anyhow::Context;
use handlebars::Handlebars;
use models::AlertType;
use serde::Serialize;

/// Subjects are clamped to this many characters before delivery.
const MAX_SUBJECT_CHARS: usize = 100;

/// Template variables available to every alert template.
#[derive(Debug, Serialize)]
pub struct AlertContext<'a> {
    pub pipeline_id: &'a str,
    pub execution_status: &'a str,
    /// Short, human-readable name of the execution.
    pub execution_name: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAlert {
    pub subject: String,
    pub body: String,
}

const TEMPLATES: &[(AlertType, &str, &str)] = &[
    (
        AlertType::Failure,
        "Oxbow Alert: pipeline failure - {{pipeline_id}}",
        "Pipeline {{pipeline_id}} execution {{execution_name}} finished with status \
         {{execution_status}}. Check the execution logs for details.",
    ),
    (
        AlertType::ConsecutiveFailures,
        "Oxbow Alert: repeated failures - {{pipeline_id}}",
        "Pipeline {{pipeline_id}} has now failed several times in a row. Latest execution \
         {{execution_name}} finished with status {{execution_status}}. The pipeline likely \
         needs attention before the next scheduled run.",
    ),
    (
        AlertType::Recovery,
        "Oxbow Alert: recovery - {{pipeline_id}}",
        "Pipeline {{pipeline_id}} has recovered. Execution {{execution_name}} completed \
         with status {{execution_status}} after the previous run failed.",
    ),
    (
        AlertType::SlaBreach,
        "Oxbow Alert: SLA breach - {{pipeline_id}}",
        "Pipeline {{pipeline_id}} breached its configured SLA. Latest execution \
         {{execution_name}} finished with status {{execution_status}}.",
    ),
];

pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    pub fn try_new() -> anyhow::Result<Renderer> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // Messages are plain text, not HTML.
        registry.register_escape_fn(handlebars::no_escape);

        for (alert_type, subject, body) in TEMPLATES {
            registry
                .register_template_string(&subject_template(*alert_type), subject)
                .with_context(|| format!("registering {alert_type} subject template"))?;
            registry
                .register_template_string(&body_template(*alert_type), body)
                .with_context(|| format!("registering {alert_type} body template"))?;
        }
        Ok(Renderer { registry })
    }

    pub fn render(
        &self,
        alert_type: AlertType,
        context: &AlertContext<'_>,
    ) -> anyhow::Result<RenderedAlert> {
        let subject = self
            .registry
            .render(&subject_template(alert_type), context)
            .with_context(|| format!("rendering {alert_type} subject"))?;
        let body = self
            .registry
            .render(&body_template(alert_type), context)
            .with_context(|| format!("rendering {alert_type} body"))?;

        Ok(RenderedAlert {
            subject: clamp_subject(&subject),
            body,
        })
    }
}

fn subject_template(alert_type: AlertType) -> String {
    format!("{alert_type}_subject")
}

fn body_template(alert_type: AlertType) -> String {
    format!("{alert_type}_body")
}

pub(crate) fn clamp_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

/// Short display name of an execution reference, which by convention is a
/// colon-delimited path ending in the execution's own name.
pub fn execution_short_name(execution_ref: &str) -> &str {
    execution_ref.rsplit(':').next().unwrap_or(execution_ref)
}

/// Webhook body in the block format chat integrations expect, with the
/// full text duplicated at the top level as a fallback.
pub fn webhook_payload(alert_type: AlertType, alert: &RenderedAlert) -> serde_json::Value {
    let (emoji, color) = match alert_type {
        AlertType::Failure => (":red_circle:", "#d32f2f"),
        AlertType::ConsecutiveFailures => (":rotating_light:", "#b71c1c"),
        AlertType::Recovery => (":large_green_circle:", "#2e7d32"),
        AlertType::SlaBreach => (":warning:", "#f57f17"),
    };

    serde_json::json!({
        "text": format!("{emoji} {}", alert.subject),
        "attachments": [{
            "color": color,
            "blocks": [{
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": alert.body,
                },
            }],
        }],
    })
}

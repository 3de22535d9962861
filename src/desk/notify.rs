//! Escalation notices to a Slack-compatible incoming webhook.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::NotifyError;
use crate::pipeline::types::{DecisionRecord, RoutingReason};

/// Upper bound on one webhook call.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts `{"text": ...}` payloads for escalated decisions. Without a webhook
/// URL every call is a no-op.
#[derive(Debug, Clone)]
pub struct EscalationNotifier {
    client: reqwest::Client,
    webhook: Option<SecretString>,
    timeout: Duration,
}

impl EscalationNotifier {
    pub fn new(webhook: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook,
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    /// Notice text for one escalation.
    pub fn message(requester: &str, reason: RoutingReason, record: &DecisionRecord) -> String {
        let mut text = format!("Sales Desk escalation ({reason}) from {requester}");
        if !record.detected_artifacts.is_empty() {
            text.push_str(&format!(
                "\nRequested: {}",
                record.detected_artifacts.join(", ")
            ));
        }
        if !record.denied_artifacts.is_empty() {
            text.push_str(&format!("\nDenied: {}", record.denied_artifacts.join(", ")));
        }
        text
    }

    /// Send a notice. Returns `Ok(false)` when no webhook is configured or
    /// the record was not escalated.
    pub async fn notify(&self, requester: &str, record: &DecisionRecord) -> Result<bool, NotifyError> {
        let Some(url) = &self.webhook else {
            debug!("No escalation webhook configured, skipping notice");
            return Ok(false);
        };
        let Some(reason) = record.routing_reason else {
            return Ok(false);
        };

        let body = serde_json::json!({
            "text": Self::message(requester, reason, record),
        });

        let resp = self
            .client
            .post(url.expose_secret())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status {
                status: resp.status().as_u16(),
            });
        }

        info!(requester, reason = %reason, "Escalation notice sent");
        Ok(true)
    }
}

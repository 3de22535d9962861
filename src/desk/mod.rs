//! Caller-side surface around the pure decision pipeline.
//!
//! `DeskService` is what the HTTP server and CLI talk to: it runs a request
//! through the current policy, then handles the side effects the pipeline
//! leaves out (audit trail, metrics, escalation notices).

pub mod audit;
pub mod metrics;
pub mod notify;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::error::ConfigError;
use crate::intake::InboundRequest;
use crate::pipeline::{DecisionRecord, PolicyHandle};

pub use audit::AuditEvent;
pub use metrics::{MetricsCollector, MetricsSummary};
pub use notify::EscalationNotifier;

pub struct DeskService {
    policy: Arc<PolicyHandle>,
    metrics: MetricsCollector,
    notifier: EscalationNotifier,
    policy_path: Option<PathBuf>,
    /// In-flight escalation notices.
    notices: Mutex<Vec<JoinHandle<()>>>,
}

impl DeskService {
    pub fn new(policy: Arc<PolicyHandle>, notifier: EscalationNotifier) -> Self {
        Self {
            policy,
            metrics: MetricsCollector::new(),
            notifier,
            policy_path: None,
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Policy file re-read by [`DeskService::reload`].
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = Some(path.into());
        self
    }

    pub fn policy(&self) -> &Arc<PolicyHandle> {
        &self.policy
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Decide one request and record its side effects.
    ///
    /// Escalation notices are sent in the background; their failures are
    /// logged and never change or delay the decision.
    pub async fn handle(&self, request: &InboundRequest) -> DecisionRecord {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let record = self
            .policy
            .process(&request.sender_identity(), &request.body);
        self.metrics.record(&record, started.elapsed());

        AuditEvent::document_request(request_id, &request.sender, &record).emit();

        if let Some(event) = AuditEvent::escalation(request_id, &request.sender, &record) {
            event.emit();
            self.spawn_notice(request_id, request.sender.clone(), record.clone());
        }

        record
    }

    fn spawn_notice(&self, request_id: Uuid, requester: String, record: DecisionRecord) {
        if !self.notifier.is_enabled() {
            return;
        }
        let notifier = self.notifier.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = notifier.notify(&requester, &record).await {
                warn!(request_id = %request_id, error = %e, "Failed to send escalation notice");
            }
        });

        let mut notices = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        notices.retain(|h| !h.is_finished());
        notices.push(handle);
    }

    /// Wait for escalation notices still in flight.
    pub async fn flush_notices(&self) {
        let pending = std::mem::take(
            &mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner),
        );
        join_all(pending).await;
    }

    /// Decide several requests concurrently. Output order matches input.
    pub async fn handle_batch(&self, requests: &[InboundRequest]) -> Vec<DecisionRecord> {
        join_all(requests.iter().map(|r| self.handle(r))).await
    }

    /// Re-read the policy file and swap it in. On failure the previous
    /// policy stays active.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.policy_path else {
            return Err(ConfigError::MissingRequired {
                key: "SALES_DESK_POLICY".into(),
                hint: "Reload needs a policy file; the built-in policy cannot be reloaded.".into(),
            });
        };
        self.policy.reload_from(path)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use axum::{Router, http::StatusCode, routing::post};
    use secrecy::SecretString;

    use super::*;
    use crate::config::{DEFAULT_POLICY_TOML, PolicyConfig};
    use crate::pipeline::RoutingReason;

    fn service() -> DeskService {
        let handle = PolicyHandle::from_config(&PolicyConfig::builtin().unwrap()).unwrap();
        DeskService::new(Arc::new(handle), EscalationNotifier::disabled())
    }

    #[tokio::test]
    async fn handle_records_metrics() {
        let desk = service();
        let req = InboundRequest::new("Pat <acme@example.com>", None, "Please send the SOC 2 report");
        let record = desk.handle(&req).await;

        assert_eq!(record.approved_artifacts, vec!["soc2"]);
        assert!(record.response_message.starts_with("Hi Pat,"));
        let summary = desk.metrics().summary();
        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.approval_rate, 100.0);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let desk = service();
        let requests = vec![
            InboundRequest::new("a@x.com", None, "privacy policy"),
            InboundRequest::new("b@x.com", None, "our lawyer wants the DPA"),
            InboundRequest::new("c@x.com", None, "insurance certificate"),
        ];
        let records = desk.handle_batch(&requests).await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].approved_artifacts, vec!["privacy_policy"]);
        assert_eq!(records[1].routing_reason, Some(RoutingReason::LegalReview));
        assert_eq!(records[2].approved_artifacts, vec!["insurance"]);
        assert_eq!(desk.metrics().summary().total_requests, 3);
    }

    #[tokio::test]
    async fn slow_webhook_does_not_delay_decision() {
        let app = Router::new().route(
            "/hook",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                StatusCode::OK
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let handle = PolicyHandle::from_config(&PolicyConfig::builtin().unwrap()).unwrap();
        let notifier = EscalationNotifier::new(Some(SecretString::from(format!("http://{addr}/hook"))))
            .with_timeout(Duration::from_millis(300));
        let desk = DeskService::new(Arc::new(handle), notifier);

        let req = InboundRequest::new("b@x.com", None, "Our attorney needs the DPA reviewed");
        let record = tokio::time::timeout(Duration::from_secs(1), desk.handle(&req))
            .await
            .expect("decision returned while the webhook hangs");
        assert_eq!(record.routing_reason, Some(RoutingReason::LegalReview));

        // The notice gives up after its own timeout.
        tokio::time::timeout(Duration::from_secs(3), desk.flush_notices())
            .await
            .expect("notice bounded by timeout");
    }

    #[test]
    fn reload_without_path_is_error() {
        let err = service().reload().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[tokio::test]
    async fn reload_picks_up_new_trust() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFAULT_POLICY_TOML.as_bytes()).unwrap();
        file.flush().unwrap();

        let desk = service().with_policy_path(file.path());
        let req = InboundRequest::new("late@signer.com", None, "SOC 2 please");
        assert!(desk.handle(&req).await.approved_artifacts.is_empty());

        let updated = DEFAULT_POLICY_TOML.replace(
            "[trust]",
            "[trust]\n\"late@signer.com\" = true",
        );
        std::fs::write(file.path(), updated).unwrap();
        desk.reload().unwrap();

        assert_eq!(desk.handle(&req).await.approved_artifacts, vec!["soc2"]);
    }
}

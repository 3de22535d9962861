//! Compliance audit trail.
//!
//! Each decision produces a `document_request` event, and escalated decisions
//! an additional `escalation` event. Events are JSON lines on the
//! `sales_desk::audit` tracing target so the subscriber can route them to a
//! dedicated sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::types::{DecisionRecord, RoutingReason};

/// Tracing target for audit events.
pub const AUDIT_TARGET: &str = "sales_desk::audit";

/// One audit record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    DocumentRequest {
        request_id: Uuid,
        timestamp: DateTime<Utc>,
        requester: String,
        requested: Vec<String>,
        approved: Vec<String>,
        denied: Vec<String>,
    },
    Escalation {
        request_id: Uuid,
        timestamp: DateTime<Utc>,
        requester: String,
        reason: RoutingReason,
    },
}

impl AuditEvent {
    pub fn document_request(request_id: Uuid, requester: &str, record: &DecisionRecord) -> Self {
        Self::DocumentRequest {
            request_id,
            timestamp: Utc::now(),
            requester: requester.to_string(),
            requested: record.detected_artifacts.clone(),
            approved: record.approved_artifacts.clone(),
            denied: record.denied_artifacts.clone(),
        }
    }

    /// Escalation event, if the decision was routed to a human.
    pub fn escalation(request_id: Uuid, requester: &str, record: &DecisionRecord) -> Option<Self> {
        record.routing_reason.map(|reason| Self::Escalation {
            request_id,
            timestamp: Utc::now(),
            requester: requester.to_string(),
            reason,
        })
    }

    /// Event name, as written in the `event` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentRequest { .. } => "document_request",
            Self::Escalation { .. } => "escalation",
        }
    }

    /// Write the event to the audit target.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => info!(target: AUDIT_TARGET, "{line}"),
            Err(e) => warn!(kind = self.kind(), error = %e, "Failed to serialize audit event"),
        }
    }
}

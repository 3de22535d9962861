//! Shared types for the decision pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::DeliveryMethod;

// ── Detection ───────────────────────────────────────────────────────

/// Set of artifact ids found in a message. Each id appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
    ids: BTreeSet<String>,
}

impl DetectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DetectionResult {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Policy ──────────────────────────────────────────────────────────

/// Why a detected artifact was not approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Artifact is NDA-gated and the sender has no NDA on file.
    NdaRequired,
    /// Artifact is configured to be released only after human review.
    ReviewHold,
}

impl DenialReason {
    /// True for denials that come from a business rule rather than a missing NDA.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, Self::NdaRequired)
    }
}

/// A denied artifact and its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub artifact_id: String,
    pub reason: DenialReason,
}

/// Resolved delivery for the approved set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareMethod {
    /// Nothing approved.
    None,
    /// Every approved artifact uses this method.
    Single(DeliveryMethod),
    /// Approved artifacts use different methods, listed in catalog order.
    Mixed(Vec<DeliveryMethod>),
}

impl ShareMethod {
    /// Wire value for the `share_method` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Single(method) => method.as_str(),
            Self::Mixed(_) => "mixed",
        }
    }

    /// Distinct methods in use, in catalog order.
    pub fn methods(&self) -> Vec<DeliveryMethod> {
        match self {
            Self::None => Vec::new(),
            Self::Single(method) => vec![*method],
            Self::Mixed(methods) => methods.clone(),
        }
    }
}

impl std::fmt::Display for ShareMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ShareMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Output of the policy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub approved: Vec<String>,
    pub denials: Vec<Denial>,
    pub requires_nda: bool,
    pub share_method: ShareMethod,
    pub link_expiration: Option<String>,
}

impl PolicyOutcome {
    pub fn denied_ids(&self) -> Vec<String> {
        self.denials.iter().map(|d| d.artifact_id.clone()).collect()
    }
}

// ── Escalation ──────────────────────────────────────────────────────

/// Machine-readable reason a request was routed to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    /// Legal or contract-negotiation language.
    LegalReview,
    /// Security-adjacent request with no catalog match.
    UnclearRequest,
    /// An artifact was withheld by a business rule rather than a missing NDA.
    PolicyConflict,
    /// Too many NDA-gated artifacts requested without an NDA.
    BulkSensitiveRequest,
}

impl RoutingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegalReview => "legal_review",
            Self::UnclearRequest => "unclear_request",
            Self::PolicyConflict => "policy_conflict",
            Self::BulkSensitiveRequest => "bulk_sensitive_request",
        }
    }
}

impl std::fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Escalation {
    pub reason: Option<RoutingReason>,
}

impl Escalation {
    pub fn none() -> Self {
        Self { reason: None }
    }

    pub fn to_human(reason: RoutingReason) -> Self {
        Self {
            reason: Some(reason),
        }
    }

    pub fn requires_human_review(&self) -> bool {
        self.reason.is_some()
    }
}

// ── Decision ────────────────────────────────────────────────────────

/// Everything decided about a request before the reply is rendered.
#[derive(Debug, Clone)]
pub struct DraftDecision {
    /// Display name from the sender identity, if it carried one.
    pub sender_name: Option<String>,
    /// Detected ids in catalog order.
    pub detected: Vec<String>,
    pub nda_on_file: bool,
    pub policy: PolicyOutcome,
    pub escalation: Escalation,
}

/// The pipeline's sole output. Built once per message and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub detected_artifacts: Vec<String>,
    pub requires_nda: bool,
    pub nda_on_file: bool,
    pub approved_artifacts: Vec<String>,
    pub denied_artifacts: Vec<String>,
    pub share_method: ShareMethod,
    pub share_methods: Vec<DeliveryMethod>,
    pub link_expiration: Option<String>,
    pub response_message: String,
    pub requires_human_review: bool,
    pub routing_reason: Option<RoutingReason>,
}

impl DecisionRecord {
    /// Assemble the final record from a draft and its rendered reply.
    pub fn from_draft(draft: DraftDecision, response_message: String) -> Self {
        let denied_artifacts = draft.policy.denied_ids();
        let share_methods = draft.policy.share_method.methods();
        Self {
            detected_artifacts: draft.detected,
            requires_nda: draft.policy.requires_nda,
            nda_on_file: draft.nda_on_file,
            approved_artifacts: draft.policy.approved,
            denied_artifacts,
            share_method: draft.policy.share_method,
            share_methods,
            link_expiration: draft.policy.link_expiration,
            response_message,
            requires_human_review: draft.escalation.requires_human_review(),
            routing_reason: draft.escalation.reason,
        }
    }
}

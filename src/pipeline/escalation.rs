//! Escalation gate: decides when a request also needs a human.
//!
//! Triggers are checked in a fixed order and the first match wins:
//! 1. legal / contract-negotiation language → `legal_review`
//! 2. security vocabulary but nothing detected → `unclear_request`
//! 3. an artifact withheld by a business rule → `policy_conflict`
//! 4. too many NDA-gated artifacts denied → `bulk_sensitive_request`
//!
//! Escalating never suppresses the auto-reply.

use regex::Regex;
use tracing::debug;

use crate::error::ConfigError;
use crate::pipeline::types::{Denial, DenialReason, Escalation, RoutingReason};

/// Default legal/contract vocabulary.
pub const DEFAULT_LEGAL_TERMS: &[&str] = &[
    "legal",
    "contract",
    "contracts",
    "redline",
    "redlines",
    "counsel",
    "attorney",
    "lawyer",
    "indemnification",
    "indemnify",
    "liability cap",
    "limitation of liability",
    "msa",
    "master services agreement",
];

/// Default security-adjacent vocabulary.
pub const DEFAULT_SECURITY_TERMS: &[&str] = &[
    "security",
    "compliance",
    "audit",
    "certification",
    "certificate",
    "due diligence",
    "vendor assessment",
    "risk assessment",
    "attestation",
    "vulnerability",
    "encryption",
    "gdpr",
    "hipaa",
];

/// Default number of NDA denials tolerated before a human is looped in.
pub const DEFAULT_MAX_DENIED_WITHOUT_NDA: usize = 2;

/// Compile a term list into one case-insensitive, word-bounded matcher.
///
/// Inner whitespace in a term matches any whitespace run. Word boundaries are
/// only asserted on edges that are word characters, so terms such as `c++`
/// still match. An empty list yields `None`, which never matches.
pub fn compile_terms(key: &str, terms: &[String]) -> Result<Option<Regex>, ConfigError> {
    let mut parts = Vec::with_capacity(terms.len());
    for term in terms {
        let words: Vec<String> = term.split_whitespace().map(regex::escape).collect();
        if words.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "terms must not be blank".into(),
            });
        }
        let body = words.join(r"\s+");
        let trimmed = term.trim();
        let lead = if trimmed.starts_with(is_word_char) { r"\b" } else { "" };
        let trail = if trimmed.ends_with(is_word_char) { r"\b" } else { "" };
        parts.push(format!("{lead}{body}{trail}"));
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let pattern = format!("(?i)(?:{})", parts.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Routes requests to a human reviewer.
#[derive(Debug, Clone)]
pub struct EscalationGate {
    legal: Option<Regex>,
    security: Option<Regex>,
    max_denied_without_nda: Option<usize>,
}

impl EscalationGate {
    /// Build a gate from term lists. `max_denied_without_nda = None` disables
    /// the bulk-request trigger.
    pub fn new(
        legal_terms: &[String],
        security_terms: &[String],
        max_denied_without_nda: Option<usize>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            legal: compile_terms("escalation.legal_terms", legal_terms)?,
            security: compile_terms("escalation.security_terms", security_terms)?,
            max_denied_without_nda,
        })
    }

    /// Gate with the default vocabularies.
    pub fn default_rules() -> Result<Self, ConfigError> {
        let legal: Vec<String> = DEFAULT_LEGAL_TERMS.iter().map(|s| s.to_string()).collect();
        let security: Vec<String> = DEFAULT_SECURITY_TERMS
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(&legal, &security, Some(DEFAULT_MAX_DENIED_WITHOUT_NDA))
    }

    /// Decide whether the request needs human review, and why.
    pub fn should_escalate(&self, text: &str, detected: &[String], denials: &[Denial]) -> Escalation {
        if let Some(m) = self.legal.as_ref().and_then(|r| r.find(text)) {
            debug!(term = %m.as_str(), "Legal language detected");
            return Escalation::to_human(RoutingReason::LegalReview);
        }

        if detected.is_empty()
            && let Some(m) = self.security.as_ref().and_then(|r| r.find(text))
        {
            debug!(term = %m.as_str(), "Security request without a catalog match");
            return Escalation::to_human(RoutingReason::UnclearRequest);
        }

        if denials.iter().any(|d| d.reason.is_business_rule()) {
            return Escalation::to_human(RoutingReason::PolicyConflict);
        }

        if let Some(max) = self.max_denied_without_nda {
            let nda_denials = denials
                .iter()
                .filter(|d| d.reason == DenialReason::NdaRequired)
                .count();
            if nda_denials > max {
                debug!(nda_denials, max, "Bulk sensitive request");
                return Escalation::to_human(RoutingReason::BulkSensitiveRequest);
            }
        }

        Escalation::none()
    }
}

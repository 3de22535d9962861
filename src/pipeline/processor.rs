//! Decision pipeline: text + sender in, decision record out.
//!
//! Flow:
//! 1. Detector → requested artifact ids (catalog order)
//! 2. Trust registry → NDA on file?
//! 3. Policy engine → approved / denied / share method
//! 4. Escalation gate → human review?
//! 5. Response composer → reply text
//!
//! A built pipeline is immutable. All configuration problems surface when it is
//! built, so `process()` cannot fail. Reloads swap a whole new pipeline in
//! through [`PolicyHandle`].

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::catalog::ArtifactCatalog;
use crate::config::PolicyConfig;
use crate::error::ConfigError;
use crate::intake::SenderIdentity;
use crate::pipeline::composer::{ComposerSettings, ResponseComposer};
use crate::pipeline::detector::{ArtifactDetector, KeywordDetector};
use crate::pipeline::escalation::EscalationGate;
use crate::pipeline::policy::PolicyEngine;
use crate::pipeline::types::{DecisionRecord, DetectionResult, DraftDecision};
use crate::trust::TrustRegistry;

/// The composed request decision pipeline.
pub struct DecisionPipeline {
    catalog: Arc<ArtifactCatalog>,
    trust: TrustRegistry,
    detector: Arc<dyn ArtifactDetector>,
    policy: PolicyEngine,
    gate: EscalationGate,
    composer: ResponseComposer,
}

impl DecisionPipeline {
    /// Build a pipeline from policy configuration.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let catalog = Arc::new(ArtifactCatalog::new(config.artifacts.clone())?);
        let detector = KeywordDetector::new(&catalog, config.trigger_table()?)?;
        let trust = TrustRegistry::new(
            config
                .trust_table()?
                .iter()
                .map(|(key, on_file)| (key.as_str(), *on_file)),
        )?;
        let gate = EscalationGate::new(
            &config.escalation.legal_terms,
            &config.escalation.security_terms,
            config.escalation.bulk_threshold(),
        )?;

        if config.settings.signature.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "settings.signature".into(),
                message: "signature must not be blank".into(),
            });
        }
        if config.settings.link_expiration_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "settings.link_expiration_days".into(),
                message: "must be at least 1".into(),
            });
        }

        let settings = ComposerSettings {
            signature: config.settings.signature.clone(),
            company_name: config.settings.company_name.clone(),
            link_expiration_days: config.settings.link_expiration_days,
        };

        info!(
            artifacts = catalog.len(),
            triggered = detector.artifact_count(),
            trust_records = trust.len(),
            "Decision pipeline built"
        );

        Ok(Self::from_parts(
            catalog,
            trust,
            Arc::new(detector),
            gate,
            settings,
        ))
    }

    /// Assemble a pipeline from already-validated parts.
    pub fn from_parts(
        catalog: Arc<ArtifactCatalog>,
        trust: TrustRegistry,
        detector: Arc<dyn ArtifactDetector>,
        gate: EscalationGate,
        settings: ComposerSettings,
    ) -> Self {
        let policy = PolicyEngine::new(Arc::clone(&catalog), settings.link_expiration_days);
        let composer = ResponseComposer::new(Arc::clone(&catalog), settings);
        Self {
            catalog,
            trust,
            detector,
            policy,
            gate,
            composer,
        }
    }

    /// Replace the detection strategy, keeping everything else.
    pub fn with_detector(mut self, detector: Arc<dyn ArtifactDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn catalog(&self) -> &ArtifactCatalog {
        &self.catalog
    }

    pub fn trust(&self) -> &TrustRegistry {
        &self.trust
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Detect artifacts and order them by catalog position.
    ///
    /// Ids the catalog does not know are dropped.
    pub fn detect(&self, text: &str) -> Vec<String> {
        let found: DetectionResult = self.detector.detect(text);
        let ordered: Vec<String> = self
            .catalog
            .all_specs()
            .iter()
            .filter(|spec| found.contains(&spec.id))
            .map(|spec| spec.id.clone())
            .collect();

        if ordered.len() != found.len() {
            warn!(
                detector = %self.detector.name(),
                "Detector returned ids outside the catalog; dropped"
            );
        }
        ordered
    }

    /// Process one message into a decision record.
    pub fn process(&self, sender_identity: &str, email_text: &str) -> DecisionRecord {
        let sender = SenderIdentity::parse(sender_identity);

        let detected = self.detect(email_text);
        let nda_on_file = self.trust.is_trusted(&sender.address);
        let policy = self.policy.evaluate(&detected, nda_on_file);
        let escalation = self
            .gate
            .should_escalate(email_text, &detected, &policy.denials);

        debug!(
            sender = %sender.address,
            ?detected,
            nda_on_file,
            "Policy evaluated"
        );

        let draft = DraftDecision {
            sender_name: sender.display_name,
            detected,
            nda_on_file,
            policy,
            escalation,
        };
        let response = self.composer.compose(&draft);
        let record = DecisionRecord::from_draft(draft, response);

        info!(
            sender = %sender.address,
            detected = record.detected_artifacts.len(),
            approved = record.approved_artifacts.len(),
            denied = record.denied_artifacts.len(),
            share_method = %record.share_method,
            routing_reason = record.routing_reason.map(|r| r.as_str()).unwrap_or("-"),
            "Request decided"
        );

        record
    }
}

/// Shared, atomically swappable pipeline.
///
/// Readers take a snapshot `Arc`; a reload builds a complete new pipeline and
/// replaces the pointer, so no evaluation ever sees a half-updated policy.
pub struct PolicyHandle {
    current: RwLock<Arc<DecisionPipeline>>,
}

impl PolicyHandle {
    pub fn new(pipeline: DecisionPipeline) -> Self {
        Self {
            current: RwLock::new(Arc::new(pipeline)),
        }
    }

    /// Build from policy configuration.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(DecisionPipeline::from_config(config)?))
    }

    /// Snapshot of the active pipeline.
    pub fn current(&self) -> Arc<DecisionPipeline> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Swap in a new pipeline, returning the previous one.
    pub fn replace(&self, pipeline: DecisionPipeline) -> Arc<DecisionPipeline> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(pipeline))
    }

    /// Load a policy file and swap it in. On error the active policy is kept.
    pub fn reload_from(&self, path: &Path) -> Result<(), ConfigError> {
        let config = PolicyConfig::load(path)?;
        let pipeline = DecisionPipeline::from_config(&config)?;
        self.replace(pipeline);
        info!(path = %path.display(), "Policy reloaded");
        Ok(())
    }

    /// Process against the current snapshot.
    pub fn process(&self, sender_identity: &str, email_text: &str) -> DecisionRecord {
        self.current().process(sender_identity, email_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{RoutingReason, ShareMethod};

    fn pipeline() -> DecisionPipeline {
        DecisionPipeline::from_config(&PolicyConfig::builtin().unwrap()).unwrap()
    }

    #[test]
    fn soc2_without_nda_is_denied() {
        let record = pipeline().process("buyer@newcompany.com", "Can you send your SOC 2 report?");
        assert_eq!(record.detected_artifacts, vec!["soc2"]);
        assert!(record.requires_nda);
        assert!(!record.nda_on_file);
        assert!(record.approved_artifacts.is_empty());
        assert_eq!(record.denied_artifacts, vec!["soc2"]);
        assert_eq!(record.share_method, ShareMethod::None);
        assert_eq!(record.link_expiration, None);
        assert!(!record.requires_human_review);
    }

    #[test]
    fn soc2_with_domain_wildcard_nda_is_approved() {
        let p = pipeline();
        let record = p.process("alice@enterprise.com", "Can you send your SOC 2 report?");
        assert!(record.nda_on_file);
        assert_eq!(record.approved_artifacts, vec!["soc2"]);
        assert!(record.denied_artifacts.is_empty());
        let soc2 = p.catalog().lookup("soc2").unwrap();
        assert_eq!(record.share_method, ShareMethod::Single(soc2.delivery_method));
        assert_eq!(record.link_expiration.as_deref(), Some("P7D"));
    }

    #[test]
    fn iso_certificate_approved_regardless_of_trust() {
        let p = pipeline();
        for sender in ["stranger@nowhere.org", "acme@example.com"] {
            let record = p.process(sender, "Could you share your ISO 27001 certificate?");
            assert_eq!(record.detected_artifacts, vec!["iso27001"]);
            assert_eq!(record.approved_artifacts, vec!["iso27001"]);
            assert!(!record.requires_nda);
        }
    }

    #[test]
    fn empty_text_asks_for_clarification() {
        let record = pipeline().process("user@test.com", "");
        assert!(record.detected_artifacts.is_empty());
        assert!(!record.requires_human_review);
        assert_eq!(record.routing_reason, None);
        assert!(record.response_message.contains("clarify"));
    }

    #[test]
    fn vague_security_request_escalates() {
        let record = pipeline().process(
            "vague@company.com",
            "Can you send me information about your security?",
        );
        assert!(record.detected_artifacts.is_empty());
        assert!(record.requires_human_review);
        assert_eq!(record.routing_reason, Some(RoutingReason::UnclearRequest));
    }

    #[test]
    fn display_name_sender_is_parsed() {
        let record = pipeline().process("Acme Buyer <ACME@example.com>", "SOC2 please");
        assert!(record.nda_on_file);
        assert!(record.response_message.starts_with("Hi Acme Buyer,"));
    }

    #[test]
    fn detected_follow_catalog_order() {
        let record = pipeline().process(
            "acme@example.com",
            "Insurance certificate, privacy policy, pen test and SOC 2.",
        );
        assert_eq!(
            record.detected_artifacts,
            vec!["soc2", "pentest", "privacy_policy", "insurance"]
        );
    }

    #[test]
    fn process_is_idempotent() {
        let p = pipeline();
        let text = "Please share SOC2, ISO 27001 and the DPA. Our counsel has questions.";
        let a = p.process("buyer@x.com", text);
        let b = p.process("buyer@x.com", text);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    struct FixedDetector(Vec<&'static str>);

    impl ArtifactDetector for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }
        fn detect(&self, _text: &str) -> DetectionResult {
            self.0.iter().copied().collect()
        }
    }

    #[test]
    fn substituted_detector_is_used_and_filtered() {
        let p = pipeline().with_detector(Arc::new(FixedDetector(vec!["dpa", "hipaa"])));
        assert_eq!(p.detector_name(), "fixed");
        let record = p.process("x@y.com", "anything");
        assert_eq!(record.detected_artifacts, vec!["dpa"]);
        assert_eq!(record.approved_artifacts, vec!["dpa"]);
    }

    #[test]
    fn config_errors_surface_at_build() {
        let mut cfg = PolicyConfig::builtin().unwrap();
        cfg.triggers
            .as_mut()
            .unwrap()
            .insert("hipaa".into(), vec!["hipaa".into()]);
        assert!(matches!(
            DecisionPipeline::from_config(&cfg),
            Err(ConfigError::UnknownArtifactReference { .. })
        ));

        let mut cfg = PolicyConfig::builtin().unwrap();
        cfg.trust = None;
        assert!(matches!(
            DecisionPipeline::from_config(&cfg),
            Err(ConfigError::MissingRequired { .. })
        ));

        let mut cfg = PolicyConfig::builtin().unwrap();
        cfg.settings.link_expiration_days = 0;
        assert!(matches!(
            DecisionPipeline::from_config(&cfg),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn handle_swaps_whole_pipeline() {
        let handle = PolicyHandle::from_config(&PolicyConfig::builtin().unwrap()).unwrap();
        let before = handle.current();
        assert!(!handle.process("x@y.com", "SOC2").nda_on_file);

        let mut cfg = PolicyConfig::builtin().unwrap();
        cfg.trust.as_mut().unwrap().insert("*@y.com".into(), true);
        handle.replace(DecisionPipeline::from_config(&cfg).unwrap());

        assert!(handle.process("x@y.com", "SOC2").nda_on_file);
        // The old snapshot is untouched.
        assert!(!before.process("x@y.com", "SOC2").nda_on_file);
    }

    #[test]
    fn failed_reload_keeps_active_policy() {
        let handle = PolicyHandle::from_config(&PolicyConfig::builtin().unwrap()).unwrap();
        let err = handle.reload_from(Path::new("/nonexistent/policy.toml"));
        assert!(err.is_err());
        assert_eq!(handle.process("a@b.com", "SOC2").detected_artifacts, vec!["soc2"]);
    }
}
